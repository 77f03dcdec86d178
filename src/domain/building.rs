// ==========================================
// 楼栋层物量引擎 - 楼栋聚合根
// ==========================================
// 楼栋持有基础信息(meta)、层集合与层物量集合
// 锁定标志在核心层强制生效（签认后物量冻结）
// ==========================================

use crate::domain::floor::Floor;
use crate::domain::trade::FloorTrade;
use serde::{Deserialize, Serialize};

// ==========================================
// FloorCount - 层数设置
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorCount {
    #[serde(default)]
    pub basement: u32,
    #[serde(default)]
    pub ground: u32,
    #[serde(default)]
    pub ph: u32,

    // ===== 按核心的层数（可选） =====
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_ground_floors: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_basement_floors: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_ph_floors: Option<Vec<u32>>,

    // ===== 架空层（필로티） =====
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pilotis_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_pilotis_counts: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_pilotis_heights: Option<Vec<f64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_high_ceiling_equipment_room: Option<bool>,
}

impl FloorCount {
    /// 核心 `core` 的地上层数；数组缺项时回退到全局值
    pub fn ground_for_core(&self, core: usize, core_count: usize) -> u32 {
        per_core(&self.core_ground_floors, core, core_count).unwrap_or(self.ground)
    }

    pub fn basement_for_core(&self, core: usize, core_count: usize) -> u32 {
        per_core(&self.core_basement_floors, core, core_count).unwrap_or(self.basement)
    }

    pub fn ph_for_core(&self, core: usize, core_count: usize) -> u32 {
        per_core(&self.core_ph_floors, core, core_count).unwrap_or(self.ph)
    }

    pub fn pilotis_for_core(&self, core: usize, core_count: usize) -> u32 {
        per_core(&self.core_pilotis_counts, core, core_count)
            .or(self.pilotis_count)
            .unwrap_or(0)
    }

    pub fn piloti_height_for_core(&self, core: usize) -> Option<f64> {
        self.core_pilotis_heights
            .as_ref()
            .and_then(|heights| heights.get(core).copied())
            .filter(|h| h.is_finite() && *h > 0.0)
    }
}

/// 单核心楼栋不读取按核心数组
fn per_core(values: &Option<Vec<u32>>, core: usize, core_count: usize) -> Option<u32> {
    if core_count <= 1 {
        return None;
    }
    values.as_ref().and_then(|v| v.get(core).copied())
}

// ==========================================
// Heights - 层高设置 (mm)
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heights {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basement2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basement1: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor1: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor3: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor4: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor5: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<f64>,
    #[serde(default)]
    pub ph: Vec<f64>,
}

impl Heights {
    /// 有效的기준층层高
    pub fn standard_height(&self) -> Option<f64> {
        valid(self.standard)
    }

    /// 地上第 n 层的默认层高（1~5 层单独设置，其余取기준층层高）
    pub fn ground_height(&self, floor: u32) -> Option<f64> {
        let explicit = match floor {
            1 => self.floor1,
            2 => self.floor2,
            3 => self.floor3,
            4 => self.floor4,
            5 => self.floor5,
            _ => None,
        };
        valid(explicit).or_else(|| self.standard_height())
    }

    /// 地下第 n 层的默认层高（B3 以下沿用 B2）
    pub fn basement_height(&self, floor: u32) -> Option<f64> {
        match floor {
            1 => valid(self.basement1),
            _ => valid(self.basement2),
        }
    }

    /// 屋顶第 k 层的层高
    pub fn ph_height(&self, k: u32) -> Option<f64> {
        let index = (k as usize).checked_sub(1)?;
        valid(self.ph.get(index).copied())
    }

    /// 最上层层高仅在显式设置且不同于기준층时才视为独立层高
    pub fn distinct_top_height(&self) -> Option<f64> {
        let top = valid(self.top)?;
        match self.standard_height() {
            Some(standard) if heights_equal(top, standard) => None,
            _ => Some(top),
        }
    }
}

fn valid(value: Option<f64>) -> Option<f64> {
    value.filter(|h| h.is_finite() && *h > 0.0)
}

/// 层高比较（mm 级容差）
pub fn heights_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < 0.5
}

// ==========================================
// BuildingMeta - 동 기본 정보
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingMeta {
    #[serde(default)]
    pub core_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slab_type: Option<String>,
    #[serde(default)]
    pub unit_type_pattern: Vec<String>,
    #[serde(default)]
    pub floor_count: FloorCount,
    #[serde(default)]
    pub heights: Heights,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_floor_cycle: Option<u32>,
    #[serde(default)]
    pub is_basic_info_locked: bool,
    #[serde(default)]
    pub is_data_input_locked: bool,
}

// ==========================================
// Building - 楼栋聚合根
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Building {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub meta: BuildingMeta,
    #[serde(default)]
    pub floors: Vec<Floor>,
    #[serde(default)]
    pub floor_trades: Vec<FloorTrade>,
}

impl Building {
    pub fn new(id: impl Into<String>, name: impl Into<String>, meta: BuildingMeta) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            meta,
            floors: Vec::new(),
            floor_trades: Vec::new(),
        }
    }

    /// 核心数（至少为 1）
    pub fn core_count(&self) -> usize {
        self.meta.core_count.max(1) as usize
    }

    pub fn is_multi_core(&self) -> bool {
        self.core_count() > 1
    }

    pub fn standard_height(&self) -> Option<f64> {
        self.meta.heights.standard_height()
    }

    pub fn find_floor(&self, floor_id: &str) -> Option<&Floor> {
        self.floors.iter().find(|f| f.id == floor_id)
    }
}
