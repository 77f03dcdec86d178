// ==========================================
// 楼栋层物量引擎 - 核心几何解析 (CoreGeometryResolver)
// ==========================================
// 输入: 楼栋基础信息（核心数、按核心层数、架空层、层高）
// 输出: 每个核心的有序层描述（地下 → 地上 1..N → 屋顶 1..M）
// 规则:
// 1) 单核心或未提供按核心数组 → 使用全局 ground/basement/ph
// 2) 按核心数组缺项 → 回退全局值，不报错
// 3) 显示主轴 = 各核心元数据与实际层记录中的最大地上层号
// ==========================================

use crate::domain::building::Building;
use crate::domain::floor::Floor;
use crate::domain::label::{level_number, FloorLabel, FloorLevel};
use crate::domain::types::{FloorClass, LevelType};
use crate::engine::floor_classifier::FloorClassifier;
use tracing::instrument;

/// 层描述（尚未落成 Floor 记录）
#[derive(Debug, Clone, PartialEq)]
pub struct FloorDescriptor {
    pub core_index: usize,
    pub label: FloorLabel,
    pub level_type: LevelType,
    pub floor_number: i32,
    pub default_class: FloorClass,
    pub default_height: Option<f64>,
    pub is_piloti: bool,
}

/// 单个核心的层描述列表
#[derive(Debug, Clone, PartialEq)]
pub struct CorePlan {
    pub core_index: usize,
    pub ground_count: u32,
    pub descriptors: Vec<FloorDescriptor>,
}

/// 显示布局（表格行轴）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLayout {
    pub core_count: usize,
    /// 显示主轴的最高地上层号
    pub spine_top: u32,
}

impl DisplayLayout {
    pub fn is_multi_core(&self) -> bool {
        self.core_count > 1
    }

    /// 标签的核心限定（单核心不限定）
    pub fn qualifier(&self, core_index: usize) -> Option<usize> {
        if self.is_multi_core() {
            Some(core_index)
        } else {
            None
        }
    }
}

// ==========================================
// CoreGeometryResolver
// ==========================================
pub struct CoreGeometryResolver {
    classifier: FloorClassifier,
}

impl CoreGeometryResolver {
    pub fn new() -> Self {
        Self {
            classifier: FloorClassifier::new(),
        }
    }

    /// 解析每个核心的层描述
    pub fn resolve(&self, building: &Building) -> Vec<CorePlan> {
        let core_count = building.core_count();
        let counts = &building.meta.floor_count;
        let heights = &building.meta.heights;
        let distinct_top = heights.distinct_top_height();

        (0..core_count)
            .map(|core| {
                let qualifier = if core_count > 1 { Some(core) } else { None };
                let basement = counts.basement_for_core(core, core_count);
                let ground = counts.ground_for_core(core, core_count);
                let ph = counts.ph_for_core(core, core_count);
                let pilotis = counts.pilotis_for_core(core, core_count).min(ground);
                let piloti_height = counts.piloti_height_for_core(core);

                let mut descriptors = Vec::new();

                // 地下: 由深到浅
                for n in (1..=basement).rev() {
                    descriptors.push(FloorDescriptor {
                        core_index: core,
                        label: FloorLabel::new(qualifier, FloorLevel::Basement(n)),
                        level_type: LevelType::Basement,
                        floor_number: -level_number(n),
                        default_class: FloorClass::Basement,
                        default_height: heights.basement_height(n),
                        is_piloti: false,
                    });
                }

                for n in 1..=ground {
                    let is_piloti = n <= pilotis;
                    let is_top = n == ground && distinct_top.is_some() && !is_piloti;
                    let (default_class, default_height) = if is_piloti {
                        (
                            FloorClass::General,
                            piloti_height.or_else(|| heights.ground_height(n)),
                        )
                    } else if is_top {
                        (FloorClass::Top, distinct_top)
                    } else {
                        (FloorClass::Standard, heights.ground_height(n))
                    };
                    descriptors.push(FloorDescriptor {
                        core_index: core,
                        label: FloorLabel::ground(qualifier, n),
                        level_type: LevelType::Ground,
                        floor_number: level_number(n),
                        default_class,
                        default_height,
                        is_piloti,
                    });
                }

                for k in 1..=ph {
                    descriptors.push(FloorDescriptor {
                        core_index: core,
                        label: FloorLabel::new(qualifier, FloorLevel::Penthouse(k)),
                        level_type: LevelType::Ground,
                        floor_number: level_number(ground.saturating_add(k)),
                        default_class: FloorClass::Penthouse,
                        default_height: heights.ph_height(k),
                        is_piloti: false,
                    });
                }

                CorePlan {
                    core_index: core,
                    ground_count: ground,
                    descriptors,
                }
            })
            .collect()
    }

    /// 生成楼栋的规范层集合（去重、按核心有序），并推断셋팅층
    ///
    /// 层 ID 由楼栋 ID 与规范标签确定，重复生成得到相同 ID
    #[instrument(skip(self, building), fields(building_id = %building.id))]
    pub fn derive_floors(&self, building: &Building) -> Vec<Floor> {
        let plans = self.resolve(building);
        let mut floors: Vec<Floor> = Vec::new();

        for plan in &plans {
            for descriptor in &plan.descriptors {
                let label = descriptor.label.to_string();
                if floors.iter().any(|f| f.floor_label == label) {
                    continue;
                }
                floors.push(Floor {
                    id: floor_id_for(&building.id, &descriptor.label),
                    building_id: building.id.clone(),
                    floor_label: label,
                    floor_number: descriptor.floor_number,
                    level_type: descriptor.level_type,
                    floor_class: descriptor.default_class,
                    height: descriptor.default_height,
                });
            }
        }

        if let Some(standard) = building.standard_height() {
            for plan in &plans {
                if let Some(setting_id) =
                    self.classifier
                        .infer_setting_floor(&floors, plan.core_index, standard)
                {
                    floors = self
                        .classifier
                        .apply_classification(&floors, &setting_id, FloorClass::Setting)
                        .floors;
                }
            }
        }

        tracing::debug!(
            cores = plans.len(),
            floors = floors.len(),
            "层集合生成完成"
        );
        floors
    }

    /// 计算显示布局
    ///
    /// 主轴取元数据与实际层记录（含范围记录终点）中的最大地上层号，
    /// 手工编辑后的层记录可能超出元数据层数
    pub fn display_layout(&self, building: &Building) -> DisplayLayout {
        let core_count = building.core_count();
        let counts = &building.meta.floor_count;

        let metadata_top = (0..core_count)
            .map(|core| counts.ground_for_core(core, core_count))
            .max()
            .unwrap_or(0);

        let observed_top = building
            .floors
            .iter()
            .filter(|f| f.level_type == LevelType::Ground && !f.is_penthouse())
            .filter_map(|f| match f.range_span() {
                Some((_, end)) => Some(end),
                None => u32::try_from(f.floor_number).ok(),
            })
            .max()
            .unwrap_or(0);

        DisplayLayout {
            core_count,
            spine_top: metadata_top.max(observed_top),
        }
    }
}

impl Default for CoreGeometryResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// 规范层 ID
pub fn floor_id_for(building_id: &str, label: &FloorLabel) -> String {
    format!("{}-{}", building_id, label)
}
