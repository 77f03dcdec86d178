// ==========================================
// 楼栋层物量引擎 - 引擎配置
// ==========================================
// 写入时序（防抖窗口）与设备计算基准
// 默认值可由 config_kv 覆写，见 ConfigManager::load_engine_config
// ==========================================

use crate::domain::process::{EquipmentSpec, ProcessCategory};
use crate::services::write_queue::WritePolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 写入时序
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteTimings {
    /// 层高编辑防抖（毫秒）
    pub height_debounce_ms: u64,
    /// 物量单元格编辑防抖（毫秒）
    pub quantity_debounce_ms: u64,
    /// 基本信息整表自动保存防抖（毫秒）
    pub basic_info_autosave_ms: u64,
}

impl Default for WriteTimings {
    fn default() -> Self {
        Self {
            height_debounce_ms: 300,
            quantity_debounce_ms: 300,
            basic_info_autosave_ms: 3_000,
        }
    }
}

impl WriteTimings {
    /// 分类编辑逐层立即写入
    pub fn classification_policy(&self) -> WritePolicy {
        WritePolicy::Immediate
    }

    pub fn height_policy(&self) -> WritePolicy {
        debounced(self.height_debounce_ms)
    }

    pub fn quantity_policy(&self) -> WritePolicy {
        debounced(self.quantity_debounce_ms)
    }

    pub fn basic_info_policy(&self) -> WritePolicy {
        debounced(self.basic_info_autosave_ms)
    }
}

fn debounced(ms: u64) -> WritePolicy {
    if ms == 0 {
        WritePolicy::Immediate
    } else {
        WritePolicy::Debounced(Duration::from_millis(ms))
    }
}

/// 浇筑位置对应的设备基准（m³/台·日）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentDefaults {
    pub blinding_foundation_base: f64,
    pub basement_base: f64,
    pub setting_floor_base: f64,
    pub standard_floor_base: f64,
    pub penthouse_base: f64,
    pub max_equipment_units: u32,
    pub workers_per_unit: f64,
}

impl Default for EquipmentDefaults {
    fn default() -> Self {
        Self {
            blinding_foundation_base: 650.0,
            basement_base: 500.0,
            setting_floor_base: 400.0,
            standard_floor_base: 320.0,
            penthouse_base: 230.0,
            max_equipment_units: 2,
            workers_per_unit: 6.0,
        }
    }
}

impl EquipmentDefaults {
    pub fn base_for(&self, category: ProcessCategory) -> f64 {
        match category {
            ProcessCategory::Blinding | ProcessCategory::Foundation => self.blinding_foundation_base,
            ProcessCategory::Basement => self.basement_base,
            ProcessCategory::SettingFloor => self.setting_floor_base,
            ProcessCategory::StandardFloor => self.standard_floor_base,
            ProcessCategory::Penthouse => self.penthouse_base,
        }
    }

    /// 某浇筑位置的默认设备参数
    pub fn spec_for(&self, category: ProcessCategory) -> EquipmentSpec {
        EquipmentSpec {
            equipment_calculation_base: self.base_for(category),
            equipment_workers_per_unit: self.workers_per_unit,
            max_equipment_units: self.max_equipment_units,
        }
    }
}

/// 引擎配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    pub write_timings: WriteTimings,
    pub equipment: EquipmentDefaults,
    /// 引用表达式严格模式（报告中暴露解析错误）
    #[serde(default)]
    pub strict_references: bool,
}
