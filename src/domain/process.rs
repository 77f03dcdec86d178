// ==========================================
// 楼栋层物量引擎 - 工序模块（只读参考数据）
// ==========================================
// 工序模块: 类别 × 循环天数 → 有序工序项
// 静态配置，加载一次，运行期不修改
// ==========================================

use crate::domain::types::TradeMetric;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 工序类别（同时决定浇筑位置）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessCategory {
    #[serde(rename = "버림")]
    Blinding,
    #[serde(rename = "기초")]
    Foundation,
    #[serde(rename = "지하층")]
    Basement,
    #[serde(rename = "셋팅층")]
    SettingFloor,
    #[serde(rename = "기준층")]
    StandardFloor,
    #[serde(rename = "옥탑층")]
    Penthouse,
}

impl ProcessCategory {
    pub const ALL: [ProcessCategory; 6] = [
        ProcessCategory::Blinding,
        ProcessCategory::Foundation,
        ProcessCategory::Basement,
        ProcessCategory::SettingFloor,
        ProcessCategory::StandardFloor,
        ProcessCategory::Penthouse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessCategory::Blinding => "버림",
            ProcessCategory::Foundation => "기초",
            ProcessCategory::Basement => "지하층",
            ProcessCategory::SettingFloor => "셋팅층",
            ProcessCategory::StandardFloor => "기준층",
            ProcessCategory::Penthouse => "옥탑층",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s.trim())
    }
}

impl fmt::Display for ProcessCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 设备参数（混凝土泵车等）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentSpec {
    /// 单台设备日有效处理量（如 m³/台·日）
    pub equipment_calculation_base: f64,
    /// 每台设备所需人数
    pub equipment_workers_per_unit: f64,
    /// 同时作业设备上限
    pub max_equipment_units: u32,
}

// ==========================================
// ProcessItem - 工序项
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessItem {
    pub seq: u32,
    pub work_step: String,
    /// 引用表达式（如 "F7*0.45"）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity_reference: Option<String>,
    /// 无引用表达式时按楼栋合计的指标
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_metric: Option<TradeMetric>,
    /// 人·日产量
    #[serde(default)]
    pub daily_productivity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipment: Option<EquipmentSpec>,
}

// ==========================================
// ProcessModule - 工序模块
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessModule {
    pub category: ProcessCategory,
    pub cycle_days: u32,
    pub items: Vec<ProcessItem>,
}

/// 工序模块目录
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessCatalog {
    pub modules: Vec<ProcessModule>,
}

impl ProcessCatalog {
    pub fn find(&self, category: ProcessCategory, cycle_days: u32) -> Option<&ProcessModule> {
        self.modules
            .iter()
            .find(|m| m.category == category && m.cycle_days == cycle_days)
    }

    /// 某类别下的首个模块（按循环天数升序）
    pub fn first_of(&self, category: ProcessCategory) -> Option<&ProcessModule> {
        self.modules
            .iter()
            .filter(|m| m.category == category)
            .min_by_key(|m| m.cycle_days)
    }
}
