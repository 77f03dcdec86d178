// ==========================================
// 楼栋层物量引擎 - 领域类型定义
// ==========================================
// 职责: 层级类型、层分类、工种分组、物量指标
// 序列化格式: 与外部存储一致（韩文枚举值 / camelCase 键）
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 层级类型 (Level Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LevelType {
    #[serde(rename = "지상")]
    Ground, // 地上
    #[serde(rename = "지하")]
    Basement, // 地下
}

impl LevelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LevelType::Ground => "지상",
            LevelType::Basement => "지하",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "지상" => Some(LevelType::Ground),
            "지하" => Some(LevelType::Basement),
            _ => None,
        }
    }
}

impl fmt::Display for LevelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 层分类 (Floor Class)
// ==========================================
// 셋팅층: 模板体系由整体组装切换为周转体系的层
// 기준층: 标准层，可合并为范围行
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FloorClass {
    #[serde(rename = "지하층")]
    Basement,
    #[serde(rename = "일반층")]
    General,
    #[serde(rename = "셋팅층")]
    Setting,
    #[serde(rename = "기준층")]
    Standard,
    #[serde(rename = "최상층")]
    Top,
    #[serde(rename = "옥탑층")]
    Penthouse,
}

impl FloorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            FloorClass::Basement => "지하층",
            FloorClass::General => "일반층",
            FloorClass::Setting => "셋팅층",
            FloorClass::Standard => "기준층",
            FloorClass::Top => "최상층",
            FloorClass::Penthouse => "옥탑층",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "지하층" => Some(FloorClass::Basement),
            "일반층" => Some(FloorClass::General),
            "셋팅층" => Some(FloorClass::Setting),
            "기준층" => Some(FloorClass::Standard),
            "최상층" => Some(FloorClass::Top),
            "옥탑층" => Some(FloorClass::Penthouse),
            _ => None,
        }
    }

    /// 范围合并时单独输出的分类
    pub fn is_emitted_individually(&self) -> bool {
        !matches!(self, FloorClass::Standard)
    }
}

impl fmt::Display for FloorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 工种分组 (Trade Group)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeGroup {
    #[serde(rename = "버림")]
    Blinding, // 垫层
    #[serde(rename = "기초")]
    Foundation, // 基础
    #[serde(rename = "아파트")]
    Apartment, // 上部结构（实际楼层）
}

impl TradeGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeGroup::Blinding => "버림",
            TradeGroup::Foundation => "기초",
            TradeGroup::Apartment => "아파트",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "버림" => Some(TradeGroup::Blinding),
            "기초" => Some(TradeGroup::Foundation),
            "아파트" => Some(TradeGroup::Apartment),
            _ => None,
        }
    }
}

impl fmt::Display for TradeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 物量指标 (Trade Metric)
// ==========================================
// 工种 × 子指标 的封闭组合，非法组合在编译期不可表达
// 列字母与工序模块表中的引用列一一对应
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TradeMetric {
    GangFormArea,   // B: gangForm.areaM2
    AlFormArea,     // C: alForm.areaM2
    FormworkArea,   // D: formwork.areaM2
    StripCleanArea, // E: stripClean.areaM2
    RebarTon,       // F: rebar.ton
    ConcreteVolume, // G: concrete.volumeM3
}

impl TradeMetric {
    pub const ALL: [TradeMetric; 6] = [
        TradeMetric::GangFormArea,
        TradeMetric::AlFormArea,
        TradeMetric::FormworkArea,
        TradeMetric::StripCleanArea,
        TradeMetric::RebarTon,
        TradeMetric::ConcreteVolume,
    ];

    /// 工种键（存储 JSON 的一级键）
    pub fn trade_key(&self) -> &'static str {
        match self {
            TradeMetric::GangFormArea => "gangForm",
            TradeMetric::AlFormArea => "alForm",
            TradeMetric::FormworkArea => "formwork",
            TradeMetric::StripCleanArea => "stripClean",
            TradeMetric::RebarTon => "rebar",
            TradeMetric::ConcreteVolume => "concrete",
        }
    }

    /// 子指标键（存储 JSON 的二级键）
    pub fn sub_metric_key(&self) -> &'static str {
        match self {
            TradeMetric::GangFormArea
            | TradeMetric::AlFormArea
            | TradeMetric::FormworkArea
            | TradeMetric::StripCleanArea => "areaM2",
            TradeMetric::RebarTon => "ton",
            TradeMetric::ConcreteVolume => "volumeM3",
        }
    }

    /// 由 (工种键, 子指标键) 还原；不存在的组合返回 None
    pub fn from_keys(trade: &str, sub_metric: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.trade_key() == trade && m.sub_metric_key() == sub_metric)
    }

    pub fn column(&self) -> char {
        match self {
            TradeMetric::GangFormArea => 'B',
            TradeMetric::AlFormArea => 'C',
            TradeMetric::FormworkArea => 'D',
            TradeMetric::StripCleanArea => 'E',
            TradeMetric::RebarTon => 'F',
            TradeMetric::ConcreteVolume => 'G',
        }
    }

    pub fn from_column(column: char) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.column() == column)
    }
}

impl fmt::Display for TradeMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.trade_key(), self.sub_metric_key())
    }
}
