// ==========================================
// 楼栋层物量引擎 - 层领域模型
// ==========================================
// Floor: 一个物理层（或持久化的紧凑范围记录）
// FloorView: 画面显示用的视图对象（真实层 / 范围 / 占位）
// ==========================================

use crate::domain::label::{FloorLabel, FloorLevel};
use crate::domain::types::{FloorClass, LevelType};
use serde::{Deserialize, Serialize};

// ==========================================
// Floor - 层
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Floor {
    pub id: String,
    pub building_id: String,
    pub floor_label: String,
    pub floor_number: i32,
    pub level_type: LevelType,
    pub floor_class: FloorClass,
    pub height: Option<f64>,
}

impl Floor {
    pub fn label(&self) -> Option<FloorLabel> {
        FloorLabel::parse(&self.floor_label)
    }

    /// 所属核心（未限定核心的标签视为第 0 号核心）
    pub fn core_index(&self) -> usize {
        self.label().and_then(|l| l.core).unwrap_or(0)
    }

    pub fn is_penthouse(&self) -> bool {
        self.floor_class == FloorClass::Penthouse
            || matches!(
                self.label().map(|l| l.level),
                Some(FloorLevel::Penthouse(_))
            )
    }

    /// 持久化的紧凑范围记录（标签形如 2~14F）
    pub fn is_range_record(&self) -> bool {
        self.label().map(|l| l.is_range()).unwrap_or(false)
    }

    /// 范围记录的层号区间
    pub fn range_span(&self) -> Option<(u32, u32)> {
        match self.label()?.level {
            FloorLevel::Range { start, end } => Some((start, end)),
            _ => None,
        }
    }

    /// 参与分类级联/层高推断的地上单层（不含屋顶层和范围记录）
    pub fn is_ground_individual(&self) -> bool {
        self.level_type == LevelType::Ground
            && self.floor_number >= 1
            && !self.is_penthouse()
            && !self.is_range_record()
    }
}

// ==========================================
// FloorView - 显示视图
// ==========================================

/// 范围成员（一个被合并的具体层）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeMember {
    pub floor_number: u32,
    /// 成员层的记录 ID（真实层 ID，或 "<rangeFloorId>-<N>F" 派生 ID）
    pub floor_id: String,
}

/// 范围的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RangeBacking {
    /// 由连续的真实기준층合并而成
    Consolidated,
    /// 来自持久化的紧凑范围记录
    Record,
}

/// 范围视图（不持久化）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeView {
    /// Consolidated: 首个成员层 ID；Record: 范围记录 ID
    pub id: String,
    pub core_index: usize,
    pub start: u32,
    pub end: u32,
    pub label: String,
    pub representative_height: Option<f64>,
    pub backing: RangeBacking,
    pub members: Vec<RangeMember>,
}

impl RangeView {
    pub fn contains(&self, floor: u32) -> bool {
        (self.start..=self.end).contains(&floor)
    }

    pub fn member(&self, floor: u32) -> Option<&RangeMember> {
        self.members.iter().find(|m| m.floor_number == floor)
    }

    /// 代表成员（层号最小者）
    pub fn representative(&self) -> Option<&RangeMember> {
        self.members.iter().min_by_key(|m| m.floor_number)
    }
}

/// 占位层（没有对应的层记录，也没有物量记录）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceholderFloor {
    pub core_index: usize,
    pub floor_number: u32,
    pub label: String,
    pub inferred_class: FloorClass,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FloorView {
    Real(Floor),
    Range(RangeView),
    Placeholder(PlaceholderFloor),
}

impl FloorView {
    pub fn label(&self) -> &str {
        match self {
            FloorView::Real(floor) => &floor.floor_label,
            FloorView::Range(range) => &range.label,
            FloorView::Placeholder(placeholder) => &placeholder.label,
        }
    }

    pub fn floor_class(&self) -> FloorClass {
        match self {
            FloorView::Real(floor) => floor.floor_class,
            FloorView::Range(_) => FloorClass::Standard,
            FloorView::Placeholder(placeholder) => placeholder.inferred_class,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, FloorView::Placeholder(_))
    }
}

/// 显示行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayRow {
    pub core_index: usize,
    pub view: FloorView,
}
