// ==========================================
// 楼栋层物量引擎 - 引用表达式 (Reference Pattern)
// ==========================================
// 语法: COL DIGIT+ ("*" FLOAT)? ("+" COL DIGIT+ ("*" FLOAT)?)*
//   COL: B=갱폼 C=알폼 D=형틀 E=해체정리 F=철근 G=콘크리트
//   行号 → 层上下文（固定表）:
//     6 → 버림, 7 → 기초, 8 → B2, 9 → B1,
//     11 → 1F（缺失时按 셋팅층 → 일반층 回退）,
//     12 → 2F（缺失时按 셋팅층 → 일반층 → 기준층 回退）,
//     13..25 → 3F..15F, 26..28 → PH1..PH3
//   回退取同核心、层号不低于目标层、首个命中分类中层号最低的单层
// 宽松模式: 无法解析 → 0（记录 warn）
// 严格模式: 返回 ReferenceError
// ==========================================

use crate::domain::building::Building;
use crate::domain::label::{FloorLabel, FloorLevel};
use crate::domain::types::{FloorClass, TradeGroup, TradeMetric};
use crate::engine::quantity_resolver::QuantityResolver;
use std::collections::HashSet;
use thiserror::Error;

// ==========================================
// 解析错误
// ==========================================
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReferenceError {
    #[error("引用表达式为空")]
    Empty,

    #[error("无效的列: {found} (位置 {position})")]
    InvalidColumn { found: String, position: usize },

    #[error("列 {column} 后缺少行号 (位置 {position})")]
    MissingRow { column: char, position: usize },

    #[error("无效的比例系数: {found} (位置 {position})")]
    InvalidFactor { found: String, position: usize },

    #[error("多余的输入: {found} (位置 {position})")]
    TrailingInput { found: String, position: usize },
}

// ==========================================
// 语法树
// ==========================================

/// 一项引用（列 + 行号 + 可选比例）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceTerm {
    pub metric: TradeMetric,
    pub row: u32,
    pub factor: Option<f64>,
}

/// 由 "+" 连接的若干项
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceExpr {
    pub terms: Vec<ReferenceTerm>,
}

/// 行号所指的物量上下文
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowContext {
    Group(TradeGroup),
    Floor(FloorLevel),
    /// 目标层缺失时按分类顺序回退
    ClassedFloor {
        level: FloorLevel,
        fallback: &'static [FloorClass],
    },
}

const FLOOR1_FALLBACK: &[FloorClass] = &[FloorClass::Setting, FloorClass::General];
const FLOOR2_FALLBACK: &[FloorClass] = &[FloorClass::Setting, FloorClass::General, FloorClass::Standard];

/// 行号映射表；未定义的行号返回 None
pub fn row_context(row: u32) -> Option<RowContext> {
    match row {
        6 => Some(RowContext::Group(TradeGroup::Blinding)),
        7 => Some(RowContext::Group(TradeGroup::Foundation)),
        8 => Some(RowContext::Floor(FloorLevel::Basement(2))),
        9 => Some(RowContext::Floor(FloorLevel::Basement(1))),
        11 => Some(RowContext::ClassedFloor {
            level: FloorLevel::Ground(1),
            fallback: FLOOR1_FALLBACK,
        }),
        12 => Some(RowContext::ClassedFloor {
            level: FloorLevel::Ground(2),
            fallback: FLOOR2_FALLBACK,
        }),
        13..=25 => Some(RowContext::Floor(FloorLevel::Ground(row - 10))),
        26..=28 => Some(RowContext::Floor(FloorLevel::Penthouse(row - 25))),
        _ => None,
    }
}

// ==========================================
// 解析器
// ==========================================

/// 解析引用表达式（允许空白）
pub fn parse_reference(pattern: &str) -> Result<ReferenceExpr, ReferenceError> {
    let chars: Vec<char> = pattern.chars().filter(|c| !c.is_whitespace()).collect();
    if chars.is_empty() {
        return Err(ReferenceError::Empty);
    }

    let mut pos = 0;
    let mut terms = Vec::new();
    loop {
        terms.push(parse_term(&chars, &mut pos)?);
        match chars.get(pos) {
            None => break,
            Some('+') => pos += 1,
            Some(_) => {
                return Err(ReferenceError::TrailingInput {
                    found: chars[pos..].iter().collect(),
                    position: pos,
                })
            }
        }
    }
    Ok(ReferenceExpr { terms })
}

fn parse_term(chars: &[char], pos: &mut usize) -> Result<ReferenceTerm, ReferenceError> {
    let column = chars.get(*pos).copied().ok_or(ReferenceError::InvalidColumn {
        found: String::new(),
        position: *pos,
    })?;
    let metric = TradeMetric::from_column(column.to_ascii_uppercase()).ok_or_else(|| {
        ReferenceError::InvalidColumn {
            found: column.to_string(),
            position: *pos,
        }
    })?;
    *pos += 1;

    let digits = take_while(chars, pos, |c| c.is_ascii_digit());
    let row = digits
        .parse::<u32>()
        .map_err(|_| ReferenceError::MissingRow {
            column,
            position: *pos,
        })?;

    let mut factor = None;
    if chars.get(*pos) == Some(&'*') {
        *pos += 1;
        let start = *pos;
        let text = take_while(chars, pos, |c| c.is_ascii_digit() || c == '.');
        let value = text
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or(ReferenceError::InvalidFactor {
                found: text,
                position: start,
            })?;
        factor = Some(value);
    }

    Ok(ReferenceTerm {
        metric,
        row,
        factor,
    })
}

fn take_while(chars: &[char], pos: &mut usize, pred: impl Fn(char) -> bool) -> String {
    let start = *pos;
    while chars.get(*pos).map(|c| pred(*c)).unwrap_or(false) {
        *pos += 1;
    }
    chars[start..*pos].iter().collect()
}

// ==========================================
// 求值
// ==========================================

/// 严格模式求值
pub fn try_quantity_by_reference(building: &Building, pattern: &str) -> Result<f64, ReferenceError> {
    let expr = parse_reference(pattern)?;
    let resolver = QuantityResolver::new(building);
    Ok(expr
        .terms
        .iter()
        .map(|term| evaluate_term(&resolver, term))
        .sum())
}

/// 宽松模式求值：无法解析时为 0
pub fn quantity_by_reference(building: &Building, pattern: &str) -> f64 {
    match try_quantity_by_reference(building, pattern) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(pattern, error = %e, "引用表达式无法解析，按 0 处理");
            0.0
        }
    }
}

/// 单项求值（未定义行号为 0）
pub fn evaluate_term(resolver: &QuantityResolver<'_>, term: &ReferenceTerm) -> f64 {
    let base = match row_context(term.row) {
        Some(RowContext::Group(group)) => resolver.group_total(group, term.metric),
        Some(RowContext::Floor(level)) => floor_total(resolver, level, &[], term.metric),
        Some(RowContext::ClassedFloor { level, fallback }) => {
            floor_total(resolver, level, fallback, term.metric)
        }
        None => {
            tracing::debug!(row = term.row, "行号未映射，按 0 处理");
            0.0
        }
    };
    let value = base * term.factor.unwrap_or(1.0);
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// 层上下文物量；多核心楼栋按核心合计（同一层记录只计一次）
fn floor_total(
    resolver: &QuantityResolver<'_>,
    level: FloorLevel,
    fallback: &[FloorClass],
    metric: TradeMetric,
) -> f64 {
    let building = resolver.building();
    let cores: Vec<Option<usize>> = if building.is_multi_core() {
        (0..building.core_count()).map(Some).collect()
    } else {
        vec![None]
    };

    let mut seen = HashSet::new();
    cores
        .into_iter()
        .filter_map(|core| {
            let label = FloorLabel::new(core, level).to_string();
            resolver
                .resolve_floor_id(&label, None)
                .or_else(|| class_fallback(building, core, level, fallback))
        })
        .filter(|id| seen.insert(id.clone()))
        .map(|id| resolver.quantity_for_floor_id(&id, metric))
        .sum()
}

/// 按分类顺序回退: 层号不低于目标层的单层中，首个命中分类的最低层
fn class_fallback(
    building: &Building,
    core: Option<usize>,
    level: FloorLevel,
    fallback: &[FloorClass],
) -> Option<String> {
    let FloorLevel::Ground(min) = level else {
        return None;
    };
    let min = i32::try_from(min).ok()?;
    fallback.iter().find_map(|class| {
        building
            .floors
            .iter()
            .filter(|f| f.is_ground_individual() && f.floor_class == *class && f.floor_number >= min)
            .filter(|f| core.map(|c| f.core_index() == c).unwrap_or(true))
            .min_by_key(|f| f.floor_number)
            .map(|f| f.id.clone())
    })
}
