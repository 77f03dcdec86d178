// ==========================================
// 楼栋层物量引擎 - 层结构重建 (Regeneration)
// ==========================================
// 层数变更后重新生成层集合:
//   - 新层集合由 CoreGeometryResolver 派生
//   - "아파트" 物量按 (核心, 层位) 重新关联到新层 ID
//     （范围成员 "{rangeId}-{N}F" → 同核心第 N 层）
//   - 버림/기초 物量不依赖层，原样保留
//   - 多条记录落到同一层位时，单层记录优先于范围成员记录
//   - 无法关联的物量记录被丢弃并记录 warn
// 调用方必须在重建前清空待写队列
// ==========================================

use crate::domain::building::Building;
use crate::domain::floor::Floor;
use crate::domain::label::FloorLevel;
use crate::domain::trade::FloorTrade;
use crate::domain::types::TradeGroup;
use crate::engine::core_geometry::CoreGeometryResolver;
use crate::engine::range_consolidator::individual_floor_id;
use std::collections::{HashMap, HashSet};
use tracing::instrument;

/// 层位键：(核心序号, 层位)
type SlotKey = (usize, FloorLevel);

/// 旧层 ID 的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum SlotSource {
    Individual,
    RangeMember,
}

/// 重建计划
#[derive(Debug, Clone, PartialEq)]
pub struct RegenerationPlan {
    /// 新层集合
    pub floors: Vec<Floor>,
    /// 新物量集合
    pub floor_trades: Vec<FloorTrade>,
    /// 旧集合中不再存在的层 ID
    pub removed_floor_ids: Vec<String>,
    /// 改挂到新层 ID 的物量记录数
    pub rekeyed: usize,
    /// 被丢弃的物量记录
    pub dropped_trades: Vec<FloorTrade>,
}

// ==========================================
// 生成重建计划
// ==========================================
#[instrument(skip(building), fields(building_id = %building.id))]
pub fn plan_regeneration(building: &Building) -> RegenerationPlan {
    let resolver = CoreGeometryResolver::new();
    let floors = resolver.derive_floors(building);

    let old_slots = slot_index(&building.floors);
    let new_ids: HashMap<SlotKey, String> = floors
        .iter()
        .filter_map(|f| f.label().map(|l| ((f.core_index(), l.level), f.id.clone())))
        .collect();
    let new_id_set: HashSet<&str> = floors.iter().map(|f| f.id.as_str()).collect();

    // 每条 "아파트" 记录的目标层 ID 与来源
    let targets: Vec<Option<(String, SlotSource)>> = building
        .floor_trades
        .iter()
        .map(|trade| {
            if new_id_set.contains(trade.floor_id.as_str()) {
                let source = old_slots
                    .get(&trade.floor_id)
                    .map(|(_, source)| *source)
                    .unwrap_or(SlotSource::Individual);
                return Some((trade.floor_id.clone(), source));
            }
            let (slot, source) = old_slots.get(&trade.floor_id)?;
            new_ids.get(slot).map(|id| (id.clone(), *source))
        })
        .collect();

    // 同一 (目标层, 分组) 的胜出记录: 单层优先，其次输入顺序
    let mut winners: HashMap<(String, TradeGroup), (SlotSource, usize)> = HashMap::new();
    for (index, (trade, target)) in building.floor_trades.iter().zip(&targets).enumerate() {
        if matches!(trade.trade_group, TradeGroup::Blinding | TradeGroup::Foundation) {
            continue;
        }
        if let Some((id, source)) = target {
            winners
                .entry((id.clone(), trade.trade_group))
                .and_modify(|best| {
                    if (*source, index) < *best {
                        *best = (*source, index);
                    }
                })
                .or_insert((*source, index));
        }
    }

    let mut floor_trades = Vec::new();
    let mut dropped_trades = Vec::new();
    let mut rekeyed = 0;

    for (index, (trade, target)) in building.floor_trades.iter().zip(targets).enumerate() {
        if matches!(trade.trade_group, TradeGroup::Blinding | TradeGroup::Foundation) {
            floor_trades.push(trade.clone());
            continue;
        }

        let Some((target, _)) = target else {
            tracing::warn!(floor_id = %trade.floor_id, trade_id = %trade.id, "层已不存在，丢弃物量记录");
            dropped_trades.push(trade.clone());
            continue;
        };

        let won = winners
            .get(&(target.clone(), trade.trade_group))
            .map(|(_, winner)| *winner == index)
            .unwrap_or(false);
        if !won {
            tracing::warn!(floor_id = %target, trade_id = %trade.id, "目标层已有同分组物量，丢弃重复记录");
            dropped_trades.push(trade.clone());
            continue;
        }

        let mut kept = trade.clone();
        if kept.floor_id != target {
            kept.floor_id = target;
            rekeyed += 1;
        }
        floor_trades.push(kept);
    }

    let removed_floor_ids: Vec<String> = building
        .floors
        .iter()
        .filter(|f| !new_id_set.contains(f.id.as_str()))
        .map(|f| f.id.clone())
        .collect();

    tracing::info!(
        floors = floors.len(),
        removed = removed_floor_ids.len(),
        rekeyed,
        dropped = dropped_trades.len(),
        "层结构重建计划生成"
    );

    RegenerationPlan {
        floors,
        floor_trades,
        removed_floor_ids,
        rekeyed,
        dropped_trades,
    }
}

/// 旧层 ID（含范围成员派生 ID）→ 层位及来源
fn slot_index(floors: &[Floor]) -> HashMap<String, (SlotKey, SlotSource)> {
    let mut index = HashMap::new();
    for floor in floors {
        let Some(label) = floor.label() else {
            continue;
        };
        let core = floor.core_index();
        match label.level {
            FloorLevel::Range { start, end } => {
                for n in start..=end {
                    index.insert(
                        individual_floor_id(&floor.id, n),
                        ((core, FloorLevel::Ground(n)), SlotSource::RangeMember),
                    );
                }
            }
            level => {
                index.insert(floor.id.clone(), ((core, level), SlotSource::Individual));
            }
        }
    }
    index
}
