// ==========================================
// 楼栋层物量引擎 - 范围合并器 (RangeConsolidator)
// ==========================================
// 正向（显示）: 地上层按层号升序遍历
//   - 셋팅층/일반층/최상층 单独输出
//   - 连续两层以上的기준층 → 一个范围行 "{start}~{end}F"
//   - 地下层、屋顶层不参与合并
//   - 主轴内缺失的层 → 占位层（기준층，主轴顶层为최상층）
// 反向（存储）: 范围成员 ID = "{rangeFloorId}-{N}F"
//   - 物量写入扇出: 缺失成员按范围当前值复制一次，已存在的成员不覆盖
//   - 分类写入扇出: 作用到每个成员层
// ==========================================

use crate::domain::floor::{
    DisplayRow, Floor, FloorView, PlaceholderFloor, RangeBacking, RangeMember, RangeView,
};
use crate::domain::label::{level_number, FloorLabel, FloorLevel};
use crate::domain::trade::{FloorTrade, TradeQuantities};
use crate::domain::types::{FloorClass, LevelType, TradeGroup, TradeMetric};
use crate::engine::core_geometry::DisplayLayout;
use crate::engine::floor_classifier::{ClassificationOutcome, FloorClassifier};
use std::collections::BTreeMap;

/// 范围成员的派生 ID
pub fn individual_floor_id(range_floor_id: &str, floor_number: u32) -> String {
    format!("{}-{}F", range_floor_id, floor_number)
}

/// 扇出写入计划（需要新增或更新的物量记录）
#[derive(Debug, Clone, PartialEq)]
pub struct QuantityFanOut {
    pub upserts: Vec<FloorTrade>,
    /// 本次扇出新建的成员数
    pub created: usize,
}

/// 范围分类写入结果
#[derive(Debug, Clone, PartialEq)]
pub struct RangeClassificationOutcome {
    pub outcome: ClassificationOutcome,
    /// 被展开而删除的范围记录 ID
    pub removed_floor_ids: Vec<String>,
}

// ==========================================
// RangeConsolidator
// ==========================================
pub struct RangeConsolidator {
    classifier: FloorClassifier,
}

impl RangeConsolidator {
    pub fn new() -> Self {
        Self {
            classifier: FloorClassifier::new(),
        }
    }

    // ==========================================
    // 正向: 层 → 显示行
    // ==========================================

    /// 合并为显示行（按核心，地下 → 地上 → 屋顶）
    pub fn consolidate_for_display(&self, floors: &[Floor], layout: &DisplayLayout) -> Vec<DisplayRow> {
        let mut rows = Vec::new();
        for core in 0..layout.core_count {
            self.consolidate_core(floors, layout, core, &mut rows);
        }
        rows
    }

    fn consolidate_core(
        &self,
        floors: &[Floor],
        layout: &DisplayLayout,
        core: usize,
        rows: &mut Vec<DisplayRow>,
    ) {
        let core_floors: Vec<&Floor> = floors
            .iter()
            .filter(|f| owns(f, core, layout))
            .collect();

        // 地下（由深到浅）
        let mut basements: Vec<&Floor> = core_floors
            .iter()
            .copied()
            .filter(|f| f.level_type == LevelType::Basement)
            .collect();
        basements.sort_by_key(|f| f.floor_number);
        rows.extend(basements.into_iter().map(|f| DisplayRow {
            core_index: core,
            view: FloorView::Real(f.clone()),
        }));

        // 地上单层: 层号 → 首个记录
        let mut individuals: BTreeMap<u32, &Floor> = BTreeMap::new();
        for floor in core_floors.iter().copied().filter(|f| f.is_ground_individual()) {
            if let Ok(n) = u32::try_from(floor.floor_number) {
                individuals.entry(n).or_insert(floor);
            }
        }

        // 范围记录: 跨度内没有任何单层记录时才生效
        let mut range_records: Vec<(u32, u32, &Floor)> = core_floors
            .iter()
            .copied()
            .filter_map(|f| f.range_span().map(|(s, e)| (s, e, f)))
            .filter(|(s, e, f)| {
                let overlapped = individuals.range(*s..=*e).next().is_some();
                if overlapped {
                    tracing::warn!(range_id = %f.id, "范围记录与单层记录重叠，忽略该范围记录");
                }
                !overlapped
            })
            .collect();
        range_records.sort_by_key(|(s, _, _)| *s);

        let top = layout.spine_top.max(
            range_records
                .iter()
                .map(|(_, e, _)| *e)
                .chain(individuals.keys().copied())
                .max()
                .unwrap_or(0),
        );

        let mut n = 1;
        while n <= top {
            if let Some(floor) = individuals.get(&n) {
                if floor.floor_class == FloorClass::Standard {
                    let mut run = vec![*floor];
                    let mut next = n + 1;
                    while let Some(candidate) = individuals.get(&next) {
                        if candidate.floor_class != FloorClass::Standard {
                            break;
                        }
                        run.push(candidate);
                        next += 1;
                    }
                    if run.len() >= 2 {
                        rows.push(DisplayRow {
                            core_index: core,
                            view: FloorView::Range(consolidated_range(&run, core, layout)),
                        });
                        n = next;
                        continue;
                    }
                }
                rows.push(DisplayRow {
                    core_index: core,
                    view: FloorView::Real((*floor).clone()),
                });
                n += 1;
                continue;
            }

            if let Some((start, end, record)) = range_records.iter().find(|(s, e, _)| (*s..=*e).contains(&n)) {
                rows.push(DisplayRow {
                    core_index: core,
                    view: FloorView::Range(record_range(record, *start, *end, core, layout)),
                });
                n = end + 1;
                continue;
            }

            let inferred_class = if n == layout.spine_top {
                FloorClass::Top
            } else {
                FloorClass::Standard
            };
            rows.push(DisplayRow {
                core_index: core,
                view: FloorView::Placeholder(PlaceholderFloor {
                    core_index: core,
                    floor_number: n,
                    label: FloorLabel::ground(layout.qualifier(core), n).to_string(),
                    inferred_class,
                }),
            });
            n += 1;
        }

        // 屋顶
        let mut penthouses: Vec<&Floor> = core_floors
            .iter()
            .copied()
            .filter(|f| f.level_type == LevelType::Ground && f.is_penthouse())
            .collect();
        penthouses.sort_by_key(|f| f.floor_number);
        rows.extend(penthouses.into_iter().map(|f| DisplayRow {
            core_index: core,
            view: FloorView::Real(f.clone()),
        }));
    }

    // ==========================================
    // 反向: 显示行 → 单层身份
    // ==========================================

    /// 展开显示行为 (层 ID, 分类) 列表；占位层不产生身份
    pub fn expand(&self, rows: &[DisplayRow]) -> Vec<(String, FloorClass)> {
        rows.iter()
            .flat_map(|row| match &row.view {
                FloorView::Real(floor) => vec![(floor.id.clone(), floor.floor_class)],
                FloorView::Range(range) => range
                    .members
                    .iter()
                    .map(|m| (m.floor_id.clone(), FloorClass::Standard))
                    .collect(),
                FloorView::Placeholder(_) => Vec::new(),
            })
            .collect()
    }

    /// 规划范围物量写入的扇出
    ///
    /// - `member`: None 表示写入整个范围行；Some(n) 表示写入范围内第 n 层
    /// - 范围当前值取层号最低且已有记录的成员
    /// - 缺失成员按范围当前值复制一次
    /// - 已存在的成员记录保持不变（单层数据优先于范围默认值）
    /// - 物量只落在成员层上，范围 ID 本身不挂物量
    #[allow(clippy::too_many_arguments)]
    pub fn plan_quantity_write(
        &self,
        building_id: &str,
        trades: &[FloorTrade],
        range: &RangeView,
        member: Option<u32>,
        trade_group: TradeGroup,
        metric: TradeMetric,
        value: f64,
    ) -> QuantityFanOut {
        let mut current = range_current_value(trades, range, trade_group);
        if member.is_none() {
            current.set(metric, value);
        }
        let representative = range.members.iter().map(|m| m.floor_number).min();

        let mut upserts = Vec::new();
        let mut created = 0;

        for m in &range.members {
            let is_target = member == Some(m.floor_number);
            let is_representative = member.is_none() && Some(m.floor_number) == representative;

            match find_group_trade(trades, &m.floor_id, trade_group) {
                None => {
                    let mut trades = current;
                    if is_target {
                        trades.set(metric, value);
                    }
                    upserts.push(FloorTrade::new(building_id, &m.floor_id, trade_group, trades));
                    created += 1;
                }
                Some(existing) if is_target || is_representative => {
                    upserts.push(touched(existing, metric, value));
                }
                Some(_) => {}
            }
        }

        tracing::debug!(
            range_id = %range.id,
            created,
            upserts = upserts.len(),
            "范围物量扇出"
        );
        QuantityFanOut { upserts, created }
    }

    /// 范围分类写入: 扇出到每个成员层
    ///
    /// 范围记录先展开为单层记录（ID 与派生成员 ID 一致，已有物量保持关联），
    /// 再按层号升序逐层执行分类 reducer
    pub fn apply_range_classification(
        &self,
        floors: &[Floor],
        range: &RangeView,
        new_class: FloorClass,
    ) -> RangeClassificationOutcome {
        let mut current = floors.to_vec();
        let mut removed_floor_ids = Vec::new();

        if range.backing == RangeBacking::Record {
            if let Some(record_index) = current.iter().position(|f| f.id == range.id) {
                let record = current.remove(record_index);
                removed_floor_ids.push(record.id.clone());
                let qualifier = record.label().and_then(|l| l.core);
                for m in &range.members {
                    current.push(Floor {
                        id: m.floor_id.clone(),
                        building_id: record.building_id.clone(),
                        floor_label: FloorLabel::ground(qualifier, m.floor_number).to_string(),
                        floor_number: level_number(m.floor_number),
                        level_type: LevelType::Ground,
                        floor_class: FloorClass::Standard,
                        height: record.height,
                    });
                }
            }
        }

        let mut member_ids: Vec<(u32, &str)> = range
            .members
            .iter()
            .map(|m| (m.floor_number, m.floor_id.as_str()))
            .collect();
        member_ids.sort_by_key(|(n, _)| *n);

        for (_, id) in &member_ids {
            current = self
                .classifier
                .apply_classification(&current, id, new_class)
                .floors;
        }

        let affected: Vec<Floor> = current
            .iter()
            .filter(|f| {
                member_ids.iter().any(|(_, id)| *id == f.id)
                    || floors
                        .iter()
                        .find(|b| b.id == f.id)
                        .map(|b| b.floor_class != f.floor_class)
                        .unwrap_or(true)
            })
            .cloned()
            .collect();

        RangeClassificationOutcome {
            outcome: ClassificationOutcome {
                floors: current,
                affected,
            },
            removed_floor_ids,
        }
    }
}

impl Default for RangeConsolidator {
    fn default() -> Self {
        Self::new()
    }
}

/// 层是否归属该核心（单核心布局下全部归属第 0 号核心）
fn owns(floor: &Floor, core: usize, layout: &DisplayLayout) -> bool {
    if layout.is_multi_core() {
        floor.core_index() == core
    } else {
        core == 0
    }
}

fn consolidated_range(run: &[&Floor], core: usize, layout: &DisplayLayout) -> RangeView {
    let first = run[0];
    let start = first.floor_number as u32;
    let end = start + run.len() as u32 - 1;
    RangeView {
        id: first.id.clone(),
        core_index: core,
        start,
        end,
        label: FloorLabel::new(layout.qualifier(core), FloorLevel::Range { start, end }).to_string(),
        representative_height: first.height,
        backing: RangeBacking::Consolidated,
        members: run
            .iter()
            .map(|f| RangeMember {
                floor_number: f.floor_number as u32,
                floor_id: f.id.clone(),
            })
            .collect(),
    }
}

fn record_range(record: &Floor, start: u32, end: u32, core: usize, layout: &DisplayLayout) -> RangeView {
    RangeView {
        id: record.id.clone(),
        core_index: core,
        start,
        end,
        label: FloorLabel::new(layout.qualifier(core), FloorLevel::Range { start, end }).to_string(),
        representative_height: record.height,
        backing: RangeBacking::Record,
        members: (start..=end)
            .map(|n| RangeMember {
                floor_number: n,
                floor_id: individual_floor_id(&record.id, n),
            })
            .collect(),
    }
}

fn touched(existing: &FloorTrade, metric: TradeMetric, value: f64) -> FloorTrade {
    let mut updated = existing.clone();
    updated.trades.set(metric, value);
    updated.updated_at = Some(chrono::Utc::now());
    updated
}

/// 范围当前值: 层号最低且已有该分组记录的成员，全部缺失时为空
pub fn range_current_value(trades: &[FloorTrade], range: &RangeView, trade_group: TradeGroup) -> TradeQuantities {
    let mut members: Vec<&RangeMember> = range.members.iter().collect();
    members.sort_by_key(|m| m.floor_number);
    members
        .into_iter()
        .find_map(|m| find_group_trade(trades, &m.floor_id, trade_group))
        .map(|t| t.trades)
        .unwrap_or_default()
}

/// 按 (层 ID, 工种分组) 查找物量记录
pub fn find_group_trade<'a>(
    trades: &'a [FloorTrade],
    floor_id: &str,
    trade_group: TradeGroup,
) -> Option<&'a FloorTrade> {
    trades
        .iter()
        .find(|t| t.floor_id == floor_id && t.trade_group == trade_group)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_floor(label: &str, number: i32, class: FloorClass) -> Floor {
        Floor {
            id: format!("BLD-{}", label),
            building_id: "BLD".to_string(),
            floor_label: label.to_string(),
            floor_number: number,
            level_type: if number < 0 {
                LevelType::Basement
            } else {
                LevelType::Ground
            },
            floor_class: class,
            height: Some(2850.0),
        }
    }

    fn create_test_layout(core_count: usize, spine_top: u32) -> DisplayLayout {
        DisplayLayout {
            core_count,
            spine_top,
        }
    }

    fn create_scenario_floors() -> Vec<Floor> {
        let mut floors = vec![create_test_floor("B1", -1, FloorClass::Basement)];
        floors.push(create_test_floor("1F", 1, FloorClass::Setting));
        for n in 2..=14 {
            floors.push(create_test_floor(&format!("{}F", n), n, FloorClass::Standard));
        }
        floors.push(create_test_floor("PH1", 15, FloorClass::Penthouse));
        floors
    }

    #[test]
    fn test_consolidate_standard_run() {
        let floors = create_scenario_floors();
        let rows = RangeConsolidator::new().consolidate_for_display(&floors, &create_test_layout(1, 14));
        let labels: Vec<&str> = rows.iter().map(|r| r.view.label()).collect();
        assert_eq!(labels, vec!["B1", "1F", "2~14F", "PH1"]);

        let FloorView::Range(range) = &rows[2].view else {
            panic!("expected range row");
        };
        assert_eq!(range.members.len(), 13);
        assert_eq!(range.backing, RangeBacking::Consolidated);
        assert_eq!(range.id, "BLD-2F");
    }

    #[test]
    fn test_single_standard_floor_is_not_ranged() {
        let floors = vec![
            create_test_floor("1F", 1, FloorClass::Setting),
            create_test_floor("2F", 2, FloorClass::Standard),
            create_test_floor("3F", 3, FloorClass::General),
            create_test_floor("4F", 4, FloorClass::Standard),
            create_test_floor("5F", 5, FloorClass::Standard),
            create_test_floor("6F", 6, FloorClass::Top),
        ];
        let rows = RangeConsolidator::new().consolidate_for_display(&floors, &create_test_layout(1, 6));
        let labels: Vec<&str> = rows.iter().map(|r| r.view.label()).collect();
        assert_eq!(labels, vec!["1F", "2F", "3F", "4~5F", "6F"]);
    }

    #[test]
    fn test_placeholders_for_missing_floors() {
        let floors = vec![
            create_test_floor("1F", 1, FloorClass::Setting),
            create_test_floor("2F", 2, FloorClass::Standard),
        ];
        let rows = RangeConsolidator::new().consolidate_for_display(&floors, &create_test_layout(1, 4));
        assert_eq!(rows.len(), 4);
        assert!(rows[2].view.is_placeholder());
        assert_eq!(rows[2].view.floor_class(), FloorClass::Standard);
        assert_eq!(rows[3].view.floor_class(), FloorClass::Top);
    }

    #[test]
    fn test_range_record_backed_view() {
        let floors = vec![
            create_test_floor("1F", 1, FloorClass::Setting),
            create_test_floor("2~5F", 2, FloorClass::Standard),
        ];
        let rows = RangeConsolidator::new().consolidate_for_display(&floors, &create_test_layout(1, 5));
        assert_eq!(rows.len(), 2);
        let FloorView::Range(range) = &rows[1].view else {
            panic!("expected range row");
        };
        assert_eq!(range.backing, RangeBacking::Record);
        assert_eq!(range.members[0].floor_id, "BLD-2~5F-2F");
        assert_eq!(range.members[3].floor_id, "BLD-2~5F-5F");
    }

    #[test]
    fn test_expand_round_trip() {
        let floors = create_scenario_floors();
        let consolidator = RangeConsolidator::new();
        let rows = consolidator.consolidate_for_display(&floors, &create_test_layout(1, 14));
        let mut expanded = consolidator.expand(&rows);
        let mut original: Vec<(String, FloorClass)> =
            floors.iter().map(|f| (f.id.clone(), f.floor_class)).collect();
        expanded.sort_by(|a, b| a.0.cmp(&b.0));
        original.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(expanded, original);
    }

    #[test]
    fn test_member_write_copies_range_value_to_untouched_siblings() {
        let floors = create_scenario_floors();
        let consolidator = RangeConsolidator::new();
        let rows = consolidator.consolidate_for_display(&floors, &create_test_layout(1, 14));
        let FloorView::Range(range) = &rows[2].view else {
            panic!("expected range row");
        };
        let existing = vec![FloorTrade::new(
            "BLD",
            "BLD-2F",
            TradeGroup::Apartment,
            TradeQuantities::default().with(TradeMetric::RebarTon, 8.0),
        )];

        let fan_out = consolidator.plan_quantity_write(
            "BLD",
            &existing,
            range,
            Some(7),
            TradeGroup::Apartment,
            TradeMetric::RebarTon,
            11.0,
        );
        // 3F..14F 新建 12 条，2F 已存在保持不变
        assert_eq!(fan_out.created, 12);
        let seventh = fan_out.upserts.iter().find(|t| t.floor_id == "BLD-7F").unwrap();
        assert_eq!(seventh.value(TradeMetric::RebarTon), 11.0);
        let fifth = fan_out.upserts.iter().find(|t| t.floor_id == "BLD-5F").unwrap();
        assert_eq!(fifth.value(TradeMetric::RebarTon), 8.0);
        assert!(fan_out.upserts.iter().all(|t| t.floor_id != "BLD-2F"));
    }

    #[test]
    fn test_range_row_write_leaves_existing_members() {
        let floors = create_scenario_floors();
        let consolidator = RangeConsolidator::new();
        let rows = consolidator.consolidate_for_display(&floors, &create_test_layout(1, 14));
        let FloorView::Range(range) = &rows[2].view else {
            panic!("expected range row");
        };
        let existing = vec![FloorTrade::new(
            "BLD",
            "BLD-9F",
            TradeGroup::Apartment,
            TradeQuantities::default().with(TradeMetric::FormworkArea, 55.0),
        )];
        let fan_out = consolidator.plan_quantity_write(
            "BLD",
            &existing,
            range,
            None,
            TradeGroup::Apartment,
            TradeMetric::FormworkArea,
            70.0,
        );
        assert_eq!(fan_out.created, 12);
        assert!(fan_out.upserts.iter().all(|t| t.floor_id != "BLD-9F"));
        assert!(fan_out
            .upserts
            .iter()
            .all(|t| t.value(TradeMetric::FormworkArea) == 70.0));
    }

    fn create_record_range_floors() -> Vec<Floor> {
        vec![
            create_test_floor("1F", 1, FloorClass::Setting),
            create_test_floor("2~14F", 2, FloorClass::Standard),
        ]
    }

    #[test]
    fn test_record_range_member_write_copies_lowest_member_value() {
        let floors = create_record_range_floors();
        let consolidator = RangeConsolidator::new();
        let rows = consolidator.consolidate_for_display(&floors, &create_test_layout(1, 14));
        let FloorView::Range(range) = &rows[1].view else {
            panic!("expected range row");
        };
        let existing = vec![FloorTrade::new(
            "BLD",
            "BLD-2~14F-2F",
            TradeGroup::Apartment,
            TradeQuantities::default().with(TradeMetric::ConcreteVolume, 40.0),
        )];
        let fan_out = consolidator.plan_quantity_write(
            "BLD",
            &existing,
            range,
            Some(7),
            TradeGroup::Apartment,
            TradeMetric::ConcreteVolume,
            55.0,
        );
        assert_eq!(fan_out.created, 12);
        let value_of = |id: &str| {
            fan_out
                .upserts
                .iter()
                .find(|t| t.floor_id == id)
                .map(|t| t.value(TradeMetric::ConcreteVolume))
        };
        assert_eq!(value_of("BLD-2~14F-7F"), Some(55.0));
        assert_eq!(value_of("BLD-2~14F-5F"), Some(40.0));
        assert_eq!(value_of("BLD-2~14F-2F"), None);
        assert_eq!(value_of("BLD-2~14F"), None);
    }

    #[test]
    fn test_record_range_row_write_never_targets_range_id() {
        let floors = create_record_range_floors();
        let consolidator = RangeConsolidator::new();
        let rows = consolidator.consolidate_for_display(&floors, &create_test_layout(1, 14));
        let FloorView::Range(range) = &rows[1].view else {
            panic!("expected range row");
        };
        let fan_out = consolidator.plan_quantity_write(
            "BLD",
            &[],
            range,
            None,
            TradeGroup::Apartment,
            TradeMetric::ConcreteVolume,
            10.0,
        );
        let ids: Vec<&str> = fan_out.upserts.iter().map(|t| t.floor_id.as_str()).collect();
        assert!(!ids.contains(&"BLD-2~14F"));
        assert_eq!(ids.len(), 13);
        assert_eq!(ids[0], "BLD-2~14F-2F");
        assert!(fan_out
            .upserts
            .iter()
            .all(|t| t.value(TradeMetric::ConcreteVolume) == 10.0));
    }

    #[test]
    fn test_range_row_write_updates_lowest_existing_member() {
        let floors = create_record_range_floors();
        let consolidator = RangeConsolidator::new();
        let rows = consolidator.consolidate_for_display(&floors, &create_test_layout(1, 14));
        let FloorView::Range(range) = &rows[1].view else {
            panic!("expected range row");
        };
        let existing = vec![
            FloorTrade::new(
                "BLD",
                "BLD-2~14F-2F",
                TradeGroup::Apartment,
                TradeQuantities::default().with(TradeMetric::RebarTon, 3.0),
            ),
            FloorTrade::new(
                "BLD",
                "BLD-2~14F-8F",
                TradeGroup::Apartment,
                TradeQuantities::default().with(TradeMetric::RebarTon, 7.0),
            ),
        ];
        let fan_out = consolidator.plan_quantity_write(
            "BLD",
            &existing,
            range,
            None,
            TradeGroup::Apartment,
            TradeMetric::RebarTon,
            4.0,
        );
        // 2F 为代表成员随整行更新，8F 保持单层数据
        assert_eq!(fan_out.created, 11);
        assert!(fan_out.upserts.iter().all(|t| t.floor_id != "BLD-2~14F-8F"));
        let second = fan_out
            .upserts
            .iter()
            .find(|t| t.floor_id == "BLD-2~14F-2F")
            .unwrap();
        assert_eq!(second.value(TradeMetric::RebarTon), 4.0);
    }

    #[test]
    fn test_range_record_classification_materializes_members() {
        let floors = vec![
            create_test_floor("1F", 1, FloorClass::Setting),
            create_test_floor("2~6F", 2, FloorClass::Standard),
        ];
        let consolidator = RangeConsolidator::new();
        let rows = consolidator.consolidate_for_display(&floors, &create_test_layout(1, 6));
        let FloorView::Range(range) = &rows[1].view else {
            panic!("expected range row");
        };
        let result = consolidator.apply_range_classification(&floors, range, FloorClass::General);
        assert_eq!(result.removed_floor_ids, vec!["BLD-2~6F".to_string()]);
        let floors = &result.outcome.floors;
        assert_eq!(floors.len(), 6);
        let sixth = floors.iter().find(|f| f.id == "BLD-2~6F-6F").unwrap();
        assert_eq!(sixth.floor_label, "6F");
        assert_eq!(sixth.floor_class, FloorClass::General);
        assert_eq!(result.outcome.affected.len(), 5);
    }
}
