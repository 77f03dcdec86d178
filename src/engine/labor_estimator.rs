// ==========================================
// 楼栋层物量引擎 - 人工估算器 (LaborEstimator)
// ==========================================
// 两种计算模式:
//   物量驱动: workers = ceil(总物量 / 人·日产量)
//   设备饱和驱动: units = ceil(min(设备上限, 总物量 / 设备基准))
//                 workers = ceil(units × 每台人数)
// 楼栋级汇总: 버림/기초 记录 + 每个地上/地下层的 "아파트" 记录
// ==========================================

use crate::domain::building::Building;
use crate::domain::process::{EquipmentSpec, ProcessCatalog, ProcessCategory, ProcessItem, ProcessModule};
use crate::domain::trade::{sanitize_quantity, TradeQuantities};
use crate::domain::types::TradeGroup;
use crate::engine::range_consolidator::{find_group_trade, individual_floor_id};
use crate::engine::reference_pattern::quantity_by_reference;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::instrument;

/// 单个工序项的估算结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaborEstimate {
    pub category: ProcessCategory,
    pub cycle_days: u32,
    pub seq: u32,
    pub work_step: String,
    pub total_quantity: f64,
    /// 设备模式下的设备台数
    pub equipment_units: Option<u32>,
    pub daily_workers: u32,
}

// ==========================================
// LaborEstimator
// ==========================================
pub struct LaborEstimator {}

impl LaborEstimator {
    pub fn new() -> Self {
        Self {}
    }

    /// 日需人数（对总物量单调不减；非正/非有限输入为 0）
    pub fn estimate_daily_workers(&self, item: &ProcessItem, total_quantity: f64) -> u32 {
        let quantity = sanitize_quantity(total_quantity);
        match &item.equipment {
            Some(spec) => {
                let units = self.equipment_units(spec, quantity);
                ceil_to_u32(units as f64 * spec.equipment_workers_per_unit)
            }
            None => {
                if item.daily_productivity <= 0.0 || !item.daily_productivity.is_finite() {
                    return 0;
                }
                ceil_to_u32(quantity / item.daily_productivity)
            }
        }
    }

    /// 设备台数 = ceil(min(上限, 总物量 / 设备基准))
    pub fn equipment_units(&self, spec: &EquipmentSpec, total_quantity: f64) -> u32 {
        let quantity = sanitize_quantity(total_quantity);
        if spec.equipment_calculation_base <= 0.0 || !spec.equipment_calculation_base.is_finite() {
            return 0;
        }
        let demand = quantity / spec.equipment_calculation_base;
        ceil_to_u32(demand.min(spec.max_equipment_units as f64))
    }

    /// 楼栋级物量汇总
    ///
    /// - 버림/기초 记录全部计入
    /// - 每个现存层的 "아파트" 记录计入一次，孤儿记录不计
    /// - 范围记录按成员计入：成员无记录时取范围当前值（层号最低的已有成员）
    pub fn aggregate_building_quantities(&self, building: &Building) -> TradeQuantities {
        let trades = &building.floor_trades;
        let mut totals = TradeQuantities::default();

        for trade in trades
            .iter()
            .filter(|t| matches!(t.trade_group, TradeGroup::Blinding | TradeGroup::Foundation))
        {
            totals.accumulate(&trade.trades);
        }

        let mut counted: HashSet<&str> = HashSet::new();
        for floor in &building.floors {
            if !counted.insert(floor.id.as_str()) {
                continue;
            }
            match floor.range_span() {
                Some((start, end)) => {
                    let range_default = (start..=end).find_map(|n| {
                        find_group_trade(trades, &individual_floor_id(&floor.id, n), TradeGroup::Apartment)
                    });
                    for n in start..=end {
                        let member_id = individual_floor_id(&floor.id, n);
                        if let Some(trade) =
                            find_group_trade(trades, &member_id, TradeGroup::Apartment).or(range_default)
                        {
                            totals.accumulate(&trade.trades);
                        }
                    }
                }
                None => {
                    if let Some(trade) = find_group_trade(trades, &floor.id, TradeGroup::Apartment) {
                        totals.accumulate(&trade.trades);
                    }
                }
            }
        }
        totals
    }

    /// 工序项的总物量：引用表达式优先，否则按楼栋汇总指标
    pub fn item_quantity(&self, building: &Building, totals: &TradeQuantities, item: &ProcessItem) -> f64 {
        if let Some(pattern) = item.quantity_reference.as_deref().filter(|p| !p.trim().is_empty()) {
            return quantity_by_reference(building, pattern);
        }
        item.trade_metric.map(|m| totals.get(m)).unwrap_or(0.0)
    }

    /// 估算单个工序模块
    pub fn estimate_module(&self, building: &Building, module: &ProcessModule) -> Vec<LaborEstimate> {
        let totals = self.aggregate_building_quantities(building);
        self.estimate_with_totals(building, &totals, module)
    }

    /// 估算整个目录（楼栋人工报告）
    #[instrument(skip(self, building, catalog), fields(building_id = %building.id))]
    pub fn estimate_catalog(&self, building: &Building, catalog: &ProcessCatalog) -> Vec<LaborEstimate> {
        let totals = self.aggregate_building_quantities(building);
        let estimates: Vec<LaborEstimate> = catalog
            .modules
            .iter()
            .flat_map(|module| self.estimate_with_totals(building, &totals, module))
            .collect();
        tracing::info!(items = estimates.len(), "人工估算完成");
        estimates
    }

    fn estimate_with_totals(
        &self,
        building: &Building,
        totals: &TradeQuantities,
        module: &ProcessModule,
    ) -> Vec<LaborEstimate> {
        let mut items: Vec<&ProcessItem> = module.items.iter().collect();
        items.sort_by_key(|i| i.seq);
        items
            .into_iter()
            .map(|item| {
                let total_quantity = self.item_quantity(building, totals, item);
                LaborEstimate {
                    category: module.category,
                    cycle_days: module.cycle_days,
                    seq: item.seq,
                    work_step: item.work_step.clone(),
                    total_quantity,
                    equipment_units: item
                        .equipment
                        .as_ref()
                        .map(|spec| self.equipment_units(spec, total_quantity)),
                    daily_workers: self.estimate_daily_workers(item, total_quantity),
                }
            })
            .collect()
    }
}

impl Default for LaborEstimator {
    fn default() -> Self {
        Self::new()
    }
}

fn ceil_to_u32(value: f64) -> u32 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    let ceiled = value.ceil();
    if ceiled >= u32::MAX as f64 {
        u32::MAX
    } else {
        ceiled as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::building::BuildingMeta;
    use crate::domain::floor::Floor;
    use crate::domain::trade::FloorTrade;
    use crate::domain::types::{FloorClass, LevelType, TradeMetric};

    fn create_test_item(productivity: f64, equipment: Option<EquipmentSpec>) -> ProcessItem {
        ProcessItem {
            seq: 1,
            work_step: "형틀 설치".to_string(),
            quantity_reference: None,
            trade_metric: Some(TradeMetric::FormworkArea),
            daily_productivity: productivity,
            equipment,
        }
    }

    fn create_test_pump(base: f64) -> EquipmentSpec {
        EquipmentSpec {
            equipment_calculation_base: base,
            equipment_workers_per_unit: 1.5,
            max_equipment_units: 3,
        }
    }

    #[test]
    fn test_area_mode() {
        let estimator = LaborEstimator::new();
        let item = create_test_item(25.0, None);
        assert_eq!(estimator.estimate_daily_workers(&item, 100.0), 4);
        assert_eq!(estimator.estimate_daily_workers(&item, 101.0), 5);
        assert_eq!(estimator.estimate_daily_workers(&item, 0.0), 0);
        assert_eq!(estimator.estimate_daily_workers(&item, f64::NAN), 0);
        assert_eq!(estimator.estimate_daily_workers(&create_test_item(0.0, None), 100.0), 0);
    }

    #[test]
    fn test_equipment_mode_saturates() {
        let estimator = LaborEstimator::new();
        let item = create_test_item(0.0, Some(create_test_pump(320.0)));
        // 500 / 320 = 1.56 → 2 台 → 3 人
        assert_eq!(estimator.estimate_daily_workers(&item, 500.0), 3);
        // 上限 3 台 → 4.5 → 5 人
        assert_eq!(estimator.estimate_daily_workers(&item, 5000.0), 5);
        assert_eq!(estimator.equipment_units(&create_test_pump(320.0), 5000.0), 3);
    }

    #[test]
    fn test_aggregate_skips_orphan_apartment_records() {
        let mut building = Building::new("BLD", "101동", BuildingMeta::default());
        building.floors.push(Floor {
            id: "f-r".to_string(),
            building_id: "BLD".to_string(),
            floor_label: "2~5F".to_string(),
            floor_number: 2,
            level_type: LevelType::Ground,
            floor_class: FloorClass::Standard,
            height: None,
        });
        let formwork = |v| TradeQuantities::default().with(TradeMetric::FormworkArea, v);
        building.floor_trades = vec![
            FloorTrade::new("BLD", "f-r-3F", TradeGroup::Apartment, formwork(10.0)),
            FloorTrade::new("BLD", "gone", TradeGroup::Apartment, formwork(99.0)),
            FloorTrade::new("BLD", "BLD-버림", TradeGroup::Blinding, formwork(5.0)),
        ];
        // 2F/4F/5F 无记录，取层号最低的已有成员 3F
        let totals = LaborEstimator::new().aggregate_building_quantities(&building);
        assert_eq!(totals.get(TradeMetric::FormworkArea), 45.0);

        // 范围 ID 上的记录不参与汇总
        building
            .floor_trades
            .push(FloorTrade::new("BLD", "f-r", TradeGroup::Apartment, formwork(50.0)));
        let totals = LaborEstimator::new().aggregate_building_quantities(&building);
        assert_eq!(totals.get(TradeMetric::FormworkArea), 45.0);

        // 2F 有记录后成为范围当前值: 2 + 10 + 2 + 2
        building
            .floor_trades
            .push(FloorTrade::new("BLD", "f-r-2F", TradeGroup::Apartment, formwork(2.0)));
        let totals = LaborEstimator::new().aggregate_building_quantities(&building);
        assert_eq!(totals.get(TradeMetric::FormworkArea), 21.0);
    }

    #[test]
    fn test_estimate_module_orders_by_seq() {
        let building = Building::new("BLD", "101동", BuildingMeta::default());
        let mut second = create_test_item(10.0, None);
        second.seq = 2;
        let module = ProcessModule {
            category: ProcessCategory::StandardFloor,
            cycle_days: 7,
            items: vec![second, create_test_item(10.0, None)],
        };
        let estimates = LaborEstimator::new().estimate_module(&building, &module);
        assert_eq!(estimates.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![1, 2]);
        assert!(estimates.iter().all(|e| e.daily_workers == 0));
    }
}
