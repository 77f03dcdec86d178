// ==========================================
// 楼栋层物量引擎 - 物量解析器 (QuantityResolver)
// ==========================================
// 按标签解析层物量，解析顺序:
//   1. 调用方指定的范围记录 ID（范围包含请求层号时）
//   2. 标签完全一致（层号升序首个命中）
//   3. 规范化标签一致（去核心前缀、옥탑K → PHK），同核心优先
//   4. 包含请求层号的范围记录，派生成员 ID "{rangeId}-{N}F"
// 成员尚无记录时取同范围内层号最低且已有记录的成员（范围当前值）
// 缺失层/缺失物量/缺失指标一律为 0，不报错
// ==========================================

use crate::domain::building::Building;
use crate::domain::floor::Floor;
use crate::domain::label::{normalize_label, FloorLabel, FloorLevel};
use crate::domain::trade::{sanitize_quantity, FloorTrade};
use crate::domain::types::{TradeGroup, TradeMetric};
use crate::engine::range_consolidator::individual_floor_id;

/// 以楼栋快照为输入的纯函数式物量解析器
pub struct QuantityResolver<'a> {
    building: &'a Building,
}

impl<'a> QuantityResolver<'a> {
    pub fn new(building: &'a Building) -> Self {
        Self { building }
    }

    pub fn building(&self) -> &'a Building {
        self.building
    }

    /// 解析标签对应的层记录 ID（含范围成员派生 ID）
    pub fn resolve_floor_id(&self, floor_label: &str, range_floor_id: Option<&str>) -> Option<String> {
        let raw = floor_label.trim();
        let requested = FloorLabel::parse(raw);
        let requested_number = requested.and_then(|l| match l.level {
            FloorLevel::Ground(n) => Some(n),
            _ => None,
        });

        // 1. 指定范围
        if let (Some(range_id), Some(n)) = (range_floor_id, requested_number) {
            if let Some(record) = self.building.find_floor(range_id) {
                if let Some((start, end)) = record.range_span() {
                    if (start..=end).contains(&n) {
                        return Some(individual_floor_id(&record.id, n));
                    }
                }
            }
        }

        // 2. 完全一致
        if let Some(floor) = first_by_number(self.building.floors.iter().filter(|f| f.floor_label.trim() == raw)) {
            return Some(floor.id.clone());
        }

        // 3. 规范化一致
        let cleaned = normalize_label(raw);
        let requested_core = requested.and_then(|l| l.core);
        let candidates: Vec<&Floor> = self
            .building
            .floors
            .iter()
            .filter(|f| !f.is_range_record() && normalize_label(&f.floor_label) == cleaned)
            .collect();
        if let Some(floor) = prefer_core(&candidates, requested_core) {
            return Some(floor.id.clone());
        }

        // 4. 范围记录
        let n = requested_number?;
        let ranges: Vec<&Floor> = self
            .building
            .floors
            .iter()
            .filter(|f| f.range_span().map(|(s, e)| (s..=e).contains(&n)).unwrap_or(false))
            .collect();
        prefer_core(&ranges, requested_core).map(|record| individual_floor_id(&record.id, n))
    }

    /// 层物量（"아파트" 优先，缺失为 0）
    pub fn get_quantity_from_floor(
        &self,
        floor_label: &str,
        metric: TradeMetric,
        range_floor_id: Option<&str>,
    ) -> f64 {
        let Some(floor_id) = self.resolve_floor_id(floor_label, range_floor_id) else {
            tracing::trace!(floor_label, "标签未命中任何层");
            return 0.0;
        };
        self.quantity_for_floor_id(&floor_id, metric)
    }

    /// 按层 ID 读取物量；范围成员尚无记录时取范围当前值
    pub fn quantity_for_floor_id(&self, floor_id: &str, metric: TradeMetric) -> f64 {
        self.find_floor_trade(floor_id)
            .or_else(|| self.range_current_trade(floor_id))
            .map(|t| t.value(metric))
            .unwrap_or(0.0)
    }

    /// 派生成员所属范围中层号最低且已有记录的成员
    fn range_current_trade(&self, member_id: &str) -> Option<&'a FloorTrade> {
        let (record, start, end) = self.range_owner(member_id)?;
        (start..=end).find_map(|n| self.find_floor_trade(&individual_floor_id(&record.id, n)))
    }

    /// 派生成员 ID 所属的范围记录及其跨度
    fn range_owner(&self, member_id: &str) -> Option<(&'a Floor, u32, u32)> {
        self.building.floors.iter().find_map(|f| {
            let (start, end) = f.range_span()?;
            (start..=end)
                .any(|n| individual_floor_id(&f.id, n) == member_id)
                .then_some((f, start, end))
        })
    }

    /// 层的物量记录：优先 "아파트"，否则取首个
    pub fn find_floor_trade(&self, floor_id: &str) -> Option<&'a FloorTrade> {
        let mut records = self
            .building
            .floor_trades
            .iter()
            .filter(|t| t.floor_id == floor_id);
        let first = records.next()?;
        if first.trade_group == TradeGroup::Apartment {
            return Some(first);
        }
        records
            .find(|t| t.trade_group == TradeGroup::Apartment)
            .or(Some(first))
    }

    /// 某工种分组全部记录的指标合计（버림/기초 使用）
    pub fn group_total(&self, trade_group: TradeGroup, metric: TradeMetric) -> f64 {
        let total: f64 = self
            .building
            .floor_trades
            .iter()
            .filter(|t| t.trade_group == trade_group)
            .map(|t| t.value(metric))
            .sum();
        sanitize_quantity(total)
    }
}

fn first_by_number<'f>(floors: impl Iterator<Item = &'f Floor>) -> Option<&'f Floor> {
    // min_by_key 在并列时保留首个
    floors.min_by_key(|f| f.floor_number)
}

/// 同核心优先，其次层号升序
fn prefer_core<'f>(candidates: &[&'f Floor], core: Option<usize>) -> Option<&'f Floor> {
    if let Some(core) = core {
        if let Some(found) = first_by_number(candidates.iter().copied().filter(|f| f.core_index() == core)) {
            return Some(found);
        }
    }
    first_by_number(candidates.iter().copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::building::BuildingMeta;
    use crate::domain::trade::TradeQuantities;
    use crate::domain::types::{FloorClass, LevelType};

    fn create_test_floor(id: &str, label: &str, number: i32) -> Floor {
        Floor {
            id: id.to_string(),
            building_id: "BLD".to_string(),
            floor_label: label.to_string(),
            floor_number: number,
            level_type: if number < 0 {
                LevelType::Basement
            } else {
                LevelType::Ground
            },
            floor_class: FloorClass::Standard,
            height: None,
        }
    }

    fn create_test_trade(floor_id: &str, group: TradeGroup, metric: TradeMetric, value: f64) -> FloorTrade {
        FloorTrade::new("BLD", floor_id, group, TradeQuantities::default().with(metric, value))
    }

    fn create_test_building() -> Building {
        let mut building = Building::new("BLD", "101동", BuildingMeta::default());
        building.floors = vec![
            create_test_floor("f-b1", "B1", -1),
            create_test_floor("f-1", "1F", 1),
            create_test_floor("f-r", "2~14F", 2),
            create_test_floor("f-ph1", "PH1", 15),
        ];
        building.floor_trades = vec![
            create_test_trade("f-1", TradeGroup::Apartment, TradeMetric::FormworkArea, 120.0),
            create_test_trade("f-r-7F", TradeGroup::Apartment, TradeMetric::FormworkArea, 90.0),
            create_test_trade("f-ph1", TradeGroup::Apartment, TradeMetric::ConcreteVolume, 33.0),
            create_test_trade("f-found", TradeGroup::Foundation, TradeMetric::RebarTon, 6.0),
            create_test_trade("f-found-2", TradeGroup::Foundation, TradeMetric::RebarTon, 4.0),
        ];
        building
    }

    #[test]
    fn test_exact_and_cleaned_label_match() {
        let building = create_test_building();
        let resolver = QuantityResolver::new(&building);
        assert_eq!(resolver.resolve_floor_id("1F", None), Some("f-1".to_string()));
        assert_eq!(resolver.resolve_floor_id("코어1-1F", None), Some("f-1".to_string()));
        assert_eq!(resolver.resolve_floor_id("옥탑1", None), Some("f-ph1".to_string()));
        assert_eq!(
            resolver.get_quantity_from_floor("옥탑1", TradeMetric::ConcreteVolume, None),
            33.0
        );
    }

    #[test]
    fn test_range_member_resolution() {
        let building = create_test_building();
        let resolver = QuantityResolver::new(&building);
        assert_eq!(resolver.resolve_floor_id("7F", None), Some("f-r-7F".to_string()));
        assert_eq!(resolver.resolve_floor_id("9F", Some("f-r")), Some("f-r-9F".to_string()));
        assert_eq!(
            resolver.get_quantity_from_floor("7F", TradeMetric::FormworkArea, None),
            90.0
        );
        // 9F 尚无记录，取层号最低的已有成员 7F
        assert_eq!(
            resolver.get_quantity_from_floor("9F", TradeMetric::FormworkArea, None),
            90.0
        );
        // 范围内没有任何成员记录的指标为 0
        assert_eq!(
            resolver.get_quantity_from_floor("9F", TradeMetric::RebarTon, None),
            0.0
        );
    }

    #[test]
    fn test_untouched_member_falls_back_to_lowest_member_record() {
        let mut building = create_test_building();
        building.floor_trades.push(create_test_trade(
            "f-r-2F",
            TradeGroup::Apartment,
            TradeMetric::FormworkArea,
            75.0,
        ));
        let resolver = QuantityResolver::new(&building);
        assert_eq!(resolver.get_quantity_from_floor("9F", TradeMetric::FormworkArea, None), 75.0);
        assert_eq!(resolver.get_quantity_from_floor("7F", TradeMetric::FormworkArea, None), 90.0);
        // 范围 ID 本身不参与解析
        building.floor_trades.push(create_test_trade(
            "f-r",
            TradeGroup::Apartment,
            TradeMetric::RebarTon,
            12.0,
        ));
        let resolver = QuantityResolver::new(&building);
        assert_eq!(resolver.get_quantity_from_floor("9F", TradeMetric::RebarTon, None), 0.0);
    }

    #[test]
    fn test_missing_resolves_to_zero() {
        let building = create_test_building();
        let resolver = QuantityResolver::new(&building);
        assert_eq!(resolver.resolve_floor_id("30F", None), None);
        assert_eq!(resolver.get_quantity_from_floor("30F", TradeMetric::RebarTon, None), 0.0);
        assert_eq!(resolver.get_quantity_from_floor("", TradeMetric::RebarTon, None), 0.0);
        assert_eq!(resolver.get_quantity_from_floor("1F", TradeMetric::RebarTon, None), 0.0);
    }

    #[test]
    fn test_apartment_group_preferred() {
        let mut building = create_test_building();
        building.floor_trades.insert(
            0,
            create_test_trade("f-b1", TradeGroup::Foundation, TradeMetric::RebarTon, 1.0),
        );
        building.floor_trades.push(create_test_trade(
            "f-b1",
            TradeGroup::Apartment,
            TradeMetric::RebarTon,
            2.5,
        ));
        let resolver = QuantityResolver::new(&building);
        assert_eq!(resolver.get_quantity_from_floor("B1", TradeMetric::RebarTon, None), 2.5);
    }

    #[test]
    fn test_group_total() {
        let building = create_test_building();
        let resolver = QuantityResolver::new(&building);
        assert_eq!(resolver.group_total(TradeGroup::Foundation, TradeMetric::RebarTon), 10.0);
        assert_eq!(resolver.group_total(TradeGroup::Blinding, TradeMetric::RebarTon), 0.0);
    }

    #[test]
    fn test_multi_core_prefers_same_core() {
        let mut building = create_test_building();
        building.floors = vec![
            create_test_floor("c1-5", "코어1-5F", 5),
            create_test_floor("c2-5", "코어2-5F", 5),
        ];
        let resolver = QuantityResolver::new(&building);
        assert_eq!(resolver.resolve_floor_id("코어2-5F", None), Some("c2-5".to_string()));
        assert_eq!(resolver.resolve_floor_id("5F", None), Some("c1-5".to_string()));
    }
}
