// ==========================================
// 层引擎场景测试
// ==========================================
// 测试目标: 固定层分类前后结果、范围合并、多核心占位、引用表达式、范围扇出
// ==========================================

mod test_helpers;

use floor_quantity_engine::api::{BuildingApi, QuantityTarget};
use floor_quantity_engine::config::EngineConfig;
use floor_quantity_engine::domain::{FloorView, RangeBacking};
use floor_quantity_engine::engine::{NoOpRecordSink, RangeConsolidator};
use floor_quantity_engine::services::WriteQueue;
use floor_quantity_engine::{logging, Building, FloorClass, TradeGroup, TradeMetric};
use std::sync::Arc;
use test_helpers::{
    class_of, create_test_range_record, create_test_trade, BuildingBuilder,
};

fn create_test_api(building: Building) -> BuildingApi {
    BuildingApi::new(
        building,
        WriteQueue::new(Arc::new(NoOpRecordSink)),
        EngineConfig::default(),
    )
}

// ==========================================
// 场景 1: 1 层层高不同 → 셋팅층，2~14F 合并
// ==========================================

#[test]
fn test_irregular_first_floor_becomes_setting_and_rest_consolidates() {
    logging::init_test();

    let building = BuildingBuilder::new("B1")
        .ground(14)
        .floor1_height(3050.0)
        .build();
    assert_eq!(class_of(&building, "1F"), Some(FloorClass::Setting));

    let api = create_test_api(building);
    let rows = api.consolidate_for_display();
    assert_eq!(rows.len(), 2);

    match &rows[0].view {
        FloorView::Real(floor) => {
            assert_eq!(floor.floor_label, "1F");
            assert_eq!(floor.floor_class, FloorClass::Setting);
            assert_eq!(floor.height, Some(3050.0));
        }
        other => panic!("1F 应为真实层: {:?}", other),
    }
    match &rows[1].view {
        FloorView::Range(range) => {
            assert_eq!(range.label, "2~14F");
            assert_eq!(range.backing, RangeBacking::Consolidated);
            assert_eq!(range.id, "B1-2F");
            assert_eq!(range.members.len(), 13);
            assert_eq!(range.representative_height, Some(2850.0));
        }
        other => panic!("2~14F 应为范围行: {:?}", other),
    }
}

#[test]
fn test_consolidated_rows_expand_back_to_every_floor() {
    let building = BuildingBuilder::new("B1")
        .basement(2)
        .ground(14)
        .ph(1)
        .floor1_height(3050.0)
        .build();
    let api = create_test_api(building.clone());

    let expanded = RangeConsolidator::new().expand(&api.consolidate_for_display());
    let mut expected: Vec<(String, FloorClass)> = building
        .floors
        .iter()
        .map(|f| (f.id.clone(), f.floor_class))
        .collect();
    let mut actual = expanded;
    expected.sort_by(|a, b| a.0.cmp(&b.0));
    actual.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(actual, expected);
}

// ==========================================
// 场景 2: 双核心，较低核心在主轴上方显示占位层
// ==========================================

#[test]
fn test_two_core_spine_renders_placeholders_for_shorter_core() {
    let building = BuildingBuilder::new("B2").cores(vec![14, 10]).build();
    let api = create_test_api(building);

    let rows = api.consolidate_for_display();
    let core1_placeholders: Vec<(u32, FloorClass, String)> = rows
        .iter()
        .filter(|r| r.core_index == 1)
        .filter_map(|r| match &r.view {
            FloorView::Placeholder(p) => Some((p.floor_number, p.inferred_class, p.label.clone())),
            _ => None,
        })
        .collect();

    assert_eq!(
        core1_placeholders
            .iter()
            .map(|(n, _, _)| *n)
            .collect::<Vec<_>>(),
        vec![11, 12, 13, 14]
    );
    assert_eq!(core1_placeholders[0].1, FloorClass::Standard);
    assert_eq!(core1_placeholders[3].1, FloorClass::Top);
    assert_eq!(core1_placeholders[0].2, "코어2-11F");

    // 核心 0 没有占位层
    assert!(rows
        .iter()
        .filter(|r| r.core_index == 0)
        .all(|r| !r.view.is_placeholder()));

    // 占位层没有物量
    assert_eq!(
        api.resolve_quantity("코어2-12F", TradeMetric::ConcreteVolume, None),
        0.0
    );
}

// ==========================================
// 场景 3: 引用表达式
// ==========================================

#[test]
fn test_reference_pattern_scales_foundation_rebar() {
    let mut building = BuildingBuilder::new("B3").ground(5).build();
    building.floor_trades.push(create_test_trade(
        "B3",
        "B3-기초",
        TradeGroup::Foundation,
        TradeMetric::RebarTon,
        10.0,
    ));
    let api = create_test_api(building);

    let value = api.quantity_by_reference("F7*0.45");
    assert!((value - 4.5).abs() < 1e-9, "实际值: {}", value);
    assert_eq!(api.quantity_by_reference("F7*"), 0.0);
    assert!(api.try_quantity_by_reference("F7*").is_err());
}

// ==========================================
// 场景 4: 范围成员写入不影响兄弟成员
// ==========================================

fn create_range_building() -> Building {
    let mut building = BuildingBuilder::new("B4").ground(14).build_meta_only();
    let mut first = BuildingBuilder::new("B4")
        .ground(1)
        .floor1_height(3050.0)
        .build()
        .floors;
    first[0].floor_class = FloorClass::Setting;
    building.floors = first;
    building
        .floors
        .push(create_test_range_record("B4", "R", 2, 14));
    building.floor_trades.push(create_test_trade(
        "B4",
        "R-2F",
        TradeGroup::Apartment,
        TradeMetric::RebarTon,
        5.0,
    ));
    building
}

#[test]
fn test_member_write_keeps_siblings_on_range_value() {
    let mut api = create_test_api(create_range_building());

    let upserts = api
        .write_quantity(
            &QuantityTarget::Range {
                range_id: "R".to_string(),
                floor_number: Some(7),
            },
            TradeGroup::Apartment,
            TradeMetric::RebarTon,
            9.0,
        )
        .expect("范围成员写入应成功");
    // 2F 已有记录，其余 12 层新建
    assert_eq!(upserts.len(), 12);
    assert!(upserts.iter().all(|t| t.floor_id != "R"));

    assert_eq!(api.resolve_quantity("7F", TradeMetric::RebarTon, None), 9.0);
    assert_eq!(api.resolve_quantity("5F", TradeMetric::RebarTon, None), 5.0);
    assert_eq!(api.resolve_quantity("5F", TradeMetric::RebarTon, Some("R")), 5.0);

    // 第二次写入兄弟成员只更新该成员
    let upserts = api
        .write_quantity(
            &QuantityTarget::Range {
                range_id: "R".to_string(),
                floor_number: Some(5),
            },
            TradeGroup::Apartment,
            TradeMetric::RebarTon,
            6.0,
        )
        .expect("范围成员写入应成功");
    assert_eq!(upserts.len(), 1);
    assert_eq!(api.resolve_quantity("5F", TradeMetric::RebarTon, None), 6.0);
    assert_eq!(api.resolve_quantity("7F", TradeMetric::RebarTon, None), 9.0);
}

#[test]
fn test_direct_member_id_write_reads_range_value_for_untouched_floors() {
    let mut api = create_test_api(create_range_building());

    let upserts = api
        .write_quantity(
            &QuantityTarget::Floor("R-7F".to_string()),
            TradeGroup::Apartment,
            TradeMetric::RebarTon,
            9.0,
        )
        .expect("成员 ID 写入应成功");
    assert_eq!(upserts.len(), 12);

    assert_eq!(api.resolve_quantity("7F", TradeMetric::RebarTon, None), 9.0);
    assert_eq!(api.resolve_quantity("5F", TradeMetric::RebarTon, None), 5.0);
}

// ==========================================
// 场景 5: 3 层设为셋팅층的级联
// ==========================================

#[test]
fn test_setting_third_floor_cascades_in_one_step() {
    let building = BuildingBuilder::new("B5").ground(5).build();
    assert!(building
        .floors
        .iter()
        .all(|f| f.floor_class == FloorClass::Standard));
    let mut api = create_test_api(building);

    let affected = api
        .apply_classification("B5-3F", FloorClass::Setting)
        .expect("分类应成功");

    let building = api.building();
    assert_eq!(class_of(building, "1F"), Some(FloorClass::General));
    assert_eq!(class_of(building, "2F"), Some(FloorClass::General));
    assert_eq!(class_of(building, "3F"), Some(FloorClass::Setting));
    assert_eq!(class_of(building, "4F"), Some(FloorClass::Standard));
    assert_eq!(class_of(building, "5F"), Some(FloorClass::Standard));

    let mut affected_labels: Vec<String> =
        affected.iter().map(|f| f.floor_label.clone()).collect();
    affected_labels.sort();
    assert_eq!(affected_labels, vec!["1F", "2F", "3F"]);
}

#[test]
fn test_first_floor_height_edit_promotes_setting_floor() {
    let building = BuildingBuilder::new("B6").ground(14).build();
    let mut api = create_test_api(building);

    api.edit_floor_height("B6-1F", Some(3050.0))
        .expect("层高编辑应成功");

    assert_eq!(class_of(api.building(), "1F"), Some(FloorClass::Setting));
    assert_eq!(class_of(api.building(), "2F"), Some(FloorClass::Standard));
}

#[test]
fn test_first_floor_reset_to_standard_height_promotes_run_bottom() {
    let mut building = BuildingBuilder::new("B7").ground(8).build();
    for floor in building.floors.iter_mut() {
        floor.floor_class = FloorClass::Standard;
        match floor.floor_label.as_str() {
            "1F" => floor.height = Some(3100.0),
            "2F" => floor.height = Some(3000.0),
            _ => {}
        }
    }
    let mut api = create_test_api(building);

    api.edit_floor_height("B7-1F", Some(2850.0))
        .expect("层高编辑应成功");

    let building = api.building();
    assert_eq!(class_of(building, "3F"), Some(FloorClass::Setting));
    assert_eq!(class_of(building, "1F"), Some(FloorClass::General));
    assert_eq!(class_of(building, "2F"), Some(FloorClass::General));
    assert_eq!(class_of(building, "4F"), Some(FloorClass::Standard));
}
