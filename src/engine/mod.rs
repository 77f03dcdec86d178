// ==========================================
// 楼栋层物量引擎 - 引擎层
// ==========================================
// 职责: 层生成、层分类、范围合并、物量解析、人工估算
// 红线: Engine 不拼 SQL；除引用表达式严格模式外全部为全函数，不返回错误
// ==========================================

pub mod core_geometry;
pub mod floor_classifier;
pub mod labor_estimator;
pub mod quantity_resolver;
pub mod range_consolidator;
pub mod reference_pattern;
pub mod regeneration;
pub mod write_port;

// 重导出核心引擎
pub use core_geometry::{floor_id_for, CoreGeometryResolver, CorePlan, DisplayLayout, FloorDescriptor};
pub use floor_classifier::{ClassificationOutcome, FloorClassifier, SETTING_CASCADE_MAX_FLOOR};
pub use labor_estimator::{LaborEstimate, LaborEstimator};
pub use quantity_resolver::QuantityResolver;
pub use range_consolidator::{individual_floor_id, QuantityFanOut, RangeClassificationOutcome, RangeConsolidator};
pub use reference_pattern::{
    parse_reference, quantity_by_reference, try_quantity_by_reference, ReferenceError, ReferenceExpr,
    ReferenceTerm,
};
pub use regeneration::{plan_regeneration, RegenerationPlan};
pub use write_port::{NoOpRecordSink, RecordKey, RecordSink, WriteRecord};
