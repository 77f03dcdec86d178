// ==========================================
// 楼栋层物量引擎 - 领域模型层
// ==========================================
// 职责: 定义楼栋、层、层物量、工序模块及其值对象
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod building;
pub mod floor;
pub mod label;
pub mod process;
pub mod trade;
pub mod types;

// 重导出核心类型
pub use building::{heights_equal, Building, BuildingMeta, FloorCount, Heights};
pub use floor::{
    DisplayRow, Floor, FloorView, PlaceholderFloor, RangeBacking, RangeMember, RangeView,
};
pub use label::{normalize_label, strip_core_qualifier, FloorLabel, FloorLevel};
pub use process::{EquipmentSpec, ProcessCatalog, ProcessCategory, ProcessItem, ProcessModule};
pub use trade::{sanitize_quantity, FloorTrade, TradeQuantities};
pub use types::{FloorClass, LevelType, TradeGroup, TradeMetric};
