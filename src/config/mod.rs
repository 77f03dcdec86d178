// ==========================================
// 楼栋层物量引擎 - 配置层
// ==========================================
// 职责: 引擎配置、工序目录、config_kv 覆写
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod engine_config;
pub mod process_catalog;

pub use config_manager::{config_keys, ConfigManager};
pub use engine_config::{EngineConfig, EquipmentDefaults, WriteTimings};
pub use process_catalog::{catalog_from_records, default_catalog, load_catalog_file, CatalogError};
