// ==========================================
// 楼栋层物量引擎 - 核心库
// ==========================================
// 동 기본 정보 / 층 설정 / 층별 물량
// 技术栈: Rust + SQLite + tokio
// 核心引擎为纯函数，持久化经写入端口异步合并
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "ko");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 引擎层 - 业务规则
pub mod engine;

// 服务层 - 写入合并队列
pub mod services;

// 数据仓储层 - 数据访问
pub mod repository;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{FloorClass, LevelType, TradeGroup, TradeMetric};

// 领域实体
pub use domain::{
    Building, BuildingMeta, DisplayRow, Floor, FloorLabel, FloorTrade, FloorView, ProcessCatalog,
    ProcessItem, ProcessModule, TradeQuantities,
};

// 引擎
pub use engine::{
    CoreGeometryResolver, FloorClassifier, LaborEstimator, QuantityResolver, RangeConsolidator,
};

// API
pub use api::{ApiError, ApiResult, BuildingApi, QuantityTarget};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "층별 물량 엔진";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
