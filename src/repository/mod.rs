// ==========================================
// 楼栋层物量引擎 - 仓储层
// ==========================================
// 职责: SQLite 数据访问，实现写入端口
// 红线: Repository 不含业务逻辑
// ==========================================

pub mod building_repo;
pub mod error;
pub mod floor_repo;
pub mod floor_trade_repo;
pub mod record_store;

pub use building_repo::{BuildingRepository, BuildingRow};
pub use error::{RepositoryError, RepositoryResult};
pub use floor_repo::FloorRepository;
pub use floor_trade_repo::FloorTradeRepository;
pub use record_store::SqliteRecordStore;
