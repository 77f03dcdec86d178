// ==========================================
// 楼栋层物量引擎 - API 层
// ==========================================
// 职责: 对外操作入口，锁定校验，引擎编排
// ==========================================

pub mod building_api;
pub mod error;

pub use building_api::{BuildingApi, QuantityTarget, RegenerationReport};
pub use error::{ApiError, ApiResult, LockKind};
