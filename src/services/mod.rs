// ==========================================
// 楼栋层物量引擎 - 服务层
// ==========================================
// 职责: 引擎之外的运行期服务（写入合并队列）
// ==========================================

pub mod write_queue;

pub use write_queue::{WritePolicy, WriteQueue};
