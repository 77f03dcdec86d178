// ==========================================
// 楼栋层物量引擎 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换Repository错误为用户可读的错误消息
// 锁定拒绝为硬性停止，消息经 i18n 本地化
// ==========================================

use crate::i18n::{t, t_with_args};
use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 锁定类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockKind {
    /// 基本信息锁（层结构、分类、层高）
    BasicInfo,
    /// 数据输入锁（层物量）
    DataInput,
}

impl LockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockKind::BasicInfo => "BASIC_INFO",
            LockKind::DataInput => "DATA_INPUT",
        }
    }

    /// 本地化提示
    pub fn message(&self) -> String {
        match self {
            LockKind::BasicInfo => t("lock.basic_info"),
            LockKind::DataInput => t("lock.data_input"),
        }
    }
}

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 锁定
    // ==========================================
    #[error("{}", .lock.message())]
    Locked { lock: LockKind },

    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    /// 待写记录刷新失败，层结构重建中止
    #[error("{}", t_with_args("regeneration.aborted", &[("reason", .0.as_str())]))]
    RegenerationAborted(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("待写记录刷新失败: {0}")]
    FlushFailed(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg)
            | RepositoryError::DatabaseQueryError(msg)
            | RepositoryError::UniqueConstraintViolation(msg)
            | RepositoryError::ForeignKeyViolation(msg) => ApiError::DatabaseError(msg),
            RepositoryError::Serialization(msg) => ApiError::InternalError(msg),
            err @ RepositoryError::FlushFailed { .. } => ApiError::FlushFailed(err.to_string()),
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
