//! 领域模型错误定义
//!
//! 校验失败、名称冲突、参与者不存在属于领域错误；
//! 存储适配器的失败单独用 [`RepositoryError`] 表示。

use thiserror::Error;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// 输入字段缺失、为空或不在允许的取值范围内
    #[error("invalid argument {field}: {reason}")]
    InvalidArgument { field: String, reason: String },

    /// 同名参与者已在房间中
    #[error("participant already exists: {name}")]
    ParticipantAlreadyExists { name: String },

    /// 参与者不存在（从未加入或已被清理）
    #[error("participant not found: {name}")]
    ParticipantNotFound { name: String },
}

impl DomainError {
    /// 创建参数错误
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn participant_already_exists(name: impl Into<String>) -> Self {
        Self::ParticipantAlreadyExists { name: name.into() }
    }

    pub fn participant_not_found(name: impl Into<String>) -> Self {
        Self::ParticipantNotFound { name: name.into() }
    }
}

/// 领域模型结果类型
pub type DomainResult<T> = Result<T, DomainError>;

/// 存储适配器错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    /// 违反唯一约束（例如并发加入同名参与者）
    #[error("unique constraint violated")]
    Conflict,
    #[error("storage failure: {message}")]
    Storage { message: String },
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;
