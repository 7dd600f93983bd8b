use domain::{DomainError, RepositoryError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl ApplicationError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ApplicationError::Domain(DomainError::ParticipantNotFound { .. })
        )
    }
}

/// 记录存储失败的上下文（操作、集合、键）并转换为应用层错误。
/// 存储错误不会自动重试，也不会回滚之前已完成的写入。
pub(crate) fn store_failure(
    operation: &'static str,
    collection: &'static str,
    key: &str,
    error: RepositoryError,
) -> ApplicationError {
    tracing::error!(
        operation,
        collection,
        key,
        error = %error,
        "store operation failed"
    );
    ApplicationError::Repository(error)
}
