//! Persistence error types.

use riskctl_core::UserId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("Duplicate control thresholds for user {0}")]
    DuplicateThresholds(UserId),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;
