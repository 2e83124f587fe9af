//! Broker error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    /// Timeout or connection failure. Retried on the next poll, never in-loop.
    #[error("Transient network error: {0}")]
    Transient(String),

    /// Non-2xx response or `status: failure` body.
    #[error("Broker rejected request (HTTP {status}): {code} - {message}")]
    Rejected {
        status: u16,
        code: String,
        message: String,
    },

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BrokerError {
    /// Error code recorded in audit entries.
    pub fn code(&self) -> &str {
        match self {
            Self::Transient(_) => "TRANSIENT",
            Self::Rejected { code, .. } => code,
            Self::Http(_) => "HTTP",
            Self::Json(_) => "MALFORMED_RESPONSE",
        }
    }

    /// Metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transient(_) => "transient",
            Self::Rejected { .. } => "rejected",
            Self::Http(_) => "http",
            Self::Json(_) => "json",
        }
    }

    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

pub type BrokerResult<T> = Result<T, BrokerError>;
