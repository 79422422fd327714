//! Application error taxonomy.
//!
//! Worker loops catch every handler error and degrade to a logged
//! pause-and-continue; business-level failures never cross the handler
//! boundary as errors; they become terminal entity statuses. The ingress
//! layer maps these kinds to HTTP responses via [`AppError::status_code`].

use crate::database::error::DatabaseError;
use thiserror::Error;

/// Result type used across the crate.
pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Referenced payment, refund, or merchant does not exist.
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// Operation requested against an entity in the wrong status, or with
    /// invalid parameters.
    #[error("invalid state: {message}")]
    InvalidState { message: String },

    /// The job broker is unreachable. Callers retry with backoff or
    /// surface the failure upward; workers never retry this themselves.
    #[error("job queue unavailable: {message}")]
    QueueUnavailable { message: String },

    /// A webhook attempt failed in a retryable way (non-2xx, timeout,
    /// connection failure).
    #[error("transient delivery failure: {message}")]
    TransientDelivery { message: String },

    /// Webhook retry budget exhausted; the job was dead-lettered.
    #[error("delivery failed permanently after {attempts} attempts: {message}")]
    TerminalDelivery { attempts: u32, message: String },

    /// Business-level settlement decline. Recorded as a final failed
    /// status, never retried.
    #[error("settlement declined: {reason}")]
    SettlementDeclined { reason: String },

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Infrastructure failures that a retry may resolve. Business outcomes
    /// (declines, invalid state) are never retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::QueueUnavailable { .. } | Self::TransientDelivery { .. } => true,
            Self::Database(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// HTTP-style status for the API layer to map from.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::InvalidState { .. } => 400,
            Self::QueueUnavailable { .. } => 503,
            Self::TransientDelivery { .. } | Self::TerminalDelivery { .. } => 502,
            Self::SettlementDeclined { .. } => 402,
            Self::Database(_) | Self::Serialization(_) => 500,
        }
    }
}
