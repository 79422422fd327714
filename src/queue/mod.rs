//! Job queue abstraction: named FIFO queues with at-least-once delivery.
//!
//! `push` never blocks and fails only when the broker is unreachable;
//! `pop_blocking` waits up to a timeout and is the loop-pacing mechanism
//! for workers. Delayed retry delivery rides on `push_scheduled`; due jobs
//! are promoted ahead of the blocking pop.

pub mod memory;
pub mod redis;

use crate::error::AppError;
use crate::jobs::JobEnvelope;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue unavailable: {0}")]
    Unavailable(String),

    #[error("malformed job envelope: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Unavailable(message) => AppError::QueueUnavailable { message },
            QueueError::Malformed(e) => AppError::Serialization(e),
        }
    }
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Append to the tail of the named queue.
    async fn push(&self, queue: &str, envelope: &JobEnvelope) -> Result<(), QueueError>;

    /// Hold the envelope until `not_before`, then deliver it on the named
    /// queue.
    async fn push_scheduled(
        &self,
        queue: &str,
        envelope: &JobEnvelope,
        not_before: DateTime<Utc>,
    ) -> Result<(), QueueError>;

    /// Block up to `timeout` for one envelope; `None` on timeout. The same
    /// job may be delivered twice if a consumer crashes after the pop, so
    /// handlers re-verify state before acting.
    async fn pop_blocking(
        &self,
        queue: &str,
        timeout: Duration,
    ) -> Result<Option<JobEnvelope>, QueueError>;
}
