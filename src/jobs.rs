//! Job envelopes and the dispatcher that routes them to named queues.
//!
//! The envelope is a closed tagged union serialized explicitly at the
//! queue boundary; once enqueued the queue owns it, and a worker that
//! dequeues it owns it exclusively until it finishes, requeues a new copy
//! with an incremented attempt count, or dead-letters it.

use crate::error::AppResult;
use crate::queue::JobQueue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub const PAYMENT_QUEUE: &str = "queue:payments";
pub const REFUND_QUEUE: &str = "queue:refunds";
pub const WEBHOOK_QUEUE: &str = "queue:webhooks";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEnvelope {
    Payment(PaymentJob),
    Refund(RefundJob),
    Webhook(WebhookJob),
}

impl JobEnvelope {
    pub fn queue_name(&self) -> &'static str {
        match self {
            JobEnvelope::Payment(_) => PAYMENT_QUEUE,
            JobEnvelope::Refund(_) => REFUND_QUEUE,
            JobEnvelope::Webhook(_) => WEBHOOK_QUEUE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentJob {
    pub payment_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundJob {
    pub refund_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookJob {
    pub merchant_id: Uuid,
    pub event_type: String,
    pub payload: Value,
    /// Delivery attempts already made for this obligation.
    pub attempt_count: u32,
    pub first_enqueued_at: DateTime<Utc>,
    /// Earliest eligible delivery time for a retry; a worker that sees a
    /// future value defers the job instead of attempting it.
    #[serde(default)]
    pub not_before: Option<DateTime<Utc>>,
}

/// Routes job envelopes onto their named queues. The only write path to
/// the broker; ingress and workers never touch the queue directly for
/// enqueueing.
#[derive(Clone)]
pub struct JobDispatcher {
    queue: Arc<dyn JobQueue>,
}

impl JobDispatcher {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self { queue }
    }

    pub async fn enqueue_payment(&self, payment_id: &str) -> AppResult<()> {
        let envelope = JobEnvelope::Payment(PaymentJob {
            payment_id: payment_id.to_string(),
        });
        self.queue.push(PAYMENT_QUEUE, &envelope).await?;
        debug!(payment_id, "enqueued payment job");
        Ok(())
    }

    pub async fn enqueue_refund(&self, refund_id: &str) -> AppResult<()> {
        let envelope = JobEnvelope::Refund(RefundJob {
            refund_id: refund_id.to_string(),
        });
        self.queue.push(REFUND_QUEUE, &envelope).await?;
        debug!(refund_id, "enqueued refund job");
        Ok(())
    }

    /// Enqueues a fresh webhook obligation with a zeroed attempt counter.
    pub async fn enqueue_webhook(
        &self,
        merchant_id: Uuid,
        event_type: &str,
        payload: Value,
    ) -> AppResult<()> {
        let job = WebhookJob {
            merchant_id,
            event_type: event_type.to_string(),
            payload,
            attempt_count: 0,
            first_enqueued_at: Utc::now(),
            not_before: None,
        };
        self.queue
            .push(WEBHOOK_QUEUE, &JobEnvelope::Webhook(job))
            .await?;
        debug!(%merchant_id, event_type, "enqueued webhook job");
        Ok(())
    }

    /// Re-enqueues a webhook job for a later attempt. The job's
    /// `not_before` is its eligibility time; when absent the job goes
    /// straight back on the queue.
    pub async fn enqueue_webhook_retry(&self, job: WebhookJob) -> AppResult<()> {
        match job.not_before {
            Some(not_before) => {
                self.queue
                    .push_scheduled(WEBHOOK_QUEUE, &JobEnvelope::Webhook(job), not_before)
                    .await?
            }
            None => {
                self.queue
                    .push(WEBHOOK_QUEUE, &JobEnvelope::Webhook(job))
                    .await?
            }
        }
        Ok(())
    }
}
