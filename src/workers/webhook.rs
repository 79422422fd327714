//! Webhook delivery engine.
//!
//! Each attempt resolves the merchant's endpoint and secret, signs the
//! canonical body, posts it, and classifies the outcome. Retryable
//! failures are re-enqueued on the scheduled set with exponential backoff
//! until the attempt budget runs out, at which point the job is
//! dead-lettered for operator inspection rather than silently dropped.

use crate::config::WebhookConfig;
use crate::database::repository::{DeliveryLogStore, MerchantStore};
use crate::error::AppResult;
use crate::jobs::{JobDispatcher, JobEnvelope, WebhookJob};
use crate::webhooks::{retry_delay, sign, DeliveryOutcome, WebhookBody, WebhookSender};
use crate::workers::JobHandler;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct WebhookWorker {
    merchants: Arc<dyn MerchantStore>,
    delivery_log: Arc<dyn DeliveryLogStore>,
    sender: Arc<dyn WebhookSender>,
    dispatcher: JobDispatcher,
    config: WebhookConfig,
}

impl WebhookWorker {
    pub fn new(
        merchants: Arc<dyn MerchantStore>,
        delivery_log: Arc<dyn DeliveryLogStore>,
        sender: Arc<dyn WebhookSender>,
        dispatcher: JobDispatcher,
        config: WebhookConfig,
    ) -> Self {
        Self {
            merchants,
            delivery_log,
            sender,
            dispatcher,
            config,
        }
    }

    async fn handle_failure(&self, job: WebhookJob, reason: String) -> AppResult<()> {
        let attempts_made = job.attempt_count + 1;

        if attempts_made >= self.config.max_attempts {
            error!(
                merchant_id = %job.merchant_id,
                event_type = %job.event_type,
                attempts = attempts_made,
                "webhook delivery exhausted retries, dead-lettering: {}",
                reason
            );
            self.delivery_log
                .record_dead(&job, attempts_made, &reason)
                .await?;
            return Ok(());
        }

        let delay = retry_delay(
            attempts_made,
            self.config.retry_base(),
            self.config.retry_cap(),
        );
        let not_before =
            Utc::now() + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());

        warn!(
            merchant_id = %job.merchant_id,
            event_type = %job.event_type,
            attempts = attempts_made,
            retry_in_secs = delay.as_secs(),
            "webhook delivery failed, scheduling retry: {}",
            reason
        );

        let retry = WebhookJob {
            attempt_count: attempts_made,
            not_before: Some(not_before),
            ..job
        };
        self.dispatcher.enqueue_webhook_retry(retry).await
    }
}

#[async_trait]
impl JobHandler for WebhookWorker {
    async fn handle(&self, envelope: JobEnvelope) -> AppResult<()> {
        let JobEnvelope::Webhook(job) = envelope else {
            warn!("webhook worker received a non-webhook envelope, dropping");
            return Ok(());
        };

        // Not yet eligible: put it back on the scheduled set without
        // touching the attempt counter.
        if let Some(not_before) = job.not_before {
            if not_before > Utc::now() {
                debug!(
                    merchant_id = %job.merchant_id,
                    event_type = %job.event_type,
                    "webhook job not yet due, deferring"
                );
                return self.dispatcher.enqueue_webhook_retry(job).await;
            }
        }

        let Some(merchant) = self.merchants.get_merchant_by_id(job.merchant_id).await? else {
            warn!(merchant_id = %job.merchant_id, "merchant not found, dropping webhook job");
            return Ok(());
        };

        let Some(url) = merchant
            .webhook_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
        else {
            debug!(merchant_id = %merchant.id, "no webhook URL configured, dropping job");
            return Ok(());
        };

        let body = WebhookBody {
            event_type: &job.event_type,
            merchant_id: job.merchant_id,
            payload: &job.payload,
            timestamp: Utc::now(),
        }
        .render()?;
        let signature = sign(&merchant.webhook_secret, body.as_bytes());

        match self.sender.deliver(url, &body, &signature).await {
            DeliveryOutcome::Delivered { status } => {
                info!(
                    merchant_id = %merchant.id,
                    event_type = %job.event_type,
                    status,
                    "webhook delivered"
                );
                if let Err(e) = self.delivery_log.record_delivered(&job, status).await {
                    // The merchant already got the event; failing the job
                    // here would re-deliver it.
                    warn!(merchant_id = %merchant.id, "failed to record delivery: {}", e);
                }
                Ok(())
            }
            DeliveryOutcome::Failed { reason } => self.handle_failure(job, reason).await,
        }
    }
}
