//! Refund job handler.
//!
//! A settlement decline is a business outcome and terminal: the refund is
//! marked failed and the queue job is never retried. Only retryable
//! infrastructure errors put the job back on the queue.

use crate::database::refund_repository::RefundState;
use crate::database::repository::RefundStore;
use crate::error::AppResult;
use crate::jobs::{JobDispatcher, JobEnvelope};
use crate::settlement::{SettlementOutcome, SettlementProvider};
use crate::workers::JobHandler;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct RefundWorker {
    refunds: Arc<dyn RefundStore>,
    settlement: Arc<dyn SettlementProvider>,
    dispatcher: JobDispatcher,
}

impl RefundWorker {
    pub fn new(
        refunds: Arc<dyn RefundStore>,
        settlement: Arc<dyn SettlementProvider>,
        dispatcher: JobDispatcher,
    ) -> Self {
        Self {
            refunds,
            settlement,
            dispatcher,
        }
    }
}

#[async_trait]
impl JobHandler for RefundWorker {
    async fn handle(&self, envelope: JobEnvelope) -> AppResult<()> {
        let JobEnvelope::Refund(job) = envelope else {
            warn!("refund worker received a non-refund envelope, dropping");
            return Ok(());
        };

        let Some(refund) = self.refunds.get_refund_by_id(&job.refund_id).await? else {
            warn!(refund_id = %job.refund_id, "refund not found, dropping job");
            return Ok(());
        };

        match refund.state() {
            Some(RefundState::Pending) => {}
            _ => {
                debug!(refund_id = %refund.id, status = %refund.status, "refund already handled, skipping");
                return Ok(());
            }
        }

        info!(refund_id = %refund.id, payment_id = %refund.payment_id, "processing refund");

        let to_state = match self.settlement.settle_refund(&refund).await {
            Ok(SettlementOutcome::Approved) => RefundState::Processed,
            Ok(SettlementOutcome::Declined { reason }) => {
                warn!(refund_id = %refund.id, reason, "refund declined");
                RefundState::Failed
            }
            Err(e) if e.is_retryable() => {
                warn!(refund_id = %refund.id, "retryable settlement error, requeueing: {}", e);
                self.dispatcher.enqueue_refund(&refund.id).await?;
                return Ok(());
            }
            Err(e) => {
                error!(refund_id = %refund.id, "settlement error, failing refund: {}", e);
                RefundState::Failed
            }
        };

        let applied = self
            .refunds
            .update_refund_status(&refund.id, RefundState::Pending, to_state)
            .await?;
        if applied {
            info!(refund_id = %refund.id, status = to_state.as_str(), "refund settled");
        } else {
            debug!(refund_id = %refund.id, "status transition already applied elsewhere");
        }

        Ok(())
    }
}
