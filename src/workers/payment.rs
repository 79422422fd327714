//! Payment job handler.

use crate::database::payment_repository::PaymentState;
use crate::database::repository::PaymentStore;
use crate::error::AppResult;
use crate::jobs::{JobDispatcher, JobEnvelope};
use crate::settlement::{SettlementOutcome, SettlementProvider};
use crate::workers::JobHandler;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const EVENT_PAYMENT_SUCCEEDED: &str = "payment.succeeded";
pub const EVENT_PAYMENT_FAILED: &str = "payment.failed";

pub struct PaymentWorker {
    payments: Arc<dyn PaymentStore>,
    settlement: Arc<dyn SettlementProvider>,
    dispatcher: JobDispatcher,
}

impl PaymentWorker {
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        settlement: Arc<dyn SettlementProvider>,
        dispatcher: JobDispatcher,
    ) -> Self {
        Self {
            payments,
            settlement,
            dispatcher,
        }
    }
}

#[async_trait]
impl JobHandler for PaymentWorker {
    async fn handle(&self, envelope: JobEnvelope) -> AppResult<()> {
        let JobEnvelope::Payment(job) = envelope else {
            warn!("payment worker received a non-payment envelope, dropping");
            return Ok(());
        };

        let Some(payment) = self.payments.get_payment_by_id(&job.payment_id).await? else {
            warn!(payment_id = %job.payment_id, "payment not found, dropping job");
            return Ok(());
        };

        // Re-verify before side effects: at-least-once delivery means a
        // prior delivery of this job may already have finished the work.
        match payment.state() {
            Some(PaymentState::Pending) => {}
            _ => {
                debug!(payment_id = %payment.id, status = %payment.status, "payment already handled, skipping");
                return Ok(());
            }
        }

        info!(payment_id = %payment.id, "processing payment");

        // A settlement exception must not leave the payment pending
        // indefinitely: it degrades to a decline.
        let outcome = match self.settlement.settle_payment(&payment).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(payment_id = %payment.id, "settlement error, failing payment: {}", e);
                SettlementOutcome::Declined {
                    reason: format!("settlement error: {}", e),
                }
            }
        };

        let (to_state, event_type) = match &outcome {
            SettlementOutcome::Approved => (PaymentState::Success, EVENT_PAYMENT_SUCCEEDED),
            SettlementOutcome::Declined { .. } => (PaymentState::Failed, EVENT_PAYMENT_FAILED),
        };

        let applied = self
            .payments
            .update_payment_status(&payment.id, PaymentState::Pending, to_state)
            .await?;
        if !applied {
            debug!(payment_id = %payment.id, "status transition already applied elsewhere, skipping webhook");
            return Ok(());
        }

        info!(payment_id = %payment.id, status = to_state.as_str(), "payment settled");

        let mut payload = json!({
            "payment_id": payment.id,
            "order_id": payment.order_id,
            "amount": payment.amount,
            "currency": payment.currency,
            "status": to_state.as_str(),
        });
        if let SettlementOutcome::Declined { reason } = &outcome {
            payload["failure_reason"] = json!(reason);
        }

        self.dispatcher
            .enqueue_webhook(payment.merchant_id, event_type, payload)
            .await?;

        Ok(())
    }
}
