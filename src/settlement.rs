//! Settlement seam.
//!
//! Actual settlement with a banking network is a pluggable external
//! outcome; the pipeline only needs the approved/declined classification.
//! An infrastructure error from the provider is distinct from a decline:
//! a decline is a business outcome and terminal, an error is not.

use crate::database::payment_repository::Payment;
use crate::database::refund_repository::Refund;
use crate::error::AppResult;
use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    Approved,
    Declined { reason: String },
}

#[async_trait]
pub trait SettlementProvider: Send + Sync {
    async fn settle_payment(&self, payment: &Payment) -> AppResult<SettlementOutcome>;

    async fn settle_refund(&self, refund: &Refund) -> AppResult<SettlementOutcome>;
}

/// Stand-in for a banking network integration: waits a configurable
/// latency and approves.
pub struct SimulatedSettlement {
    delay: Duration,
}

impl SimulatedSettlement {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl SettlementProvider for SimulatedSettlement {
    async fn settle_payment(&self, payment: &Payment) -> AppResult<SettlementOutcome> {
        info!(
            payment_id = %payment.id,
            amount = payment.amount,
            currency = %payment.currency,
            "settling payment"
        );
        tokio::time::sleep(self.delay).await;
        Ok(SettlementOutcome::Approved)
    }

    async fn settle_refund(&self, refund: &Refund) -> AppResult<SettlementOutcome> {
        info!(refund_id = %refund.id, amount = refund.amount, "settling refund");
        tokio::time::sleep(self.delay).await;
        Ok(SettlementOutcome::Approved)
    }
}
