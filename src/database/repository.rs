//! Store traits at the boundary between the pipeline and the durable
//! store. The Postgres repositories in this module tree implement them;
//! tests substitute in-memory fakes.

use crate::database::error::DbResult;
use crate::database::idempotency_repository::IdempotencyRecord;
use crate::database::merchant_repository::Merchant;
use crate::database::payment_repository::{NewPayment, Payment, PaymentState};
use crate::database::refund_repository::{NewRefund, Refund, RefundState};
use crate::database::webhook_repository::WebhookDelivery;
use crate::jobs::WebhookJob;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn get_payment_by_id(&self, id: &str) -> DbResult<Option<Payment>>;

    async fn insert_payment(&self, payment: NewPayment) -> DbResult<Payment>;

    /// Conditional transition: applies only while the row still holds
    /// `from`. Returns whether the update was applied; a `false` means
    /// another delivery of the same job already won the transition.
    async fn update_payment_status(
        &self,
        id: &str,
        from: PaymentState,
        to: PaymentState,
    ) -> DbResult<bool>;
}

#[async_trait]
pub trait RefundStore: Send + Sync {
    async fn get_refund_by_id(&self, id: &str) -> DbResult<Option<Refund>>;

    async fn insert_refund(&self, refund: NewRefund) -> DbResult<Refund>;

    /// Conditional transition, same contract as payments. Stamps
    /// `processed_at` on the terminal statuses.
    async fn update_refund_status(
        &self,
        id: &str,
        from: RefundState,
        to: RefundState,
    ) -> DbResult<bool>;
}

#[async_trait]
pub trait MerchantStore: Send + Sync {
    async fn get_merchant_by_id(&self, id: Uuid) -> DbResult<Option<Merchant>>;
}

#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Returns the record only while unexpired; expired rows behave as
    /// absent.
    async fn get_idempotency_record(
        &self,
        merchant_id: Uuid,
        key: &str,
    ) -> DbResult<Option<IdempotencyRecord>>;

    /// Insert-if-absent. Returns `false` when an active record already
    /// holds the key (the concurrent-duplicate case, absorbed by the
    /// unique constraint).
    async fn insert_idempotency_record(
        &self,
        merchant_id: Uuid,
        key: &str,
        response: &str,
        expires_at: DateTime<Utc>,
    ) -> DbResult<bool>;
}

#[async_trait]
pub trait DeliveryLogStore: Send + Sync {
    async fn record_delivered(&self, job: &WebhookJob, status_code: u16) -> DbResult<()>;

    /// Dead-letter a job whose retry budget is exhausted. Never silently
    /// dropped: these rows are the operator-visible record.
    async fn record_dead(&self, job: &WebhookJob, attempts: u32, last_error: &str)
        -> DbResult<()>;

    async fn get_dead_letters(&self, limit: i64) -> DbResult<Vec<WebhookDelivery>>;
}
