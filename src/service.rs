//! Ingress surface of the pipeline.
//!
//! The API layer calls in only through these operations; both creates
//! insert the pending record first and enqueue the job as their last
//! step, so a record without a job is possible after a crash but a job
//! without a record is not.

use crate::database::payment_repository::{NewPayment, Payment, PaymentState};
use crate::database::refund_repository::{NewRefund, Refund};
use crate::database::repository::{PaymentStore, RefundStore};
use crate::error::{AppError, AppResult};
use crate::idempotency::IdempotencyCache;
use crate::ids;
use crate::jobs::JobDispatcher;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CreatePaymentRequest {
    pub amount: i64,
    pub currency: String,
    pub order_id: String,
    pub method: String,
}

/// Response body stored by the idempotency cache and replayed verbatim.
#[derive(Debug, Serialize)]
pub struct CreatePaymentResponse {
    pub id: String,
    pub status: String,
    pub message: String,
}

pub struct PaymentService {
    payments: Arc<dyn PaymentStore>,
    refunds: Arc<dyn RefundStore>,
    dispatcher: JobDispatcher,
    idempotency: IdempotencyCache,
}

fn validate_create_payment(request: &CreatePaymentRequest) -> AppResult<()> {
    if request.amount <= 0 {
        return Err(AppError::invalid_state(
            "amount must be a positive number of minor units",
        ));
    }
    if request.currency.len() != 3 || !request.currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::invalid_state(format!(
            "currency must be a 3-letter code, got '{}'",
            request.currency
        )));
    }
    if request.order_id.trim().is_empty() {
        return Err(AppError::invalid_state("order_id cannot be empty"));
    }
    if request.method.trim().is_empty() {
        return Err(AppError::invalid_state("method cannot be empty"));
    }
    Ok(())
}

impl PaymentService {
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        refunds: Arc<dyn RefundStore>,
        dispatcher: JobDispatcher,
        idempotency: IdempotencyCache,
    ) -> Self {
        Self {
            payments,
            refunds,
            dispatcher,
            idempotency,
        }
    }

    /// Creates a pending payment and enqueues its processing job.
    pub async fn create_payment(
        &self,
        merchant_id: Uuid,
        request: CreatePaymentRequest,
    ) -> AppResult<Payment> {
        validate_create_payment(&request)?;

        let payment = self
            .payments
            .insert_payment(NewPayment {
                id: ids::payment_id(),
                merchant_id,
                amount: request.amount,
                currency: request.currency.to_ascii_uppercase(),
                order_id: request.order_id,
                method: request.method,
            })
            .await?;

        // Enqueue last: the pending record is durable before any worker
        // can observe the job.
        self.dispatcher.enqueue_payment(&payment.id).await?;

        info!(payment_id = %payment.id, %merchant_id, "payment created");
        Ok(payment)
    }

    /// Creates a pending payment, replaying the stored response when the
    /// idempotency key was already used within its TTL.
    ///
    /// Returns the response body and whether it was a replay.
    pub async fn create_payment_idempotent(
        &self,
        merchant_id: Uuid,
        idempotency_key: Option<&str>,
        request: CreatePaymentRequest,
    ) -> AppResult<(String, bool)> {
        if let Some(key) = idempotency_key {
            if let Some(stored) = self.idempotency.lookup(merchant_id, key).await? {
                return Ok((stored, true));
            }
        }

        let payment = self.create_payment(merchant_id, request).await?;
        let body = serde_json::to_string(&CreatePaymentResponse {
            id: payment.id,
            status: payment.status,
            message: "Processing started".to_string(),
        })?;

        if let Some(key) = idempotency_key {
            self.idempotency.store(merchant_id, key, &body).await?;
        }

        Ok((body, false))
    }

    /// Creates a pending refund for a successful payment and enqueues its
    /// processing job.
    pub async fn create_refund(&self, payment_id: &str, amount: i64) -> AppResult<Refund> {
        let Some(payment) = self.payments.get_payment_by_id(payment_id).await? else {
            return Err(AppError::not_found("Payment", payment_id));
        };

        if payment.state() != Some(PaymentState::Success) {
            return Err(AppError::invalid_state(format!(
                "refund requires a successful payment, '{}' is '{}'",
                payment.id, payment.status
            )));
        }

        if amount <= 0 {
            return Err(AppError::invalid_state(
                "refund amount must be a positive number of minor units",
            ));
        }
        if amount > payment.amount {
            return Err(AppError::invalid_state(format!(
                "refund amount {} exceeds payment amount {}",
                amount, payment.amount
            )));
        }

        let refund = self
            .refunds
            .insert_refund(NewRefund {
                id: ids::refund_id(),
                payment_id: payment.id.clone(),
                merchant_id: payment.merchant_id,
                amount,
            })
            .await?;

        self.dispatcher.enqueue_refund(&refund.id).await?;

        info!(refund_id = %refund.id, payment_id = %payment.id, "refund created");
        Ok(refund)
    }
}
