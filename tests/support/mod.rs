//! In-process fakes for pipeline tests: an in-memory durable store, a
//! scripted settlement provider, and a scripted webhook sender.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use flowpay_backend::database::error::{DatabaseError, DatabaseErrorKind, DbResult};
use flowpay_backend::database::idempotency_repository::IdempotencyRecord;
use flowpay_backend::database::merchant_repository::Merchant;
use flowpay_backend::database::payment_repository::{NewPayment, Payment, PaymentState};
use flowpay_backend::database::refund_repository::{NewRefund, Refund, RefundState};
use flowpay_backend::database::repository::{
    DeliveryLogStore, IdempotencyStore, MerchantStore, PaymentStore, RefundStore,
};
use flowpay_backend::database::webhook_repository::{
    WebhookDelivery, OUTCOME_DEAD, OUTCOME_DELIVERED,
};
use flowpay_backend::error::{AppError, AppResult};
use flowpay_backend::jobs::WebhookJob;
use flowpay_backend::settlement::{SettlementOutcome, SettlementProvider};
use flowpay_backend::webhooks::{DeliveryOutcome, WebhookSender};

pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

#[derive(Default)]
pub struct MemoryStore {
    pub payments: Mutex<HashMap<String, Payment>>,
    pub refunds: Mutex<HashMap<String, Refund>>,
    pub merchants: Mutex<HashMap<Uuid, Merchant>>,
    pub idempotency: Mutex<HashMap<(Uuid, String), IdempotencyRecord>>,
    pub deliveries: Mutex<Vec<WebhookDelivery>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_merchant(&self, webhook_url: Option<&str>) -> Uuid {
        let id = Uuid::new_v4();
        let merchant = Merchant {
            id,
            name: "Test Merchant".to_string(),
            api_key: format!("key_{}", id.simple()),
            webhook_url: webhook_url.map(String::from),
            webhook_secret: TEST_WEBHOOK_SECRET.to_string(),
            is_active: true,
            created_at: Utc::now(),
        };
        self.merchants.lock().unwrap().insert(id, merchant);
        id
    }

    pub fn payment_status(&self, id: &str) -> Option<String> {
        self.payments
            .lock()
            .unwrap()
            .get(id)
            .map(|p| p.status.clone())
    }

    pub fn refund(&self, id: &str) -> Option<Refund> {
        self.refunds.lock().unwrap().get(id).cloned()
    }

    pub fn dead_letters(&self) -> Vec<WebhookDelivery> {
        self.deliveries
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.outcome == OUTCOME_DEAD)
            .cloned()
            .collect()
    }

    pub fn delivered_count(&self) -> usize {
        self.deliveries
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.outcome == OUTCOME_DELIVERED)
            .count()
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn get_payment_by_id(&self, id: &str) -> DbResult<Option<Payment>> {
        Ok(self.payments.lock().unwrap().get(id).cloned())
    }

    async fn insert_payment(&self, payment: NewPayment) -> DbResult<Payment> {
        let now = Utc::now();
        let row = Payment {
            id: payment.id.clone(),
            merchant_id: payment.merchant_id,
            amount: payment.amount,
            currency: payment.currency,
            order_id: payment.order_id,
            method: payment.method,
            status: "pending".to_string(),
            created_at: now,
            updated_at: now,
        };
        self.payments
            .lock()
            .unwrap()
            .insert(payment.id, row.clone());
        Ok(row)
    }

    async fn update_payment_status(
        &self,
        id: &str,
        from: PaymentState,
        to: PaymentState,
    ) -> DbResult<bool> {
        let mut payments = self.payments.lock().unwrap();
        match payments.get_mut(id) {
            Some(p) if p.status == from.as_str() => {
                p.status = to.as_str().to_string();
                p.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl RefundStore for MemoryStore {
    async fn get_refund_by_id(&self, id: &str) -> DbResult<Option<Refund>> {
        Ok(self.refunds.lock().unwrap().get(id).cloned())
    }

    async fn insert_refund(&self, refund: NewRefund) -> DbResult<Refund> {
        let row = Refund {
            id: refund.id.clone(),
            payment_id: refund.payment_id,
            merchant_id: refund.merchant_id,
            amount: refund.amount,
            status: "pending".to_string(),
            created_at: Utc::now(),
            processed_at: None,
        };
        self.refunds.lock().unwrap().insert(refund.id, row.clone());
        Ok(row)
    }

    async fn update_refund_status(
        &self,
        id: &str,
        from: RefundState,
        to: RefundState,
    ) -> DbResult<bool> {
        let mut refunds = self.refunds.lock().unwrap();
        match refunds.get_mut(id) {
            Some(r) if r.status == from.as_str() => {
                r.status = to.as_str().to_string();
                r.processed_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl MerchantStore for MemoryStore {
    async fn get_merchant_by_id(&self, id: Uuid) -> DbResult<Option<Merchant>> {
        Ok(self.merchants.lock().unwrap().get(&id).cloned())
    }
}

#[async_trait]
impl IdempotencyStore for MemoryStore {
    async fn get_idempotency_record(
        &self,
        merchant_id: Uuid,
        key: &str,
    ) -> DbResult<Option<IdempotencyRecord>> {
        let records = self.idempotency.lock().unwrap();
        Ok(records
            .get(&(merchant_id, key.to_string()))
            .filter(|r| r.expires_at > Utc::now())
            .cloned())
    }

    async fn insert_idempotency_record(
        &self,
        merchant_id: Uuid,
        key: &str,
        response: &str,
        expires_at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let mut records = self.idempotency.lock().unwrap();
        let map_key = (merchant_id, key.to_string());
        if let Some(existing) = records.get(&map_key) {
            if existing.expires_at > Utc::now() {
                return Ok(false);
            }
        }
        records.insert(
            map_key,
            IdempotencyRecord {
                merchant_id,
                key: key.to_string(),
                response: response.to_string(),
                expires_at,
                created_at: Utc::now(),
            },
        );
        Ok(true)
    }
}

#[async_trait]
impl DeliveryLogStore for MemoryStore {
    async fn record_delivered(&self, job: &WebhookJob, status_code: u16) -> DbResult<()> {
        self.deliveries.lock().unwrap().push(WebhookDelivery {
            id: Uuid::new_v4(),
            merchant_id: job.merchant_id,
            event_type: job.event_type.clone(),
            payload: job.payload.clone(),
            attempts: job.attempt_count as i32 + 1,
            outcome: OUTCOME_DELIVERED.to_string(),
            status_code: Some(status_code as i32),
            last_error: None,
            first_enqueued_at: job.first_enqueued_at,
            recorded_at: Utc::now(),
        });
        Ok(())
    }

    async fn record_dead(
        &self,
        job: &WebhookJob,
        attempts: u32,
        last_error: &str,
    ) -> DbResult<()> {
        self.deliveries.lock().unwrap().push(WebhookDelivery {
            id: Uuid::new_v4(),
            merchant_id: job.merchant_id,
            event_type: job.event_type.clone(),
            payload: job.payload.clone(),
            attempts: attempts as i32,
            outcome: OUTCOME_DEAD.to_string(),
            status_code: None,
            last_error: Some(last_error.to_string()),
            first_enqueued_at: job.first_enqueued_at,
            recorded_at: Utc::now(),
        });
        Ok(())
    }

    async fn get_dead_letters(&self, limit: i64) -> DbResult<Vec<WebhookDelivery>> {
        Ok(self.dead_letters().into_iter().take(limit as usize).collect())
    }
}

/// Settlement provider that plays back a script, approving once the
/// script runs out.
pub enum ScriptedOutcome {
    Approve,
    Decline(&'static str),
    RetryableError,
    FatalError,
}

pub struct MockSettlement {
    script: Mutex<VecDeque<ScriptedOutcome>>,
}

impl MockSettlement {
    pub fn approving() -> Arc<Self> {
        Self::scripted(Vec::new())
    }

    pub fn scripted(outcomes: Vec<ScriptedOutcome>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(outcomes.into()),
        })
    }

    fn next(&self) -> AppResult<SettlementOutcome> {
        match self.script.lock().unwrap().pop_front() {
            None | Some(ScriptedOutcome::Approve) => Ok(SettlementOutcome::Approved),
            Some(ScriptedOutcome::Decline(reason)) => Ok(SettlementOutcome::Declined {
                reason: reason.to_string(),
            }),
            Some(ScriptedOutcome::RetryableError) => Err(AppError::Database(DatabaseError::new(
                DatabaseErrorKind::ConnectionTimeout,
            ))),
            Some(ScriptedOutcome::FatalError) => {
                Err(AppError::invalid_state("settlement provider wedged"))
            }
        }
    }
}

#[async_trait]
impl SettlementProvider for MockSettlement {
    async fn settle_payment(&self, _payment: &Payment) -> AppResult<SettlementOutcome> {
        self.next()
    }

    async fn settle_refund(&self, _refund: &Refund) -> AppResult<SettlementOutcome> {
        self.next()
    }
}

/// Webhook sender that records every call and plays back a script,
/// falling through to a default outcome.
pub struct ScriptedSender {
    script: Mutex<VecDeque<DeliveryOutcome>>,
    default: DeliveryOutcome,
    pub calls: Mutex<Vec<(String, String, String)>>,
}

impl ScriptedSender {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            default: DeliveryOutcome::Delivered { status: 200 },
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn always_failing(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            default: DeliveryOutcome::Failed {
                reason: reason.to_string(),
            },
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl WebhookSender for ScriptedSender {
    async fn deliver(&self, url: &str, body: &str, signature: &str) -> DeliveryOutcome {
        self.calls.lock().unwrap().push((
            url.to_string(),
            body.to_string(),
            signature.to_string(),
        ));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone())
    }
}
