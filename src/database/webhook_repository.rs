use crate::database::error::{DatabaseError, DbResult};
use crate::database::repository::DeliveryLogStore;
use crate::jobs::WebhookJob;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Durable record of a webhook delivery outcome. `outcome` is either
/// `delivered` or `dead`; dead rows are the operator-visible dead-letter
/// store for jobs that exhausted their retry budget.
#[derive(Debug, Clone, FromRow)]
pub struct WebhookDelivery {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub attempts: i32,
    pub outcome: String,
    pub status_code: Option<i32>,
    pub last_error: Option<String>,
    pub first_enqueued_at: chrono::DateTime<chrono::Utc>,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}

pub const OUTCOME_DELIVERED: &str = "delivered";
pub const OUTCOME_DEAD: &str = "dead";

/// Webhook delivery log repository
pub struct WebhookRepository {
    pool: PgPool,
}

impl WebhookRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(
        &self,
        job: &WebhookJob,
        attempts: i32,
        outcome: &str,
        status_code: Option<i32>,
        last_error: Option<&str>,
    ) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO webhook_deliveries
             (id, merchant_id, event_type, payload, attempts, outcome, status_code, last_error, first_enqueued_at, recorded_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())",
        )
        .bind(Uuid::new_v4())
        .bind(job.merchant_id)
        .bind(&job.event_type)
        .bind(&job.payload)
        .bind(attempts)
        .bind(outcome)
        .bind(status_code)
        .bind(last_error)
        .bind(job.first_enqueued_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(())
    }
}

#[async_trait]
impl DeliveryLogStore for WebhookRepository {
    async fn record_delivered(&self, job: &WebhookJob, status_code: u16) -> DbResult<()> {
        self.insert(
            job,
            job.attempt_count as i32 + 1,
            OUTCOME_DELIVERED,
            Some(status_code as i32),
            None,
        )
        .await
    }

    async fn record_dead(
        &self,
        job: &WebhookJob,
        attempts: u32,
        last_error: &str,
    ) -> DbResult<()> {
        self.insert(job, attempts as i32, OUTCOME_DEAD, None, Some(last_error))
            .await
    }

    async fn get_dead_letters(&self, limit: i64) -> DbResult<Vec<WebhookDelivery>> {
        sqlx::query_as::<_, WebhookDelivery>(
            "SELECT id, merchant_id, event_type, payload, attempts, outcome, status_code, last_error, first_enqueued_at, recorded_at
             FROM webhook_deliveries
             WHERE outcome = 'dead'
             ORDER BY recorded_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
