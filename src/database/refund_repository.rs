use crate::database::error::{DatabaseError, DbResult};
use crate::database::repository::RefundStore;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Refund entity. Creatable only while the parent payment is in status
/// success; amount never exceeds the parent amount.
#[derive(Debug, Clone, FromRow)]
pub struct Refund {
    pub id: String,
    pub payment_id: String,
    pub merchant_id: Uuid,
    pub amount: i64,
    pub status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub processed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Refund {
    pub fn state(&self) -> Option<RefundState> {
        RefundState::parse(&self.status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundState {
    Pending,
    Processed,
    Failed,
}

impl RefundState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundState::Pending => "pending",
            RefundState::Processed => "processed",
            RefundState::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(RefundState::Pending),
            "processed" => Some(RefundState::Processed),
            "failed" => Some(RefundState::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewRefund {
    pub id: String,
    pub payment_id: String,
    pub merchant_id: Uuid,
    pub amount: i64,
}

/// Repository for refund records
pub struct RefundRepository {
    pool: PgPool,
}

impl RefundRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefundStore for RefundRepository {
    async fn get_refund_by_id(&self, id: &str) -> DbResult<Option<Refund>> {
        sqlx::query_as::<_, Refund>(
            "SELECT id, payment_id, merchant_id, amount, status, created_at, processed_at
             FROM refunds WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn insert_refund(&self, refund: NewRefund) -> DbResult<Refund> {
        sqlx::query_as::<_, Refund>(
            "INSERT INTO refunds (id, payment_id, merchant_id, amount, status, created_at)
             VALUES ($1, $2, $3, $4, 'pending', NOW())
             RETURNING id, payment_id, merchant_id, amount, status, created_at, processed_at",
        )
        .bind(&refund.id)
        .bind(&refund.payment_id)
        .bind(refund.merchant_id)
        .bind(refund.amount)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn update_refund_status(
        &self,
        id: &str,
        from: RefundState,
        to: RefundState,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE refunds SET status = $1, processed_at = NOW() WHERE id = $2 AND status = $3",
        )
        .bind(to.as_str())
        .bind(id)
        .bind(from.as_str())
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(result.rows_affected() > 0)
    }
}
