use crate::database::error::{DatabaseError, DbResult};
use crate::database::repository::PaymentStore;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Payment entity. Status transitions only pending -> success or
/// pending -> failed; amount and currency are immutable after insert.
#[derive(Debug, Clone, FromRow)]
pub struct Payment {
    pub id: String,
    pub merchant_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub order_id: String,
    pub method: String,
    pub status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Payment {
    pub fn state(&self) -> Option<PaymentState> {
        PaymentState::parse(&self.status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentState {
    Pending,
    Success,
    Failed,
}

impl PaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Pending => "pending",
            PaymentState::Success => "success",
            PaymentState::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(PaymentState::Pending),
            "success" => Some(PaymentState::Success),
            "failed" => Some(PaymentState::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentState::Pending)
    }
}

/// Insert payload for a pending payment.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub id: String,
    pub merchant_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub order_id: String,
    pub method: String,
}

/// Repository for payment records
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentStore for PaymentRepository {
    async fn get_payment_by_id(&self, id: &str) -> DbResult<Option<Payment>> {
        sqlx::query_as::<_, Payment>(
            "SELECT id, merchant_id, amount, currency, order_id, method, status, created_at, updated_at
             FROM payments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn insert_payment(&self, payment: NewPayment) -> DbResult<Payment> {
        sqlx::query_as::<_, Payment>(
            "INSERT INTO payments (id, merchant_id, amount, currency, order_id, method, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, 'pending', NOW(), NOW())
             RETURNING id, merchant_id, amount, currency, order_id, method, status, created_at, updated_at",
        )
        .bind(&payment.id)
        .bind(payment.merchant_id)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(&payment.order_id)
        .bind(&payment.method)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn update_payment_status(
        &self,
        id: &str,
        from: PaymentState,
        to: PaymentState,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE payments SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3",
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_parse_round() {
        for state in [
            PaymentState::Pending,
            PaymentState::Success,
            PaymentState::Failed,
        ] {
            assert_eq!(PaymentState::parse(state.as_str()), Some(state));
        }
        assert_eq!(PaymentState::parse("reversed"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!PaymentState::Pending.is_terminal());
        assert!(PaymentState::Success.is_terminal());
        assert!(PaymentState::Failed.is_terminal());
    }
}
