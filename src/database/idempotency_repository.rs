use crate::database::error::{DatabaseError, DbResult};
use crate::database::repository::IdempotencyStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Stored replay record for one (merchant, client key) pair. The response
/// body is kept as exact text so a replay is byte-identical. Never
/// mutated: rows are read until they expire.
#[derive(Debug, Clone, FromRow)]
pub struct IdempotencyRecord {
    pub merchant_id: Uuid,
    pub key: String,
    pub response: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Repository for idempotency replay records.
///
/// The table carries a primary key on (merchant_id, key); the
/// insert-if-absent below rides on that constraint, which is what closes
/// the concurrent-duplicate-create race: of two racing inserts exactly one
/// wins, the other observes `false`.
pub struct IdempotencyRepository {
    pool: PgPool,
}

impl IdempotencyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdempotencyStore for IdempotencyRepository {
    async fn get_idempotency_record(
        &self,
        merchant_id: Uuid,
        key: &str,
    ) -> DbResult<Option<IdempotencyRecord>> {
        sqlx::query_as::<_, IdempotencyRecord>(
            "SELECT merchant_id, key, response, expires_at, created_at
             FROM idempotency_keys
             WHERE merchant_id = $1 AND key = $2 AND expires_at > NOW()",
        )
        .bind(merchant_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn insert_idempotency_record(
        &self,
        merchant_id: Uuid,
        key: &str,
        response: &str,
        expires_at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "INSERT INTO idempotency_keys (merchant_id, key, response, expires_at, created_at)
             VALUES ($1, $2, $3, $4, NOW())
             ON CONFLICT (merchant_id, key) DO NOTHING",
        )
        .bind(merchant_id)
        .bind(key)
        .bind(response)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(result.rows_affected() > 0)
    }
}
