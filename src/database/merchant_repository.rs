use crate::database::error::{DatabaseError, DbResult};
use crate::database::repository::MerchantStore;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Merchant entity. Read-only from the pipeline's perspective; the API
/// key is consumed by the excluded ingress authentication layer.
#[derive(Debug, Clone, FromRow)]
pub struct Merchant {
    pub id: Uuid,
    pub name: String,
    pub api_key: String,
    pub webhook_url: Option<String>,
    pub webhook_secret: String,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Repository for merchant configuration
pub struct MerchantRepository {
    pool: PgPool,
}

impl MerchantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MerchantStore for MerchantRepository {
    async fn get_merchant_by_id(&self, id: Uuid) -> DbResult<Option<Merchant>> {
        sqlx::query_as::<_, Merchant>(
            "SELECT id, name, api_key, webhook_url, webhook_secret, is_active, created_at
             FROM merchants WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
