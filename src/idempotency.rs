//! Idempotency replay cache for the ingress path.
//!
//! Keyed by (merchant, client-supplied key). The first completed request
//! stores its exact response body; replays within the TTL return it
//! byte-identical. Concurrent duplicate stores are absorbed by the
//! store's unique constraint: exactly one insert wins.

use crate::database::repository::IdempotencyStore;
use crate::error::AppResult;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

#[derive(Clone)]
pub struct IdempotencyCache {
    store: Arc<dyn IdempotencyStore>,
    ttl: Duration,
}

impl IdempotencyCache {
    pub fn new(store: Arc<dyn IdempotencyStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Previously stored response for the key, if present and unexpired.
    pub async fn lookup(&self, merchant_id: Uuid, key: &str) -> AppResult<Option<String>> {
        let record = self.store.get_idempotency_record(merchant_id, key).await?;
        match &record {
            Some(_) => debug!(%merchant_id, key, "idempotency cache hit"),
            None => debug!(%merchant_id, key, "idempotency cache miss"),
        }
        Ok(record.map(|r| r.response))
    }

    /// Stores the response under the key. A concurrent duplicate insert
    /// for the same active key is ignored.
    pub async fn store(&self, merchant_id: Uuid, key: &str, response: &str) -> AppResult<()> {
        let expires_at = Utc::now()
            + chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::hours(24));
        let inserted = self
            .store
            .insert_idempotency_record(merchant_id, key, response, expires_at)
            .await?;
        if !inserted {
            debug!(%merchant_id, key, "idempotency record already present, keeping original");
        }
        Ok(())
    }
}
