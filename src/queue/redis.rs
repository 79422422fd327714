//! Redis-backed job queue.
//!
//! Queues are Redis lists (LPUSH to enqueue, BRPOP to consume, so the
//! list is FIFO end to end). Scheduled retries live in a sorted set per
//! queue, scored by eligibility time; due members are promoted onto the
//! list ahead of each blocking pop, since the list itself has no delayed
//! delivery.

use super::{JobQueue, QueueError};
use crate::jobs::JobEnvelope;
use async_trait::async_trait;
use bb8::Pool;
use bb8_redis::RedisConnectionManager;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{error, info, warn};

pub type RedisPool = Pool<RedisConnectionManager>;

/// How many due scheduled jobs are promoted per pop cycle.
const PROMOTE_BATCH: isize = 64;

#[derive(Debug, Clone)]
pub struct QueuePoolConfig {
    pub redis_url: String,
    pub max_connections: u32,
    pub min_idle: u32,
    pub connection_timeout: Duration,
    pub max_lifetime: Duration,
    pub idle_timeout: Duration,
}

impl Default for QueuePoolConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            max_connections: 20,
            min_idle: 5,
            connection_timeout: Duration::from_secs(5),
            max_lifetime: Duration::from_secs(300),
            idle_timeout: Duration::from_secs(60),
        }
    }
}

pub async fn init_queue_pool(config: QueuePoolConfig) -> Result<RedisPool, QueueError> {
    info!(
        "Initializing Redis queue pool: max_connections={}, redis_url={}",
        config.max_connections, config.redis_url
    );

    let manager = RedisConnectionManager::new(config.redis_url.clone()).map_err(|e| {
        error!("Failed to create Redis connection manager: {}", e);
        QueueError::Unavailable(e.to_string())
    })?;

    let pool = Pool::builder()
        .max_size(config.max_connections)
        .min_idle(Some(config.min_idle))
        .connection_timeout(config.connection_timeout)
        .max_lifetime(Some(config.max_lifetime))
        .idle_timeout(Some(config.idle_timeout))
        .test_on_check_out(false)
        .build(manager)
        .await
        .map_err(|e| {
            error!("Failed to build Redis connection pool: {}", e);
            QueueError::Unavailable(e.to_string())
        })?;

    if let Err(e) = ping(&pool).await {
        warn!("Initial Redis connection test failed, but continuing: {}", e);
    }

    info!("Redis queue pool initialized successfully");
    Ok(pool)
}

async fn ping(pool: &RedisPool) -> Result<(), QueueError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| QueueError::Unavailable(e.to_string()))?;

    let _: String = redis::cmd("PING")
        .query_async(&mut *conn)
        .await
        .map_err(|e| QueueError::Unavailable(e.to_string()))?;

    Ok(())
}

pub async fn health_check(pool: &RedisPool) -> Result<(), QueueError> {
    ping(pool).await
}

fn scheduled_key(queue: &str) -> String {
    format!("{}:scheduled", queue)
}

/// Redis implementation of the job queue contract
pub struct RedisJobQueue {
    pool: RedisPool,
}

impl RedisJobQueue {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    async fn get_connection(
        &self,
    ) -> Result<bb8::PooledConnection<'_, RedisConnectionManager>, QueueError> {
        self.pool.get().await.map_err(|e| {
            warn!("Failed to get Redis connection: {}", e);
            QueueError::Unavailable(e.to_string())
        })
    }

    /// Move due scheduled jobs onto the live list. ZREM settles the race
    /// between concurrent promoters: only the caller that removed the
    /// member re-pushes it.
    async fn promote_due(&self, queue: &str) -> Result<(), QueueError> {
        let key = scheduled_key(queue);
        let now = Utc::now().timestamp();
        let mut conn = self.get_connection().await?;

        let due: Vec<String> = conn
            .zrangebyscore_limit(&key, "-inf", now, 0, PROMOTE_BATCH)
            .await
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;

        for member in due {
            let removed: i32 = conn
                .zrem(&key, &member)
                .await
                .map_err(|e| QueueError::Unavailable(e.to_string()))?;
            if removed > 0 {
                let _: () = conn
                    .rpush(queue, &member)
                    .await
                    .map_err(|e| QueueError::Unavailable(e.to_string()))?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn push(&self, queue: &str, envelope: &JobEnvelope) -> Result<(), QueueError> {
        let body = serde_json::to_string(envelope)?;
        let mut conn = self.get_connection().await?;

        let _: () = conn.lpush(queue, body).await.map_err(|e| {
            warn!("Redis LPUSH failed for queue '{}': {}", queue, e);
            QueueError::Unavailable(e.to_string())
        })?;

        Ok(())
    }

    async fn push_scheduled(
        &self,
        queue: &str,
        envelope: &JobEnvelope,
        not_before: DateTime<Utc>,
    ) -> Result<(), QueueError> {
        let body = serde_json::to_string(envelope)?;
        let mut conn = self.get_connection().await?;

        let _: () = conn
            .zadd(scheduled_key(queue), body, not_before.timestamp())
            .await
            .map_err(|e| {
                warn!("Redis ZADD failed for queue '{}': {}", queue, e);
                QueueError::Unavailable(e.to_string())
            })?;

        Ok(())
    }

    async fn pop_blocking(
        &self,
        queue: &str,
        timeout: Duration,
    ) -> Result<Option<JobEnvelope>, QueueError> {
        self.promote_due(queue).await?;

        let mut conn = self.get_connection().await?;
        let popped: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(queue)
            .arg(timeout.as_secs().max(1))
            .query_async(&mut *conn)
            .await
            .map_err(|e| {
                warn!("Redis BRPOP failed for queue '{}': {}", queue, e);
                QueueError::Unavailable(e.to_string())
            })?;

        match popped {
            Some((_key, body)) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }
}
