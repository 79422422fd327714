use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::database;
use crate::queue::redis::{self, RedisPool};

#[derive(Clone)]
pub struct HealthState {
    pub db: PgPool,
    pub queue: RedisPool,
    pub environment: String,
}

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub database: String,
    pub queue: String,
}

pub async fn health_check(
    State(state): State<HealthState>,
) -> Result<Json<HealthResponse>, StatusCode> {
    let version = env!("CARGO_PKG_VERSION").to_string();

    let database_up = database::health_check(&state.db).await.is_ok();
    let queue_up = redis::health_check(&state.queue).await.is_ok();

    let status = if database_up && queue_up {
        "healthy"
    } else {
        "degraded"
    };

    let response = HealthResponse {
        status: status.to_string(),
        version,
        environment: state.environment.clone(),
        database: if database_up { "up" } else { "down" }.to_string(),
        queue: if queue_up { "up" } else { "down" }.to_string(),
    };

    Ok(Json(response))
}
