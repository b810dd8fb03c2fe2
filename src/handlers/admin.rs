use crate::error::{ApiError, Result};
use crate::rate_limit::RateLimitStats;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use serde_json::{Value, json};
use tracing::info;

pub async fn rate_limit_stats_handler(State(state): State<AppState>) -> Json<RateLimitStats> {
    Json(state.limiter.stats())
}

pub async fn clear_rate_limits_handler(State(state): State<AppState>) -> Json<Value> {
    state.limiter.clear();
    info!("rate limit store cleared");
    Json(json!({ "cleared": true }))
}

// Forget every window a client has, across all policies
pub async fn reset_rate_limit_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Value>> {
    let key = key.trim();
    if key.is_empty() {
        return Err(ApiError::invalid_input("Client key must not be empty"));
    }
    let removed = state.limiter.reset_key(key);
    if removed == 0 {
        return Err(ApiError::not_found("Rate limit entry"));
    }
    info!(key, removed, "rate limit entries reset");
    Ok(Json(json!({ "key": key, "removed": removed })))
}
