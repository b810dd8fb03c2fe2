use crate::analytics::{AnalyticsQueue, EventContext, FlushReport, HttpSink, QueueStats};
use crate::error::{ApiError, Result};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

// GA4 limits event names to 40 characters
const MAX_EVENT_NAME: usize = 40;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRequest {
    pub name: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    pub user_id: Option<String>,
    pub client_id: Option<String>,
    #[serde(default)]
    pub user_properties: Map<String, Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub configured: bool,
    #[serde(flatten)]
    pub stats: QueueStats,
}

fn valid_event_name(name: &str) -> bool {
    let mut chars = name.chars();
    name.len() <= MAX_EVENT_NAME
        && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn configured_queue(state: &AppState) -> Result<&AnalyticsQueue<HttpSink>> {
    state
        .analytics
        .queue()
        .ok_or_else(|| ApiError::service_unavailable("Analytics collector is not configured"))
}

pub async fn track_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<TrackRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>)> {
    let Json(req) = payload?;
    if !valid_event_name(&req.name) {
        return Err(ApiError::invalid_input("Invalid event name").with_details(json!({
            "name": req.name,
            "rule": "letters, digits and underscores, starting with a letter, at most 40 characters"
        })));
    }
    configured_queue(&state)?;

    let mut ctx = match req.user_id.as_deref() {
        Some(user_id) => EventContext::user(user_id),
        None => EventContext::default(),
    };
    ctx.client_id = req.client_id;
    ctx.user_properties.extend(req.user_properties);

    state.analytics.track_event(&req.name, req.params, ctx).await;
    Ok((StatusCode::ACCEPTED, Json(json!({ "queued": true }))))
}

pub async fn flush_handler(State(state): State<AppState>) -> Result<Json<FlushReport>> {
    let queue = configured_queue(&state)?;
    Ok(Json(queue.flush().await))
}

pub async fn queue_stats_handler(State(state): State<AppState>) -> Json<QueueStatus> {
    let stats = match state.analytics.queue() {
        Some(queue) => queue.stats().await,
        None => QueueStats::default(),
    };
    Json(QueueStatus {
        configured: state.analytics.is_configured(),
        stats,
    })
}
