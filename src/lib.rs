pub mod analytics;
pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod housekeeping;
pub mod metrics;
pub mod middleware;
pub mod rate_limit;
pub mod state;
pub mod telemetry;
pub mod templates;

use crate::analytics::{AnalyticsQueue, HttpSink, ServerAnalytics};
use crate::config::Args;
use crate::error::panic_response;
use crate::handlers::{
    clear_rate_limits_handler, flush_handler, health_handler, list_templates_handler,
    method_not_allowed_handler, metrics_handler, not_found_handler, queue_stats_handler,
    rate_limit_stats_handler, reset_rate_limit_handler, suggest_handler, template_handler,
    track_handler,
};
use crate::middleware::{limit_body, rate_limit, require_admin, track_requests};
use crate::rate_limit::{Preset, RateLimiter};
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post};
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{info, warn};

/// Shared state from configuration. Spawns nothing.
pub fn build_state(args: &Args) -> Result<AppState, reqwest::Error> {
    let limiter = RateLimiter::new().with_sweep_interval(args.sweep_interval());

    let queue = match args.collector_target() {
        Some(target) => {
            info!(collector = target.name(), "server analytics enabled");
            let client = reqwest::Client::builder().build()?;
            Some(AnalyticsQueue::new(
                HttpSink::new(client, target),
                args.queue_settings(),
            ))
        }
        None => {
            warn!("no analytics collector configured, server events will be discarded");
            None
        }
    };
    let analytics = ServerAnalytics::new(queue, args.environment.as_str());

    if args.admin_token.is_none() {
        warn!("no admin token configured, admin routes are disabled");
    }

    Ok(AppState::new(
        Arc::new(limiter),
        Arc::new(analytics),
        args.max_body_bytes,
    )
    .with_admin_token(args.admin_token.as_deref()))
}

pub fn build_router(state: AppState) -> Router {
    let search_routes = Router::new()
        .route("/api/templates/suggest", post(suggest_handler))
        .route("/api/templates", get(list_templates_handler))
        .route("/api/templates/{id}", get(template_handler))
        .route_layer(from_fn_with_state(state.guard(Preset::Search), rate_limit));

    let admin_routes = Router::new()
        .route(
            "/api/admin/rate-limits",
            get(rate_limit_stats_handler).delete(clear_rate_limits_handler),
        )
        .route("/api/admin/rate-limits/{key}", delete(reset_rate_limit_handler))
        .route_layer(from_fn_with_state(state.clone(), require_admin));

    let api_routes = Router::new()
        .route("/api/analytics/track", post(track_handler))
        .route("/api/analytics/flush", post(flush_handler))
        .route("/api/analytics/queue", get(queue_stats_handler))
        .merge(admin_routes)
        .route_layer(from_fn_with_state(state.guard(Preset::Api), rate_limit));

    let body_limit = usize::try_from(state.max_body_bytes).unwrap_or(usize::MAX);

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .merge(search_routes)
        .merge(api_routes)
        .fallback(not_found_handler)
        .method_not_allowed_fallback(method_not_allowed_handler)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(from_fn_with_state(state.clone(), limit_body))
        .layer(from_fn_with_state(state.clone(), track_requests))
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}

/// State, router and the housekeeping task. Must run inside a tokio runtime.
pub fn build_app(args: &Args) -> Result<(Router, AppState), reqwest::Error> {
    let state = build_state(args)?;
    housekeeping::start(
        state.limiter.clone(),
        state.analytics.clone(),
        args.housekeeping_interval(),
    );
    Ok((build_router(state.clone()), state))
}
