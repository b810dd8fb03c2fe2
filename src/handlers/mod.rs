mod admin;
mod analytics;
mod health;
mod metrics;
mod templates;

pub use admin::{clear_rate_limits_handler, rate_limit_stats_handler, reset_rate_limit_handler};
pub use analytics::{flush_handler, queue_stats_handler, track_handler};
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use templates::{list_templates_handler, suggest_handler, template_handler};

use crate::error::{ApiError, request_id};
use axum::http::HeaderMap;

pub async fn not_found_handler(headers: HeaderMap) -> ApiError {
    ApiError::not_found("Route").with_request_id(request_id(&headers))
}

pub async fn method_not_allowed_handler(headers: HeaderMap) -> ApiError {
    ApiError::method_not_allowed().with_request_id(request_id(&headers))
}
