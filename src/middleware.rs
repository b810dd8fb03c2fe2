use crate::error::{ApiError, request_id};
use crate::metrics::{REQUEST_LATENCY, REQUEST_TOTAL};
use crate::rate_limit::{Decision, client_key};
use crate::state::{AppState, RateLimitGuard};
use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, CONTENT_LENGTH};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::time::Instant;
use tracing::debug;

/// Fixed-window limit for one policy.
///
/// Blocked requests never reach the handler and get the 429 envelope with
/// `Retry-After`. Allowed requests give their slot back afterwards when the
/// policy skips successful (< 400) or failed (>= 400) responses.
pub async fn rate_limit(
    State(guard): State<RateLimitGuard>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(request.headers());

    let reset_at = match guard.limiter.check_and_increment(&key, &guard.policy) {
        Decision::Allowed { reset_at } => reset_at,
        Decision::Blocked { retry_after_secs } => {
            return ApiError::rate_limit(retry_after_secs)
                .with_request_id(request_id(request.headers()))
                .into_response();
        }
    };

    let response = next.run(request).await;
    if guard.policy.releases(response.status().as_u16()) {
        guard.limiter.release(&key, &guard.policy, reset_at);
    }
    response
}

// Refuse declared bodies over the limit before anything reads them
pub async fn limit_body(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let declared = request
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    if declared.is_some_and(|len| len > state.max_body_bytes) {
        return Err(ApiError::payload_too_large(state.max_body_bytes)
            .with_request_id(request_id(request.headers())));
    }
    Ok(next.run(request).await)
}

// Admin routes need `Authorization: Bearer <admin token>`
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    let authorized = match (state.admin_token.as_deref(), presented) {
        (Some(expected), Some(given)) => tokens_match(expected, given),
        _ => false,
    };
    if !authorized {
        return Err(ApiError::unauthorized("Admin token required")
            .with_request_id(request_id(request.headers())));
    }
    Ok(next.run(request).await)
}

// constant time for equal-length tokens
fn tokens_match(expected: &str, given: &str) -> bool {
    let (a, b) = (expected.as_bytes(), given.as_bytes());
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub async fn track_requests(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    REQUEST_TOTAL.inc();
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    REQUEST_LATENCY.observe(elapsed.as_secs_f64());
    let status = response.status().as_u16();
    debug!(%method, %path, status, elapsed_ms = elapsed.as_millis() as u64, "request");

    // analytics endpoints would otherwise track themselves
    if path.starts_with("/api/")
        && !path.starts_with("/api/analytics")
        && state.analytics.is_configured()
    {
        let analytics = state.analytics.clone();
        let error = (status >= 400).then(|| format!("HTTP {status}"));
        tokio::spawn(async move {
            analytics
                .track_api_call(
                    &path,
                    &method,
                    status,
                    elapsed.as_millis() as u64,
                    None,
                    error.as_deref(),
                )
                .await;
        });
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_must_match_exactly() {
        assert!(tokens_match("s3cret", "s3cret"));
        assert!(!tokens_match("s3cret", "s3cre"));
        assert!(!tokens_match("s3cret", "s3creT"));
        assert!(!tokens_match("s3cret", ""));
    }
}
