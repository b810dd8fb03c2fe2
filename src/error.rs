use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::any::Any;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;
use tracing::{error, warn};

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

// Internal error text only leaves the process in development
static EXPOSE_INTERNALS: AtomicBool = AtomicBool::new(false);
static REQUEST_SEQ: AtomicU64 = AtomicU64::new(1);

pub fn expose_internal_errors(expose: bool) {
    EXPOSE_INTERNALS.store(expose, Ordering::Relaxed);
}

fn internals_exposed() -> bool {
    EXPOSE_INTERNALS.load(Ordering::Relaxed)
}

/// Every failure the API can report. Each kind owns a fixed HTTP status and a
/// machine-readable code that clients switch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    InvalidInput,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    Conflict,
    PayloadTooLarge,
    UnprocessableEntity,
    RateLimitExceeded,
    Internal,
    BadGateway,
    ServiceUnavailable,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::BadRequest | ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorKind::UnprocessableEntity => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::BadGateway => StatusCode::BAD_GATEWAY,
            ErrorKind::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BAD_REQUEST",
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ErrorKind::UnprocessableEntity => "UNPROCESSABLE_ENTITY",
            ErrorKind::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorKind::Internal => "INTERNAL_ERROR",
            ErrorKind::BadGateway => "BAD_GATEWAY",
            ErrorKind::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        }
    }
}

// JSON body every error response carries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub error: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

#[derive(Error, Debug)]
#[error("{}: {message}", .kind.code())]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
    details: Option<Value>,
    request_id: Option<String>,
    retry_after: Option<u64>,
    // server-side only, logged when the response is built
    cause: Option<String>,
}

// Error row coming back from the database layer (postgres / postgrest codes)
#[derive(Debug, Clone, Default)]
pub struct DbError {
    pub code: Option<String>,
    pub message: String,
    pub detail: Option<String>,
    pub column: Option<String>,
}

impl Display for DbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({})", self.message, code),
            None => f.write_str(&self.message),
        }
    }
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
            request_id: None,
            retry_after: None,
            cause: None,
        }
    }

    fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    pub fn retry_after(&self) -> Option<u64> {
        self.retry_after
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(ErrorKind::NotFound, format!("{resource} not found"))
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn payload_too_large(max_size: u64) -> Self {
        Self::new(
            ErrorKind::PayloadTooLarge,
            format!("Request payload too large. Maximum size: {max_size} bytes"),
        )
        .with_details(json!({ "maxSize": max_size }))
    }

    pub fn unprocessable_entity(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnprocessableEntity, message)
    }

    pub fn rate_limit(retry_after_secs: u64) -> Self {
        let mut err = Self::new(ErrorKind::RateLimitExceeded, "Too many requests")
            .with_details(json!({ "retryAfter": retry_after_secs }));
        err.retry_after = Some(retry_after_secs);
        err
    }

    /// Internal failure. The underlying message and context are only echoed
    /// back to the client in development.
    pub fn internal(err: impl Display, context: &str) -> Self {
        let err = err.to_string();
        let cause = format!("{context}: {err}");
        if internals_exposed() {
            Self::new(ErrorKind::Internal, err.clone())
                .with_details(json!({ "error": err, "context": context }))
                .with_cause(cause)
        } else {
            Self::new(ErrorKind::Internal, "Internal server error").with_cause(cause)
        }
    }

    pub fn method_not_allowed() -> Self {
        Self::new(ErrorKind::MethodNotAllowed, "Method not allowed")
    }

    pub fn bad_gateway(service: &str) -> Self {
        Self::new(
            ErrorKind::BadGateway,
            format!("{service} is temporarily unavailable"),
        )
    }

    pub fn service_unavailable(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, reason)
    }

    // Map a database failure onto the API taxonomy by vendor error code
    pub fn from_database_error(err: &DbError, operation: &str) -> Self {
        let mapped = match err.code.as_deref() {
            Some("23505") => Self::conflict("Resource already exists")
                .with_details(json!({ "field": err.detail })),
            Some("23503") => {
                Self::bad_request("Invalid reference").with_details(json!({ "field": err.detail }))
            }
            Some("23502") => Self::bad_request("Missing required field")
                .with_details(json!({ "field": err.column })),
            Some("22P02") => Self::bad_request("Invalid data format"),
            Some("PGRST116") => Self::forbidden("Access denied by security policy"),
            Some("42P01") | Some("42703") => {
                Self::internal(err, &format!("Database schema error: {operation}"))
            }
            _ => Self::internal(err, &format!("Database operation failed: {operation}")),
        };
        mapped.with_cause(format!("{operation}: {err}"))
    }

    // Map an upstream HTTP status onto the API taxonomy
    pub fn from_external_status(
        service: &str,
        status: StatusCode,
        retry_after: Option<u64>,
    ) -> Self {
        match status.as_u16() {
            401 => Self::unauthorized(format!("{service} authentication failed")),
            403 => Self::forbidden(format!("{service} access denied")),
            404 => Self::not_found(&format!("{service} resource")),
            429 => Self::rate_limit(retry_after.unwrap_or(60)),
            502..=504 => Self::bad_gateway(service),
            _ => Self::internal(
                format!("upstream returned {status}"),
                &format!("{service} request failed"),
            ),
        }
    }

    pub fn from_reqwest(service: &str, err: &reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            return Self::bad_gateway(service);
        }
        match err.status() {
            Some(status) => Self::from_external_status(service, status, None),
            None => Self::internal(err, &format!("{service} request failed")),
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error: self.message.clone(),
            code: self.kind.code().to_string(),
            details: self.details.clone(),
            request_id: self.request_id.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.kind.status();
        let envelope = self.envelope();
        let request_id = envelope.request_id.as_deref().unwrap_or("-");
        let cause = self.cause.as_deref().unwrap_or("-");

        if status.is_server_error() {
            error!(code = %envelope.code, status = status.as_u16(), request_id, cause, "[api error] {}", envelope.error);
        } else {
            warn!(code = %envelope.code, status = status.as_u16(), request_id, cause, "[api error] {}", envelope.error);
        }

        let mut response = (status, Json(envelope)).into_response();
        if let Some(secs) = self.retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        // body read hit DefaultBodyLimit (no Content-Length to check up front)
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return Self::new(ErrorKind::PayloadTooLarge, "Request body too large")
                .with_cause(rejection.body_text());
        }
        Self::invalid_input("Invalid request data")
            .with_details(json!({ "reason": rejection.body_text() }))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::invalid_input("Invalid query parameters")
            .with_details(json!({ "reason": rejection.body_text() }))
    }
}

/// Response for a handler that panicked: a redacted internal-error envelope.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    ApiError::internal(message, "handler panicked").into_response()
}

// Request id from X-Request-Id, or a freshly minted one
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            format!(
                "req_{}_{:x}",
                chrono::Utc::now().timestamp_millis(),
                REQUEST_SEQ.fetch_add(1, Ordering::Relaxed)
            )
        })
}
