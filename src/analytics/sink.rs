use super::event::EventPayload;
use crate::error::ApiError;
use axum::http::StatusCode;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

pub const GA4_ENDPOINT: &str = "https://www.google-analytics.com/mp/collect";
pub const GA4_DEBUG_ENDPOINT: &str = "https://www.google-analytics.com/debug/mp/collect";

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("collector unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("collector responded with status {status}")]
    Rejected { status: u16 },
}

impl DeliveryError {
    // worth another attempt on the next flush
    pub fn is_retryable(&self) -> bool {
        match self {
            DeliveryError::Transport(_) => true,
            DeliveryError::Rejected { status } => *status == 429 || *status >= 500,
        }
    }

    // The failure in API error terms, logged next to the raw error
    pub fn api_error(&self, service: &str) -> ApiError {
        match self {
            DeliveryError::Transport(err) => ApiError::from_reqwest(service, err),
            DeliveryError::Rejected { status } => ApiError::from_external_status(
                service,
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                None,
            ),
        }
    }
}

/// Destination for queued analytics payloads. One call per payload.
pub trait EventSink: Send + Sync + 'static {
    fn deliver(
        &self,
        payload: &EventPayload,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectorTarget {
    // GA4 Measurement Protocol
    Ga4 {
        measurement_id: String,
        api_secret: String,
        debug: bool,
    },
    // our own collector, payloads posted to {endpoint}/collect
    Custom { endpoint: String },
}

impl CollectorTarget {
    pub fn url(&self) -> String {
        match self {
            CollectorTarget::Ga4 {
                measurement_id,
                api_secret,
                debug,
            } => {
                let base = if *debug { GA4_DEBUG_ENDPOINT } else { GA4_ENDPOINT };
                format!("{base}?measurement_id={measurement_id}&api_secret={api_secret}")
            }
            CollectorTarget::Custom { endpoint } => {
                format!("{}/collect", endpoint.trim_end_matches('/'))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CollectorTarget::Ga4 { .. } => "GA4",
            CollectorTarget::Custom { .. } => "collector",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidationResponse {
    #[serde(default)]
    validation_messages: Vec<serde_json::Value>,
}

// Posts each payload as JSON to the configured collector
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: reqwest::Client,
    target: CollectorTarget,
    url: String,
}

impl HttpSink {
    pub fn new(client: reqwest::Client, target: CollectorTarget) -> Self {
        let url = target.url();
        Self {
            client,
            target,
            url,
        }
    }
}

impl EventSink for HttpSink {
    async fn deliver(&self, payload: &EventPayload) -> Result<(), DeliveryError> {
        let res = self
            .client
            .post(&self.url)
            .timeout(DELIVERY_TIMEOUT)
            .json(payload)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
            });
        }

        // debug endpoint answers with validation findings instead of silently accepting
        if let CollectorTarget::Ga4 { debug: true, .. } = self.target {
            if let Ok(body) = res.json::<ValidationResponse>().await {
                if !body.validation_messages.is_empty() {
                    warn!(
                        collector = self.target.name(),
                        messages = ?body.validation_messages,
                        "analytics validation messages"
                    );
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn ga4_url_carries_credentials() {
        let target = CollectorTarget::Ga4 {
            measurement_id: "G-TEST".into(),
            api_secret: "s3cret".into(),
            debug: false,
        };
        assert_eq!(
            target.url(),
            "https://www.google-analytics.com/mp/collect?measurement_id=G-TEST&api_secret=s3cret"
        );

        let debug = CollectorTarget::Ga4 {
            measurement_id: "G-TEST".into(),
            api_secret: "s3cret".into(),
            debug: true,
        };
        assert!(debug.url().starts_with(GA4_DEBUG_ENDPOINT));
    }

    #[test]
    fn custom_url_appends_collect() {
        let target = CollectorTarget::Custom {
            endpoint: "http://localhost:9000/".into(),
        };
        assert_eq!(target.url(), "http://localhost:9000/collect");
    }

    #[test]
    fn only_transient_failures_retry() {
        assert!(DeliveryError::Rejected { status: 503 }.is_retryable());
        assert!(DeliveryError::Rejected { status: 429 }.is_retryable());
        assert!(!DeliveryError::Rejected { status: 400 }.is_retryable());
        assert!(!DeliveryError::Rejected { status: 403 }.is_retryable());
    }

    #[test]
    fn delivery_failures_map_to_api_codes() {
        let code = |status| DeliveryError::Rejected { status }.api_error("GA4").kind();
        assert_eq!(code(503), ErrorKind::BadGateway);
        assert_eq!(code(429), ErrorKind::RateLimitExceeded);
        assert_eq!(code(403), ErrorKind::Forbidden);
        assert_eq!(code(500), ErrorKind::Internal);
    }
}
