use crate::analytics::ServerAnalytics;
use crate::rate_limit::{Preset, RateLimitPolicy, RateLimiter};
use std::sync::Arc;

// app's shared state
#[derive(Clone)]
pub struct AppState {
    pub limiter: Arc<RateLimiter>,
    pub analytics: Arc<ServerAnalytics>,
    pub max_body_bytes: u64, // larger bodies are refused with 413
    pub admin_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(limiter: Arc<RateLimiter>, analytics: Arc<ServerAnalytics>, max_body_bytes: u64) -> Self {
        Self {
            limiter,
            analytics,
            max_body_bytes,
            admin_token: None,
        }
    }

    pub fn with_admin_token(mut self, token: Option<&str>) -> Self {
        self.admin_token = token.map(Arc::from);
        self
    }

    // Middleware state binding one preset to the shared limiter
    pub fn guard(&self, preset: Preset) -> RateLimitGuard {
        RateLimitGuard {
            limiter: self.limiter.clone(),
            policy: Arc::new(preset.policy()),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitGuard {
    pub limiter: Arc<RateLimiter>,
    pub policy: Arc<RateLimitPolicy>,
}
