use serde::Serialize;
use std::time::Duration;

// Quota applied to one class of routes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitPolicy {
    pub name: String,
    #[serde(serialize_with = "as_millis")]
    pub window: Duration,
    pub max_requests: u32,
    // successful responses give their slot back
    pub skip_successful_requests: bool,
    // failed responses give their slot back
    pub skip_failed_requests: bool,
}

fn as_millis<S: serde::Serializer>(window: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(window.as_millis() as u64)
}

impl RateLimitPolicy {
    pub fn new(name: impl Into<String>, window: Duration, max_requests: u32) -> Self {
        Self {
            name: name.into(),
            window,
            max_requests,
            skip_successful_requests: false,
            skip_failed_requests: false,
        }
    }

    pub fn skip_successful_requests(mut self) -> Self {
        self.skip_successful_requests = true;
        self
    }

    pub fn skip_failed_requests(mut self) -> Self {
        self.skip_failed_requests = true;
        self
    }

    // Whether a finished request should be given back given its HTTP status
    pub fn releases(&self, status: u16) -> bool {
        (self.skip_successful_requests && status < 400)
            || (self.skip_failed_requests && status >= 400)
    }
}

/// The route classes the site rate limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    /// General API traffic, 60 per minute.
    Api,
    /// Sign-in attempts, 5 per 15 minutes. Only failed attempts count.
    Auth,
    /// Search and template lookups, 30 per minute.
    Search,
    /// AI chat, 30 per minute.
    Chat,
    /// File uploads, 20 per hour.
    Upload,
}

impl Preset {
    pub const ALL: [Preset; 5] = [
        Preset::Api,
        Preset::Auth,
        Preset::Search,
        Preset::Chat,
        Preset::Upload,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Preset::Api => "api",
            Preset::Auth => "auth",
            Preset::Search => "search",
            Preset::Chat => "chat",
            Preset::Upload => "upload",
        }
    }

    pub fn policy(self) -> RateLimitPolicy {
        match self {
            Preset::Api => RateLimitPolicy::new(self.name(), Duration::from_secs(60), 60),
            Preset::Auth => {
                RateLimitPolicy::new(self.name(), Duration::from_secs(15 * 60), 5)
                    .skip_successful_requests()
            }
            Preset::Search => RateLimitPolicy::new(self.name(), Duration::from_secs(60), 30),
            Preset::Chat => RateLimitPolicy::new(self.name(), Duration::from_secs(60), 30),
            Preset::Upload => RateLimitPolicy::new(self.name(), Duration::from_secs(3600), 20),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_match_site_quotas() {
        let auth = Preset::Auth.policy();
        assert_eq!(auth.window, Duration::from_secs(900));
        assert_eq!(auth.max_requests, 5);
        assert!(auth.skip_successful_requests);
        assert!(!auth.skip_failed_requests);

        assert_eq!(Preset::Api.policy().max_requests, 60);
        assert_eq!(Preset::Upload.policy().window, Duration::from_secs(3600));
        assert!(Preset::ALL.iter().all(|p| p.policy().name == p.name()));
    }

    #[test]
    fn release_follows_skip_flags() {
        let auth = Preset::Auth.policy();
        assert!(auth.releases(200));
        assert!(auth.releases(302));
        assert!(!auth.releases(401));

        let failed = RateLimitPolicy::new("x", Duration::from_secs(1), 1).skip_failed_requests();
        assert!(failed.releases(500));
        assert!(!failed.releases(204));

        assert!(!Preset::Search.policy().releases(200));
    }
}
