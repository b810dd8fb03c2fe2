mod limiter;
mod policy;
mod store;

pub use limiter::{Decision, MemoryUsage, Offender, RateLimitStats, RateLimiter};
pub use policy::{Preset, RateLimitPolicy};
pub use store::{InMemoryStore, RateLimitEntry, RateLimitStore, Recorded};

use axum::http::HeaderMap;

// shared bucket for callers that carry no client address header
pub const ANONYMOUS_KEY: &str = "anonymous";

const CLIENT_HEADERS: [&str; 3] = ["x-forwarded-for", "x-real-ip", "cf-connecting-ip"];

/// Client identifier for rate limiting: the first non-empty of
/// `X-Forwarded-For` (leftmost hop), `X-Real-IP` and `CF-Connecting-IP`.
/// Requests without any of them all share the `"anonymous"` bucket.
pub fn client_key(headers: &HeaderMap) -> String {
    CLIENT_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(',').next())
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| ANONYMOUS_KEY.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn client_key_header_precedence() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_key(&headers), "anonymous");

        headers.insert("cf-connecting-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(client_key(&headers), "9.9.9.9");

        headers.insert("x-real-ip", HeaderValue::from_static("5.5.5.5"));
        assert_eq!(client_key(&headers), "5.5.5.5");

        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4, 10.0.0.1"));
        assert_eq!(client_key(&headers), "1.2.3.4");
    }

    #[test]
    fn empty_forwarded_for_falls_through() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("  "));
        headers.insert("x-real-ip", HeaderValue::from_static("5.5.5.5"));
        assert_eq!(client_key(&headers), "5.5.5.5");
    }
}
