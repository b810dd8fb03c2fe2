use super::policy::RateLimitPolicy;
use super::store::{InMemoryStore, RateLimitStore};
use crate::clock::{Clock, SystemClock};
use crate::metrics::{RATE_LIMITED, RATE_LIMIT_ENTRIES};
use chrono::{DateTime, Duration, Utc};
use dashmap::{DashMap, DashSet};
use serde::Serialize;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, warn};

// a key blocked more often than this is flagged as a heavy user
const HEAVY_USER_THRESHOLD: u32 = 5;
// heavy-user markers older than this are forgotten by the sweep
const HEAVY_USER_TTL_SECS: i64 = 3600;
const DEFAULT_SWEEP_INTERVAL_SECS: i64 = 300;
const TOP_OFFENDERS: usize = 10;
// rough per-entry footprint reported by stats
const ESTIMATED_MB_PER_ENTRY: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    // reset_at identifies the window the request was counted in
    Allowed { reset_at: DateTime<Utc> },
    Blocked { retry_after_secs: u64 },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Offender {
    pub key: String,
    pub policy: String,
    pub requests: u32,
    pub blocked: u32,
    pub first_request: String,
    pub last_request: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    pub entries: usize,
    pub estimated_mb: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStats {
    pub total_requests: u64,
    pub blocked_requests: u64,
    pub block_rate: String,
    pub unique_clients: usize,
    pub active_entries: usize,
    pub heavy_users: usize,
    pub top_offenders: Vec<Offender>,
    pub memory_usage: MemoryUsage,
}

// running aggregates across every policy
struct Monitor {
    total_requests: AtomicU64,
    blocked_requests: AtomicU64,
    unique_clients: DashSet<String>,
    heavy_users: DashMap<String, DateTime<Utc>>,
    last_cleanup: Mutex<DateTime<Utc>>,
}

/// Fixed-window request counter keyed by client and policy.
///
/// Each policy gets its own counter per client: entries are stored under
/// `"{policy}:{client}"`. A window opens on the first request and closes at
/// `reset_at`; the next request after that starts a new window with a count
/// of one. Bursts straddling two windows can therefore reach twice the quota.
///
/// Counters live in the injected [`RateLimitStore`], so every process keeps
/// its own quota unless a shared store is plugged in.
pub struct RateLimiter {
    store: Box<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    monitor: Monitor,
    sweep_interval: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_parts(Box::new(InMemoryStore::new()), Arc::new(SystemClock))
    }

    pub fn with_parts(store: Box<dyn RateLimitStore>, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            store,
            clock,
            monitor: Monitor {
                total_requests: AtomicU64::new(0),
                blocked_requests: AtomicU64::new(0),
                unique_clients: DashSet::new(),
                heavy_users: DashMap::new(),
                last_cleanup: Mutex::new(now),
            },
            sweep_interval: Duration::seconds(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }

    pub fn with_sweep_interval(mut self, interval: std::time::Duration) -> Self {
        self.sweep_interval = Duration::from_std(interval)
            .unwrap_or_else(|_| Duration::seconds(DEFAULT_SWEEP_INTERVAL_SECS));
        self
    }

    /// Count one request from `key` against `policy`.
    ///
    /// Never fails; an unknown key is simply a first request.
    pub fn check_and_increment(&self, key: &str, policy: &RateLimitPolicy) -> Decision {
        let now = self.clock.now();

        self.monitor.total_requests.fetch_add(1, Ordering::Relaxed);
        if !self.monitor.unique_clients.contains(key) {
            self.monitor.unique_clients.insert(key.to_string());
        }

        self.sweep_at(now);

        let window = Duration::from_std(policy.window).unwrap_or_else(|_| Duration::weeks(52));
        let recorded = self
            .store
            .record(&store_key(policy, key), window, policy.max_requests, now);

        if !recorded.blocked {
            return Decision::Allowed {
                reset_at: recorded.entry.reset_at,
            };
        }

        self.monitor.blocked_requests.fetch_add(1, Ordering::Relaxed);
        RATE_LIMITED.with_label_values(&[policy.name.as_str()]).inc();

        if recorded.entry.blocked_count > HEAVY_USER_THRESHOLD {
            self.monitor.heavy_users.insert(key.to_string(), now);
        }

        if policy.skip_successful_requests {
            // only failures count here, so hitting the limit means repeated failures
            error!(key, policy = %policy.name, "rate limit reached");
        } else {
            warn!(key, policy = %policy.name, "rate limit reached");
        }

        Decision::Blocked {
            retry_after_secs: retry_after_secs(recorded.entry.reset_at, now),
        }
    }

    /// Hand back one request counted in the window ending at `reset_at`
    /// (skip_successful / skip_failed). A no-op once that window has rolled
    /// over, so a slow handler never frees a slot in the next window.
    pub fn release(&self, key: &str, policy: &RateLimitPolicy, reset_at: DateTime<Utc>) -> bool {
        self.store.release(&store_key(policy, key), reset_at)
    }

    /// Purge closed windows and stale heavy-user markers. Runs at most once
    /// per sweep interval; returns the number of entries removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(self.clock.now())
    }

    fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        {
            let mut last = self
                .monitor
                .last_cleanup
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            if now - *last < self.sweep_interval {
                return 0;
            }
            *last = now;
        }

        let purged = self.store.purge_expired(now);

        let stale_before = now - Duration::seconds(HEAVY_USER_TTL_SECS);
        self.monitor.heavy_users.retain(|_, seen| *seen >= stale_before);

        RATE_LIMIT_ENTRIES.set(self.store.len() as i64);
        if purged > 0 {
            debug!(purged, remaining = self.store.len(), "swept rate limit entries");
        }
        purged
    }

    pub fn stats(&self) -> RateLimitStats {
        let now = self.clock.now();
        let total = self.monitor.total_requests.load(Ordering::Relaxed);
        let blocked = self.monitor.blocked_requests.load(Ordering::Relaxed);

        let mut active: Vec<_> = self
            .store
            .snapshot()
            .into_iter()
            .filter(|e| e.reset_at > now)
            .collect();
        let active_entries = active.len();

        active.sort_by(|a, b| b.blocked_count.cmp(&a.blocked_count));
        let top_offenders = active
            .into_iter()
            .take(TOP_OFFENDERS)
            .map(|e| {
                let (policy, key) = split_store_key(&e.key);
                Offender {
                    key: key.to_string(),
                    policy: policy.to_string(),
                    requests: e.count,
                    blocked: e.blocked_count,
                    first_request: e.first_request_at.to_rfc3339(),
                    last_request: e.last_request_at.to_rfc3339(),
                }
            })
            .collect();

        let entries = self.store.len();
        RateLimitStats {
            total_requests: total,
            blocked_requests: blocked,
            block_rate: block_rate(total, blocked),
            unique_clients: self.monitor.unique_clients.len(),
            active_entries,
            heavy_users: self.monitor.heavy_users.len(),
            top_offenders,
            memory_usage: MemoryUsage {
                entries,
                estimated_mb: format!("{:.2}", entries as f64 * ESTIMATED_MB_PER_ENTRY),
            },
        }
    }

    // Forget a client under every policy; returns entries removed
    pub fn reset_key(&self, key: &str) -> usize {
        self.monitor.heavy_users.remove(key);
        self.store
            .remove_where(&|stored: &str| split_store_key(stored).1 == key)
    }

    pub fn clear(&self) {
        self.store.clear();
        self.monitor.total_requests.store(0, Ordering::Relaxed);
        self.monitor.blocked_requests.store(0, Ordering::Relaxed);
        self.monitor.unique_clients.clear();
        self.monitor.heavy_users.clear();
        RATE_LIMIT_ENTRIES.set(0);
    }

    pub fn entry(&self, key: &str, policy: &RateLimitPolicy) -> Option<super::RateLimitEntry> {
        self.store.get(&store_key(policy, key))
    }
}

fn store_key(policy: &RateLimitPolicy, key: &str) -> String {
    format!("{}:{}", policy.name, key)
}

// policy names never contain ':' but client keys (IPv6) may
fn split_store_key(stored: &str) -> (&str, &str) {
    stored.split_once(':').unwrap_or(("", stored))
}

// whole seconds, rounded up; a blocked caller always waits at least one
fn retry_after_secs(reset_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let remaining = reset_at - now;
    let micros = remaining
        .num_microseconds()
        .unwrap_or_else(|| remaining.num_seconds().saturating_mul(1_000_000))
        .max(0) as u64;
    micros.div_ceil(1_000_000).max(1)
}

fn block_rate(total: u64, blocked: u64) -> String {
    if total == 0 {
        return "0%".to_string();
    }
    format!("{:.2}%", blocked as f64 / total as f64 * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::rate_limit::Preset;
    use std::time::Duration as StdDuration;

    fn limiter() -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let limiter = RateLimiter::with_parts(Box::new(InMemoryStore::new()), clock.clone());
        (limiter, clock)
    }

    fn two_per_minute() -> RateLimitPolicy {
        RateLimitPolicy::new("test", StdDuration::from_millis(60_000), 2)
    }

    #[test]
    fn allows_up_to_quota_within_window() {
        let (limiter, _) = limiter();
        let policy = RateLimitPolicy::new("test", StdDuration::from_secs(60), 5);
        for _ in 0..5 {
            assert!(limiter.check_and_increment("k", &policy).is_allowed());
        }
    }

    #[test]
    fn blocks_the_request_after_quota() {
        let (limiter, clock) = limiter();
        let policy = two_per_minute();
        limiter.check_and_increment("1.2.3.4", &policy);
        clock.advance(StdDuration::from_millis(10_500));
        limiter.check_and_increment("1.2.3.4", &policy);

        match limiter.check_and_increment("1.2.3.4", &policy) {
            Decision::Blocked { retry_after_secs } => assert_eq!(retry_after_secs, 50),
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn example_scenario_two_per_minute() {
        let (limiter, clock) = limiter();
        let policy = two_per_minute();

        assert!(limiter.check_and_increment("1.2.3.4", &policy).is_allowed());
        assert!(limiter.check_and_increment("1.2.3.4", &policy).is_allowed());

        match limiter.check_and_increment("1.2.3.4", &policy) {
            Decision::Blocked { retry_after_secs } => {
                assert!((1..=60).contains(&retry_after_secs))
            }
            Decision::Allowed { .. } => panic!("third call inside the minute must be blocked"),
        }

        clock.advance(StdDuration::from_millis(61_000));
        assert!(limiter.check_and_increment("1.2.3.4", &policy).is_allowed());
        assert_eq!(limiter.entry("1.2.3.4", &policy).map(|e| e.count), Some(1));
    }

    #[test]
    fn new_window_allows_even_after_heavy_blocking() {
        let (limiter, clock) = limiter();
        let policy = two_per_minute();
        for _ in 0..20 {
            limiter.check_and_increment("k", &policy);
        }
        clock.advance(StdDuration::from_secs(61));
        assert!(limiter.check_and_increment("k", &policy).is_allowed());
    }

    #[test]
    fn keys_and_policies_are_isolated() {
        let (limiter, _) = limiter();
        let policy = RateLimitPolicy::new("one", StdDuration::from_secs(60), 1);
        let other = RateLimitPolicy::new("two", StdDuration::from_secs(60), 1);

        assert!(limiter.check_and_increment("a", &policy).is_allowed());
        assert!(limiter.check_and_increment("b", &policy).is_allowed());
        assert!(limiter.check_and_increment("a", &other).is_allowed());
        assert!(!limiter.check_and_increment("a", &policy).is_allowed());
    }

    #[test]
    fn released_requests_do_not_use_quota() {
        let (limiter, _) = limiter();
        let policy = Preset::Auth.policy();
        for _ in 0..policy.max_requests {
            let Decision::Allowed { reset_at } = limiter.check_and_increment("k", &policy) else {
                panic!("released requests must never block");
            };
            assert!(limiter.release("k", &policy, reset_at));
        }
        assert!(limiter.check_and_increment("k", &policy).is_allowed());
    }

    #[test]
    fn release_after_rollover_leaves_new_window_alone() {
        let (limiter, clock) = limiter();
        let policy = two_per_minute();

        let Decision::Allowed { reset_at } = limiter.check_and_increment("k", &policy) else {
            panic!("first request must be allowed");
        };
        // the handler outlives its window and a new request opens the next one
        clock.advance(StdDuration::from_secs(61));
        assert!(limiter.check_and_increment("k", &policy).is_allowed());

        assert!(!limiter.release("k", &policy, reset_at));
        assert_eq!(limiter.entry("k", &policy).map(|e| e.count), Some(1));
    }

    #[test]
    fn block_in_last_instant_of_window_still_waits() {
        let (limiter, clock) = limiter();
        let policy = RateLimitPolicy::new("tight", StdDuration::from_secs(60), 1);
        assert!(limiter.check_and_increment("k", &policy).is_allowed());

        clock.advance(StdDuration::from_micros(59_999_600));
        match limiter.check_and_increment("k", &policy) {
            Decision::Blocked { retry_after_secs } => assert_eq!(retry_after_secs, 1),
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn stats_track_blocks_and_offenders() {
        let (limiter, _) = limiter();
        let policy = RateLimitPolicy::new("api", StdDuration::from_secs(60), 1);
        for _ in 0..8 {
            limiter.check_and_increment("bad", &policy);
        }
        limiter.check_and_increment("good", &policy);

        let stats = limiter.stats();
        assert_eq!(stats.total_requests, 9);
        assert_eq!(stats.blocked_requests, 7);
        assert_eq!(stats.block_rate, "77.78%");
        assert_eq!(stats.unique_clients, 2);
        assert_eq!(stats.active_entries, 2);
        assert_eq!(stats.heavy_users, 1);
        assert_eq!(stats.top_offenders[0].key, "bad");
        assert_eq!(stats.top_offenders[0].policy, "api");
        assert_eq!(stats.top_offenders[0].blocked, 7);
        assert_eq!(stats.memory_usage.entries, 2);
    }

    #[test]
    fn idle_stats_report_zero_rate() {
        let (limiter, _) = limiter();
        assert_eq!(limiter.stats().block_rate, "0%");
    }

    #[test]
    fn sweep_is_throttled_and_purges_expired() {
        let (limiter, clock) = limiter();
        let policy = RateLimitPolicy::new("p", StdDuration::from_secs(60), 10);
        limiter.check_and_increment("a", &policy);

        clock.advance(StdDuration::from_secs(120));
        // last sweep was at construction, two minutes ago
        assert_eq!(limiter.sweep(), 0);

        clock.advance(StdDuration::from_secs(200));
        assert_eq!(limiter.sweep(), 1);
        assert!(limiter.entry("a", &policy).is_none());
    }

    #[test]
    fn sweep_forgets_stale_heavy_users() {
        let (limiter, clock) = limiter();
        let policy = RateLimitPolicy::new("p", StdDuration::from_secs(60), 1);
        for _ in 0..10 {
            limiter.check_and_increment("noisy", &policy);
        }
        assert_eq!(limiter.stats().heavy_users, 1);

        clock.advance(StdDuration::from_secs(2 * 3600));
        limiter.sweep();
        assert_eq!(limiter.stats().heavy_users, 0);
    }

    #[test]
    fn reset_key_and_clear() {
        let (limiter, _) = limiter();
        let policy = RateLimitPolicy::new("api", StdDuration::from_secs(60), 1);
        let chat = Preset::Chat.policy();
        limiter.check_and_increment("2001:db8::1", &policy);
        limiter.check_and_increment("2001:db8::1", &chat);
        limiter.check_and_increment("other", &policy);

        assert_eq!(limiter.reset_key("2001:db8::1"), 2);
        assert!(limiter.check_and_increment("2001:db8::1", &policy).is_allowed());

        limiter.clear();
        let stats = limiter.stats();
        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.memory_usage.entries, 0);
    }

    #[test]
    fn retry_after_rounds_up() {
        let now = Utc::now();
        assert_eq!(retry_after_secs(now + Duration::milliseconds(1), now), 1);
        assert_eq!(retry_after_secs(now + Duration::milliseconds(59_001), now), 60);
        assert_eq!(retry_after_secs(now + Duration::microseconds(400), now), 1);
        assert_eq!(retry_after_secs(now, now), 1);
    }
}
