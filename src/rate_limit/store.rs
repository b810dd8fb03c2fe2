use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;

// Rate limit entry - tracks requests per key within the current window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitEntry {
    pub key: String,
    pub count: u32,
    pub reset_at: DateTime<Utc>,
    pub first_request_at: DateTime<Utc>,
    pub last_request_at: DateTime<Utc>,
    // rejections across windows, not reset when a new window opens
    pub blocked_count: u32,
}

impl RateLimitEntry {
    fn open(key: &str, now: DateTime<Utc>, window: Duration) -> Self {
        Self {
            key: key.to_string(),
            count: 1,
            reset_at: now + window,
            first_request_at: now,
            last_request_at: now,
            blocked_count: 0,
        }
    }
}

// Result of counting one request
#[derive(Debug, Clone)]
pub struct Recorded {
    pub entry: RateLimitEntry,
    pub blocked: bool,
}

/// Backing storage for rate-limit counters.
///
/// `record` must behave as one atomic increment-and-expire step so that an
/// external key-value store can stand in for the in-memory map.
pub trait RateLimitStore: Send + Sync {
    /// Count a request for `key`. Opens a fresh window when none is active.
    fn record(&self, key: &str, window: Duration, max_requests: u32, now: DateTime<Utc>)
    -> Recorded;

    /// Give back one request counted in the window ending at `reset_at`.
    /// Returns false when that window is gone.
    fn release(&self, key: &str, reset_at: DateTime<Utc>) -> bool;

    fn get(&self, key: &str) -> Option<RateLimitEntry>;

    fn remove(&self, key: &str) -> bool;

    fn remove_where(&self, predicate: &dyn Fn(&str) -> bool) -> usize;

    /// Drop entries whose window closed before `now`.
    fn purge_expired(&self, now: DateTime<Utc>) -> usize;

    fn clear(&self);

    fn snapshot(&self) -> Vec<RateLimitEntry>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Process-local store. Counters are not shared between instances.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: DashMap<String, RateLimitEntry>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitStore for InMemoryStore {
    fn record(
        &self,
        key: &str,
        window: Duration,
        max_requests: u32,
        now: DateTime<Utc>,
    ) -> Recorded {
        match self.entries.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                let entry = RateLimitEntry::open(key, now, window);
                slot.insert(entry.clone());
                Recorded { entry, blocked: false }
            }
            Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();

                // window expired..? start a new one
                if entry.reset_at <= now {
                    entry.count = 1;
                    entry.reset_at = now + window;
                    entry.last_request_at = now;
                    return Recorded { entry: entry.clone(), blocked: false };
                }

                entry.count = entry.count.saturating_add(1);
                entry.last_request_at = now;

                let blocked = entry.count > max_requests;
                if blocked {
                    entry.blocked_count = entry.blocked_count.saturating_add(1);
                }
                Recorded { entry: entry.clone(), blocked }
            }
        }
    }

    fn release(&self, key: &str, reset_at: DateTime<Utc>) -> bool {
        match self.entries.get_mut(key) {
            Some(mut entry) if entry.reset_at == reset_at => {
                entry.count = entry.count.saturating_sub(1);
                true
            }
            _ => false,
        }
    }

    fn get(&self, key: &str) -> Option<RateLimitEntry> {
        self.entries.get(key).map(|e| e.clone())
    }

    fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    fn remove_where(&self, predicate: &dyn Fn(&str) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|k, _| !predicate(k.as_str()));
        before.saturating_sub(self.entries.len())
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.reset_at >= now);
        before.saturating_sub(self.entries.len())
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn snapshot(&self) -> Vec<RateLimitEntry> {
        self.entries.iter().map(|e| e.value().clone()).collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
