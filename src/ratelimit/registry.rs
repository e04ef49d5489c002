//! Per-client registry of token buckets.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::bucket::{Quota, TokenBucket};

/// Limiter state for a single client.
#[derive(Debug)]
pub struct RateLimiterEntry {
    /// Token bucket for this client
    pub bucket: TokenBucket,
    /// Last time a request from this client was observed
    pub last_seen: Instant,
}

impl RateLimiterEntry {
    fn new(quota: Quota, now: Instant) -> Self {
        Self {
            bucket: TokenBucket::new_at(quota, now),
            last_seen: now,
        }
    }

    /// Record activity at `now`.
    pub fn touch(&mut self, now: Instant) {
        if now > self.last_seen {
            self.last_seen = now;
        }
    }

    /// Whether the entry has been idle for longer than `threshold`.
    pub fn is_idle(&self, now: Instant, threshold: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) > threshold
    }
}

/// Shared handle to a registry entry.
pub type SharedEntry = Arc<Mutex<RateLimiterEntry>>;

/// Concurrent map from client key to limiter entry.
///
/// Entries are created lazily on first access and removed by [`sweep`].
///
/// [`sweep`]: LimiterRegistry::sweep
#[derive(Debug, Default)]
pub struct LimiterRegistry {
    entries: DashMap<String, SharedEntry>,
}

impl LimiterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Return the entry for `client_key`, creating it with `quota` if absent.
    ///
    /// Creation happens under the map's shard lock, so concurrent first
    /// requests for the same key all receive the same entry.
    pub fn get_or_create(&self, client_key: &str, quota: Quota) -> SharedEntry {
        self.get_or_create_at(client_key, quota, Instant::now())
    }

    /// Same as [`get_or_create`](Self::get_or_create) with an explicit clock reading.
    pub fn get_or_create_at(&self, client_key: &str, quota: Quota, now: Instant) -> SharedEntry {
        if let Some(entry) = self.entries.get(client_key) {
            return Arc::clone(entry.value());
        }

        let entry = self
            .entries
            .entry(client_key.to_string())
            .or_insert_with(|| {
                debug!(
                    client = %client_key,
                    rate = quota.rate,
                    burst = quota.burst,
                    "Creating new token bucket"
                );
                Arc::new(Mutex::new(RateLimiterEntry::new(quota, now)))
            });

        Arc::clone(entry.value())
    }

    /// Update the last-seen time of `client_key`.
    ///
    /// Returns `false` if the key has no entry.
    pub fn touch(&self, client_key: &str) -> bool {
        self.touch_at(client_key, Instant::now())
    }

    /// Same as [`touch`](Self::touch) with an explicit clock reading.
    pub fn touch_at(&self, client_key: &str, now: Instant) -> bool {
        match self.entries.get(client_key) {
            Some(entry) => {
                entry.lock().touch(now);
                true
            }
            None => false,
        }
    }

    /// Remove every entry idle for longer than `idle_threshold`.
    ///
    /// Returns the number of removed entries.
    pub fn sweep(&self, idle_threshold: Duration) -> usize {
        self.sweep_at(Instant::now(), idle_threshold)
    }

    /// Same as [`sweep`](Self::sweep) with an explicit clock reading.
    pub fn sweep_at(&self, now: Instant, idle_threshold: Duration) -> usize {
        let before = self.entries.len();

        self.entries.retain(|key, entry| {
            // A handle held outside the map belongs to a request in flight.
            if Arc::strong_count(entry) > 1 {
                return true;
            }
            let idle = entry.lock().is_idle(now, idle_threshold);
            if idle {
                trace!(client = %key, "Evicting idle token bucket");
            }
            !idle
        });

        before.saturating_sub(self.entries.len())
    }

    /// Whether `client_key` currently has an entry.
    pub fn contains(&self, client_key: &str) -> bool {
        self.entries.contains_key(client_key)
    }

    /// Number of tracked clients.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no client is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove all entries.
    pub fn clear(&self) {
        self.entries.clear();
    }
}
