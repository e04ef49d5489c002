//! Core rate limiter implementation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::trace;

use super::bucket::Quota;
use super::registry::LimiterRegistry;

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// The request may proceed
    Allowed,
    /// The client is over its quota
    Limited {
        /// Time until the client's next token becomes available
        retry_after: Duration,
    },
}

impl Decision {
    /// Whether the request may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// The per-client rate limiter.
///
/// Every client key gets its own token bucket with the configured quota.
/// This struct is thread-safe and meant to be shared behind an `Arc`.
#[derive(Debug)]
pub struct RateLimiter {
    registry: Arc<LimiterRegistry>,
    quota: Quota,
}

impl RateLimiter {
    /// Create a rate limiter with its own registry.
    pub fn new(quota: Quota) -> Self {
        Self::with_registry(Arc::new(LimiterRegistry::new()), quota)
    }

    /// Create a rate limiter over an existing registry.
    pub fn with_registry(registry: Arc<LimiterRegistry>, quota: Quota) -> Self {
        Self { registry, quota }
    }

    /// Check and consume one request for `client_key`.
    pub fn check(&self, client_key: &str) -> Decision {
        self.check_at(client_key, Instant::now())
    }

    /// Same as [`check`](Self::check) with an explicit clock reading.
    pub fn check_at(&self, client_key: &str, now: Instant) -> Decision {
        let entry = self.registry.get_or_create_at(client_key, self.quota, now);
        let mut entry = entry.lock();

        // Activity counts whether or not the request is allowed.
        entry.touch(now);

        if entry.bucket.allow_at(now) {
            trace!(client = %client_key, remaining = entry.bucket.tokens(), "Request allowed");
            Decision::Allowed
        } else {
            Decision::Limited {
                retry_after: entry.bucket.retry_after(),
            }
        }
    }

    /// The registry backing this limiter.
    pub fn registry(&self) -> &Arc<LimiterRegistry> {
        &self.registry
    }

    /// The quota applied to new clients.
    pub fn quota(&self) -> Quota {
        self.quota
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_rate_limiter_creation() {
        let limiter = RateLimiter::new(Quota::new(5.0, 10));
        assert!(limiter.registry().is_empty());
    }

    #[test]
    fn test_example_quota() {
        let limiter = RateLimiter::new(Quota::new(5.0, 10));
        let start = Instant::now();

        for i in 0..10 {
            assert!(
                limiter.check_at("10.0.0.1", start).is_allowed(),
                "request {} should be allowed",
                i + 1
            );
        }
        assert!(!limiter.check_at("10.0.0.1", start).is_allowed());

        let later = start + Duration::from_secs(1);
        assert!(limiter.check_at("10.0.0.1", later).is_allowed());
    }

    #[test]
    fn test_limited_reports_retry_after() {
        let limiter = RateLimiter::new(Quota::new(1.0, 1));
        let start = Instant::now();

        limiter.check_at("10.0.0.1", start);
        match limiter.check_at("10.0.0.1", start) {
            Decision::Limited { retry_after } => assert_eq!(retry_after, Duration::from_secs(1)),
            Decision::Allowed => panic!("second request should be limited"),
        }
    }

    #[test]
    fn test_denied_request_still_touches() {
        let limiter = RateLimiter::new(Quota::new(1.0, 1));
        let start = Instant::now();
        let later = start + Duration::from_millis(10);

        limiter.check_at("10.0.0.1", start);
        assert!(!limiter.check_at("10.0.0.1", later).is_allowed());

        let entry = limiter.registry().get_or_create_at("10.0.0.1", limiter.quota(), later);
        assert_eq!(entry.lock().last_seen, later);
    }

    #[test]
    fn test_clients_are_isolated() {
        let limiter = RateLimiter::new(Quota::new(1.0, 2));
        let now = Instant::now();

        limiter.check_at("10.0.0.1", now);
        limiter.check_at("10.0.0.1", now);
        assert!(!limiter.check_at("10.0.0.1", now).is_allowed());

        assert!(limiter.check_at("10.0.0.2", now).is_allowed());
        assert_eq!(limiter.registry().len(), 2);
    }

    #[test]
    fn test_denial_with_tiny_rate() {
        let limiter = RateLimiter::new(Quota::new(1.0e-20, 1));
        let now = Instant::now();

        assert!(limiter.check_at("10.0.0.1", now).is_allowed());
        assert_eq!(
            limiter.check_at("10.0.0.1", now),
            Decision::Limited {
                retry_after: Duration::MAX
            }
        );
    }

    #[test]
    fn test_concurrent_first_requests_share_one_bucket() {
        let limiter = Arc::new(RateLimiter::new(Quota::new(0.001, 5)));
        let barrier = Arc::new(Barrier::new(16));
        let allowed = Arc::new(AtomicUsize::new(0));
        let now = Instant::now();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let barrier = Arc::clone(&barrier);
                let allowed = Arc::clone(&allowed);
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..4 {
                        if limiter.check_at("10.0.0.1", now).is_allowed() {
                            allowed.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(allowed.load(Ordering::SeqCst), 5);
        assert_eq!(limiter.registry().len(), 1);
    }
}
