//! Token bucket implementation.

use std::time::{Duration, Instant};

/// Refill rate and capacity for a token bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quota {
    /// Tokens added per second
    pub rate: f64,
    /// Maximum number of tokens the bucket can hold
    pub burst: u32,
}

impl Quota {
    /// Create a new quota.
    pub fn new(rate: f64, burst: u32) -> Self {
        Self { rate, burst }
    }
}

/// A continuously refilling token bucket.
///
/// The bucket starts full. It is not synchronized; callers that share a
/// bucket across tasks must wrap it in a lock.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    quota: Quota,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket for the given quota.
    pub fn new(quota: Quota) -> Self {
        Self::new_at(quota, Instant::now())
    }

    /// Create a full bucket whose refill clock starts at `now`.
    pub fn new_at(quota: Quota, now: Instant) -> Self {
        Self {
            quota,
            tokens: quota.burst as f64,
            last_refill: now,
        }
    }

    /// Take one token if available.
    pub fn allow(&mut self) -> bool {
        self.allow_at(Instant::now())
    }

    /// Take one token if available, using `now` as the current time.
    pub fn allow_at(&mut self, now: Instant) -> bool {
        self.refill(now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time until the next token becomes available, as of the last refill.
    ///
    /// Saturates at [`Duration::MAX`] when the rate is too small for the
    /// wait to be represented.
    pub fn retry_after(&self) -> Duration {
        if self.tokens >= 1.0 || !(self.quota.rate > 0.0) {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64((1.0 - self.tokens) / self.quota.rate).unwrap_or(Duration::MAX)
    }

    /// Tokens currently held, as of the last refill.
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    /// The quota this bucket was created with.
    pub fn quota(&self) -> Quota {
        self.quota
    }

    fn refill(&mut self, now: Instant) {
        // A clock reading older than the last refill adds nothing.
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        let capacity = self.quota.burst as f64;

        self.tokens = (self.tokens + elapsed * self.quota.rate).min(capacity);
        if now > self.last_refill {
            self.last_refill = now;
        }
    }
}
