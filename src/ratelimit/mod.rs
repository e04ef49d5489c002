//! Per-client token bucket rate limiting.

mod bucket;
mod limiter;
mod registry;
mod sweeper;

pub use bucket::{Quota, TokenBucket};
pub use limiter::{Decision, RateLimiter};
pub use registry::{LimiterRegistry, RateLimiterEntry, SharedEntry};
pub use sweeper::Sweeper;
