//! Bookgate - rate limiting HTTP front for the book system
//!
//! Every request passes a per-client token bucket limiter before reaching the
//! API. Buckets live in a concurrent registry keyed by client address and are
//! evicted by a background sweeper once idle.

pub mod config;
pub mod error;
pub mod http;
pub mod i18n;
pub mod logging;
pub mod ratelimit;
