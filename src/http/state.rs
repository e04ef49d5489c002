//! Shared state handed to middleware and handlers.

use std::sync::Arc;

use super::health::HealthState;
use crate::i18n::Localizer;
use crate::ratelimit::RateLimiter;

/// State shared by the HTTP front.
#[derive(Clone)]
pub struct AppState {
    /// Per-client rate limiter
    pub limiter: Arc<RateLimiter>,
    /// Message catalogs for error bodies
    pub localizer: Arc<Localizer>,
    /// Health endpoint state
    pub health: Arc<HealthState>,
    /// Whether forwarded-for headers identify the client
    pub trust_proxy: bool,
}

impl AppState {
    pub fn new(
        limiter: Arc<RateLimiter>,
        localizer: Arc<Localizer>,
        health: Arc<HealthState>,
        trust_proxy: bool,
    ) -> Self {
        Self {
            limiter,
            localizer,
            health,
            trust_proxy,
        }
    }
}
