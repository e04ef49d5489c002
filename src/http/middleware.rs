//! Request middleware: rate limiting, trace ids and request logging.

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{info, info_span, warn, Instrument};

use super::client::{client_key, request_language};
use super::response::{ApiError, ErrorKind};
use super::state::AppState;
use crate::ratelimit::Decision;

/// Response header carrying the request's trace id.
pub const TRACE_ID_HEADER: HeaderName = HeaderName::from_static("x-trace-id");

const TRACE_ID_LEN: usize = 16;

/// Reject requests from clients over their quota with 429.
///
/// Runs before every handler; a rejected request never reaches the router.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let key = client_key(request.headers(), request.extensions(), state.trust_proxy);

    match state.limiter.check(&key) {
        Decision::Allowed => next.run(request).await,
        Decision::Limited { retry_after } => {
            warn!(
                client = %key,
                path = %request.uri().path(),
                retry_after_ms = retry_after.as_millis() as u64,
                "Rate limit exceeded"
            );
            let lang = request_language(request.headers());
            ApiError::localized(ErrorKind::TooManyRequests, &state.localizer, &lang)
                .with_retry_after(retry_after)
                .into_response()
        }
    }
}

/// Random identifier attached to each request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceId(pub String);

impl TraceId {
    /// Generate a 16 character base62 id.
    pub fn generate() -> Self {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TRACE_ID_LEN)
            .map(char::from)
            .collect();
        TraceId(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Assign a trace id, run the request inside a span and log its outcome.
///
/// Health probes are not logged.
pub async fn trace_requests(mut request: Request, next: Next) -> Response {
    let trace_id = TraceId::generate();
    request.extensions_mut().insert(trace_id.clone());

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default();

    let span = info_span!("request", trace_id = %trace_id.as_str(), method = %method, path = %path);
    let started = Instant::now();

    let mut response = next.run(request).instrument(span.clone()).await;

    if let Ok(value) = HeaderValue::from_str(trace_id.as_str()) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }

    if !is_probe(&path) {
        span.in_scope(|| {
            info!(
                status = response.status().as_u16(),
                latency_ms = started.elapsed().as_millis() as u64,
                client = %client,
                "Request completed"
            );
        });
    }

    response
}

fn is_probe(path: &str) -> bool {
    path == "/health/live" || path == "/health/ready"
}
