//! HTTP router and server.

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::Response as HttpResponse;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::catch_panic::{CatchPanicLayer, ResponseForPanic};
use tracing::{error, info};

use super::client::Lang;
use super::health;
use super::middleware::{rate_limit, trace_requests};
use super::response::{ApiError, ErrorKind};
use super::state::AppState;
use crate::error::{AppError, Result};
use crate::i18n::Localizer;

/// Build the router: health endpoints plus `api`, behind the rate limiter.
///
/// Layers run outermost first: trace id and logging, rate limiting, panic
/// recovery, then the route handler.
pub fn build_router(state: AppState, api: Router<AppState>) -> Router {
    let panic_responder = PanicResponder {
        localizer: Arc::clone(&state.localizer),
    };

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .merge(api)
        .fallback(not_found)
        .layer(CatchPanicLayer::custom(panic_responder))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(middleware::from_fn(trace_requests))
        .with_state(state)
}

async fn not_found(State(state): State<AppState>, Lang(lang): Lang) -> ApiError {
    ApiError::localized(ErrorKind::NotFound, &state.localizer, &lang)
}

/// Answers handler panics with a 500 error body.
#[derive(Clone)]
struct PanicResponder {
    localizer: Arc<Localizer>,
}

impl ResponseForPanic for PanicResponder {
    type ResponseBody = Body;

    fn response_for_panic(&mut self, err: Box<dyn Any + Send + 'static>) -> HttpResponse<Body> {
        let detail = if let Some(s) = err.downcast_ref::<String>() {
            s.clone()
        } else if let Some(s) = err.downcast_ref::<&str>() {
            s.to_string()
        } else {
            "unknown panic".to_string()
        };
        error!(panic = %detail, "Request handler panicked");

        let lang = self.localizer.default_language().to_string();
        ApiError::localized(ErrorKind::InternalServerError, &self.localizer, &lang).into_response()
    }
}

/// HTTP server for the book system front.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// The fully layered router
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(addr: SocketAddr, router: Router) -> Self {
        Self { addr, router }
    }

    /// Start the HTTP server with graceful shutdown.
    ///
    /// The server stops accepting connections when `signal` resolves and
    /// returns once in-flight requests have finished.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve_on(listener, signal).await
    }

    /// Serve on an already bound listener.
    pub async fn serve_on<F>(self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        info!(addr = %listener.local_addr()?, "Starting HTTP server");

        axum::serve(
            listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server failed");
            AppError::Io(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::health::HealthState;
    use crate::http::middleware::TRACE_ID_HEADER;
    use crate::ratelimit::{Quota, RateLimiter};
    use axum::body::to_bytes;
    use axum::extract::ConnectInfo;
    use axum::Extension;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state(quota: Quota, trust_proxy: bool) -> AppState {
        AppState::new(
            Arc::new(RateLimiter::new(quota)),
            Arc::new(Localizer::builtin()),
            Arc::new(HealthState::new("test")),
            trust_proxy,
        )
    }

    fn test_api() -> Router<AppState> {
        Router::new()
            .route("/api/v1/books", get(|| async { "books" }))
            .route("/api/v1/panic", get(panicking_handler))
    }

    async fn panicking_handler() -> &'static str {
        panic!("boom")
    }

    fn app(state: AppState) -> Router {
        build_router(state, test_api()).layer(Extension(ConnectInfo(SocketAddr::from(([10, 0, 0, 1], 5555)))))
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_burst_then_429() {
        let app = app(test_state(Quota::new(5.0, 10), false));

        for i in 0..10 {
            let response = app.clone().oneshot(get_request("/api/v1/books")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "request {} should pass", i + 1);
        }

        let response = app.clone().oneshot(get_request("/api/v1/books")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(header::RETRY_AFTER));
        assert!(response.headers().contains_key(TRACE_ID_HEADER));

        let body = json_body(response).await;
        assert_eq!(body["code"], 429);
        assert_eq!(body["message"], "Too many requests, please try again later");
    }

    #[tokio::test]
    async fn test_refill_after_wait() {
        let app = app(test_state(Quota::new(20.0, 1), false));

        let response = app.clone().oneshot(get_request("/api/v1/books")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let response = app.clone().oneshot(get_request("/api/v1/books")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let response = app.clone().oneshot(get_request("/api/v1/books")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_localized_denial() {
        let app = app(test_state(Quota::new(1.0, 1), false));
        app.clone().oneshot(get_request("/api/v1/books")).await.unwrap();

        let request = Request::builder()
            .uri("/api/v1/books")
            .header(header::ACCEPT_LANGUAGE, "vi-VN,vi;q=0.9")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = json_body(response).await;
        assert_eq!(body["message"], "Quá nhiều yêu cầu, vui lòng thử lại sau");
    }

    #[tokio::test]
    async fn test_clients_limited_separately() {
        let state = test_state(Quota::new(1.0, 1), true);
        let app = app(state.clone());

        let from = |ip: &str| {
            Request::builder()
                .uri("/api/v1/books")
                .header("x-forwarded-for", ip)
                .body(Body::empty())
                .unwrap()
        };

        assert_eq!(app.clone().oneshot(from("203.0.113.1")).await.unwrap().status(), StatusCode::OK);
        assert_eq!(
            app.clone().oneshot(from("203.0.113.1")).await.unwrap().status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(app.clone().oneshot(from("203.0.113.2")).await.unwrap().status(), StatusCode::OK);
        assert_eq!(state.limiter.registry().len(), 2);
    }

    #[tokio::test]
    async fn test_health_endpoints_pass_through_limiter() {
        let state = test_state(Quota::new(5.0, 10), false);
        let app = app(state.clone());

        let response = app.clone().oneshot(get_request("/health/live")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "UP");
        assert_eq!(body["version"], "test");

        let response = app.clone().oneshot(get_request("/health/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert!(state.limiter.registry().contains("10.0.0.1"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_localized_404() {
        let app = app(test_state(Quota::new(5.0, 10), false));

        let request = Request::builder()
            .uri("/api/v1/nothing")
            .header(header::ACCEPT_LANGUAGE, "vi")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert_eq!(body["code"], 404);
        assert_eq!(body["message"], "Không tìm thấy tài nguyên được yêu cầu");
    }

    #[tokio::test]
    async fn test_panic_becomes_500() {
        let app = app(test_state(Quota::new(5.0, 10), false));

        let response = app.oneshot(get_request("/api/v1/panic")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["code"], 500);
        assert_eq!(body["message"], "Internal server error");
    }

    #[tokio::test]
    async fn test_serve_stops_on_signal() {
        let router = build_router(test_state(Quota::new(5.0, 10), false), Router::new());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            HttpServer::new(listener.local_addr().unwrap(), router).serve_on(listener, async {}),
        )
        .await
        .expect("server should stop once the signal resolves");
        assert!(result.is_ok());
    }
}
