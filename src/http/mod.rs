//! HTTP front: router, middleware and health endpoints.

mod client;
mod health;
mod middleware;
mod response;
mod server;
mod state;

pub use client::{client_key, request_language, Lang, UNKNOWN_CLIENT};
pub use health::{
    CheckDetail, DependencyProbe, HealthCheckResponse, HealthState, HealthStatus, TcpProbe,
};
pub use middleware::{rate_limit, trace_requests, TraceId, TRACE_ID_HEADER};
pub use response::{ApiError, ErrorKind};
pub use server::{build_router, HttpServer};
pub use state::AppState;
