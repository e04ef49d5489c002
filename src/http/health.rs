//! Health endpoints and dependency probes.
//!
//! `/health` reports every dependency, `/health/live` only that the process
//! answers, and `/health/ready` fails with 503 when a dependency is down.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tracing::warn;

use super::state::AppState;
use crate::config::HealthConfig;

const SERVICE_NAME: &str = "book_system";

/// A downstream dependency whose reachability is reported by health checks.
#[async_trait]
pub trait DependencyProbe: Send + Sync {
    /// Name shown in the health details.
    fn name(&self) -> &str;

    /// Check the dependency, returning a description of the failure.
    async fn check(&self) -> std::result::Result<(), String>;
}

/// Probe that succeeds when a TCP connection can be opened.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    name: String,
    address: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(name: impl Into<String>, address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            timeout,
        }
    }
}

#[async_trait]
impl DependencyProbe for TcpProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> std::result::Result<(), String> {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("connection timed out after {:?}", self.timeout)),
        }
    }
}

/// Overall or per-dependency status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Up,
    Degraded,
    Down,
}

/// Result of probing one dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckDetail {
    pub status: HealthStatus,
    pub latency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of every health endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    pub status: HealthStatus,
    pub timestamp: String,
    pub service: String,
    pub version: String,
    pub uptime: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, CheckDetail>,
}

/// Process metadata and registered probes.
pub struct HealthState {
    version: String,
    started_at: Instant,
    probes: Vec<Arc<dyn DependencyProbe>>,
}

impl HealthState {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            started_at: Instant::now(),
            probes: Vec::new(),
        }
    }

    /// Build from configuration, with a TCP probe per configured dependency.
    pub fn from_config(config: &HealthConfig) -> Self {
        config.dependencies.iter().fold(Self::new(&config.version), |state, dep| {
            state.with_probe(Arc::new(TcpProbe::new(
                &dep.name,
                &dep.address,
                Duration::from_millis(dep.timeout_ms),
            )))
        })
    }

    pub fn with_probe(mut self, probe: Arc<dyn DependencyProbe>) -> Self {
        self.probes.push(probe);
        self
    }

    async fn probe_all(&self) -> BTreeMap<String, CheckDetail> {
        let checks = self.probes.iter().map(|probe| async move {
            let started = Instant::now();
            let result = probe.check().await;
            let latency = format!("{:?}", started.elapsed());

            let detail = match result {
                Ok(()) => CheckDetail {
                    status: HealthStatus::Up,
                    latency,
                    error: None,
                },
                Err(error) => {
                    warn!(dependency = %probe.name(), error = %error, "Dependency check failed");
                    CheckDetail {
                        status: HealthStatus::Down,
                        latency,
                        error: Some(error),
                    }
                }
            };
            (probe.name().to_string(), detail)
        });

        join_all(checks).await.into_iter().collect()
    }

    fn report(&self, status: HealthStatus, details: BTreeMap<String, CheckDetail>) -> HealthCheckResponse {
        HealthCheckResponse {
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
            service: SERVICE_NAME.to_string(),
            version: self.version.clone(),
            uptime: format_uptime(self.started_at.elapsed()),
            details,
        }
    }

    /// Full report; a failing dependency degrades the service.
    pub async fn check(&self) -> HealthCheckResponse {
        let details = self.probe_all().await;
        let status = if details.values().any(|d| d.status != HealthStatus::Up) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Up
        };
        self.report(status, details)
    }

    /// Liveness; dependencies are not consulted.
    pub fn liveness(&self) -> HealthCheckResponse {
        self.report(HealthStatus::Up, BTreeMap::new())
    }

    /// Readiness; a failing dependency makes the service unready.
    pub async fn readiness(&self) -> HealthCheckResponse {
        let details = self.probe_all().await;
        let status = if details.values().any(|d| d.status != HealthStatus::Up) {
            HealthStatus::Down
        } else {
            HealthStatus::Up
        };
        self.report(status, details)
    }
}

fn format_uptime(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);

    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

pub async fn health(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    Json(state.health.check().await)
}

pub async fn live(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    Json(state.health.liveness())
}

pub async fn ready(State(state): State<AppState>) -> Response {
    let report = state.health.readiness().await;
    let code = if report.status == HealthStatus::Up {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(report)).into_response()
}
