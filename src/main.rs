use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

use bookgate::config::AppConfig;
use bookgate::http::{build_router, AppState, HealthState, HttpServer};
use bookgate::i18n::Localizer;
use bookgate::logging;
use bookgate::ratelimit::{RateLimiter, Sweeper};

#[derive(Parser)]
#[command(name = "bookgate", about = "Rate limiting HTTP front for the book system")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Listen address override
    #[arg(short, long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config)?;
    if let Some(listen) = cli.listen {
        config.server.http_addr = listen;
    }

    logging::init(&config.logging)?;

    info!("Starting Bookgate");
    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        production = config.is_production(),
        "Configuration loaded"
    );

    let localizer = Arc::new(Localizer::from_config(&config.i18n)?);

    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limiter.quota()));
    info!(
        rate = config.rate_limiter.rate,
        burst = config.rate_limiter.burst,
        trust_proxy = config.rate_limiter.trust_proxy,
        "Rate limiter initialized"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = Sweeper::new(
        Arc::clone(rate_limiter.registry()),
        config.rate_limiter.sweep_interval(),
        config.rate_limiter.idle_timeout(),
    )
    .spawn(shutdown_rx);

    let health = Arc::new(HealthState::from_config(&config.health));
    let state = AppState::new(
        rate_limiter,
        localizer,
        health,
        config.rate_limiter.trust_proxy,
    );

    // Book, user, auth and upload routes are served downstream.
    let router = build_router(state, Router::new());
    let server = HttpServer::new(config.server.http_addr, router);

    let served = server.serve_with_shutdown(shutdown_signal()).await;

    // Stop the sweeper whether or not the server exited cleanly.
    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper.await {
        warn!(error = %e, "Limiter sweeper ended abnormally");
    }

    served?;
    info!("Bookgate stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
