//! HTTP Server and Scan Loop
//!
//! This module wires the scanner together and serves its observability surface.
//!
//! # Architecture
//!
//! - **HTTP Server**: Axum-based server exposing `/metrics`, `/health`, and `/` endpoints
//! - **Scan Loop**: Background task running [`Scanner::run`] on the configured interval
//! - **State Management**: Shared state (metrics, scan state) cloned into every handler
//!
//! # Endpoints
//!
//! - `GET /` - HTML landing page with links to metrics and health
//! - `GET /metrics` - Prometheus metrics in text format
//! - `GET /health` - Health check (returns 200 if the last cycle found a device, 503 otherwise)
//!
//! # Error Handling
//!
//! Configuration problems are fatal here, before anything is spawned. Once the
//! loop is running, device and sink failures are logged by the scanner and
//! never reach this module.

use crate::config::Config;
use crate::metrics::MetricsCollector;
use crate::miner::DeviceRpcClient;
use crate::scanner::{ScanState, Scanner, ScannerSettings};
use crate::sinks::SinkDispatcher;
use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    metrics: MetricsCollector,
    scan_state: watch::Receiver<ScanState>,
}

impl AppState {
    pub fn new(metrics: MetricsCollector, scan_state: watch::Receiver<ScanState>) -> Self {
        Self {
            metrics,
            scan_state,
        }
    }
}

/// Builds the scanner described by `config`.
///
/// Fails if the configuration does not validate or a sink cannot be built.
pub fn build_scanner(config: &Config, metrics: &MetricsCollector) -> anyhow::Result<Scanner> {
    let settings = ScannerSettings::from_config(config)?;
    let client = DeviceRpcClient::new(&config.rpc);
    let dispatcher = SinkDispatcher::from_config(&config.sinks, metrics)
        .context("Failed to configure sinks")?;

    Ok(Scanner::new(settings, client, dispatcher, metrics.clone()))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

pub async fn start(config: Config) -> anyhow::Result<()> {
    let metrics = MetricsCollector::new()?;
    let scanner = Arc::new(build_scanner(&config, &metrics)?);

    let state = AppState::new(metrics, scanner.subscribe());

    // Start background scanning
    tokio::spawn(async move {
        scanner.run().await;
    });

    // Start the server
    let addr = format!("{}:{}", config.server.addr, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Metrics server listening on {}", addr);
    info!("Metrics available at http://{}/metrics", addr);

    axum::serve(listener, router(state)).await?;

    Ok(())
}

async fn root_handler() -> impl IntoResponse {
    r#"<html>
<head><title>ASIC Scanner</title></head>
<body>
<h1>ASIC Miner Scanner</h1>
<p><a href="/metrics">Metrics</a></p>
<p><a href="/health">Health</a></p>
</body>
</html>"#
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(metrics) => metrics.into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error rendering metrics: {}", e),
            )
                .into_response()
        }
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let up_value = state.metrics.up.get();
    let scanning = *state.scan_state.borrow() == ScanState::Scanning;

    if up_value > 0.0 {
        (StatusCode::OK, "OK")
    } else if scanning && state.metrics.scan_cycles_total.get() == 0 {
        (StatusCode::SERVICE_UNAVAILABLE, "First scan in progress")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "No devices found in last scan")
    }
}
