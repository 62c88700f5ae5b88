//! Telemetry Sinks
//!
//! A sink is anything that accepts a [`TelemetryRecord`]. The dispatcher hands
//! every record to every configured sink and records one [`SinkResult`] per
//! sink, so a down endpoint or a full disk only ever affects its own result.
//!
//! # Sinks
//!
//! - [`storage::FileStore`] - appends JSON lines to a local file
//! - [`push::RemotePush`] - HTTP POST with a bearer token
//! - [`metrics::PrometheusSink`] - updates the `/metrics` gauges
//!
//! Nothing is retried or buffered across cycles. A failed delivery is logged,
//! counted and dropped.

use crate::config::SinksConfig;
use crate::error::Result;
use crate::metrics::MetricsCollector;
use crate::telemetry::TelemetryRecord;
use crate::workers::run_bounded;
use async_trait::async_trait;
use futures_util::future::join_all;
use futures_util::FutureExt;
use serde::Serialize;
use std::net::Ipv4Addr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub mod metrics;
pub mod push;
pub mod storage;

pub use self::metrics::PrometheusSink;
pub use push::RemotePush;
pub use storage::FileStore;

/// A delivery target for telemetry records.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Stable name used in logs, metrics and [`SinkResult`]s.
    fn name(&self) -> &str;

    async fn deliver(&self, record: &TelemetryRecord) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum DeliveryOutcome {
    Delivered,
    Failed { reason: String },
}

/// Outcome of delivering one record to one sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkResult {
    pub sink: String,
    pub address: Ipv4Addr,
    #[serde(flatten)]
    pub outcome: DeliveryOutcome,
}

impl SinkResult {
    pub fn is_delivered(&self) -> bool {
        self.outcome == DeliveryOutcome::Delivered
    }
}

pub struct SinkDispatcher {
    sinks: Vec<Arc<dyn Sink>>,
    metrics: Option<MetricsCollector>,
}

impl SinkDispatcher {
    pub fn new(sinks: Vec<Arc<dyn Sink>>) -> Self {
        Self {
            sinks,
            metrics: None,
        }
    }

    /// Count deliveries in `asic_sink_deliveries_total`.
    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Builds the enabled sinks. The Prometheus sink is always present.
    pub fn from_config(config: &SinksConfig, metrics: &MetricsCollector) -> Result<Self> {
        let mut sinks: Vec<Arc<dyn Sink>> = vec![Arc::new(PrometheusSink::new(metrics.clone()))];

        if config.storage.enabled {
            sinks.push(Arc::new(FileStore::new(&config.storage.path)));
        }
        if config.push.enabled {
            sinks.push(Arc::new(RemotePush::new(&config.push)?));
        }

        info!(
            "Configured sinks: {}",
            sinks.iter().map(|s| s.name()).collect::<Vec<_>>().join(", ")
        );
        Ok(Self::new(sinks).with_metrics(metrics.clone()))
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Delivers `record` to every sink concurrently.
    ///
    /// Returns one result per sink, in sink order. A sink that errors or
    /// panics yields a `Failed` result and nothing else.
    pub async fn dispatch(&self, record: &TelemetryRecord) -> Vec<SinkResult> {
        let deliveries = self.sinks.iter().map(|sink| async move {
            let outcome = match AssertUnwindSafe(sink.deliver(record)).catch_unwind().await {
                Ok(Ok(())) => {
                    debug!("Delivered {} to {}", record.address, sink.name());
                    DeliveryOutcome::Delivered
                }
                Ok(Err(e)) => {
                    warn!("Sink {} failed for {}: {}", sink.name(), record.address, e);
                    DeliveryOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
                Err(_) => {
                    warn!("Sink {} panicked for {}", sink.name(), record.address);
                    DeliveryOutcome::Failed {
                        reason: "sink panicked".to_string(),
                    }
                }
            };
            SinkResult {
                sink: sink.name().to_string(),
                address: record.address,
                outcome,
            }
        });

        let results = join_all(deliveries).await;

        if let Some(metrics) = &self.metrics {
            for result in &results {
                let label = if result.is_delivered() { "delivered" } else { "failed" };
                metrics
                    .sink_deliveries_total
                    .with_label_values(&[result.sink.as_str(), label])
                    .inc();
            }
        }

        results
    }

    /// Dispatches every record, at most `concurrency` records at a time.
    pub async fn dispatch_all(
        &self,
        records: &[TelemetryRecord],
        concurrency: usize,
    ) -> Vec<SinkResult> {
        run_bounded(records.iter().cloned(), concurrency, |record| async move {
            self.dispatch(&record).await
        })
        .await
        .into_iter()
        .flatten()
        .collect()
    }
}
