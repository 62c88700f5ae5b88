//! Scan Loop
//!
//! One scan cycle is: enumerate the subnet, probe every address, collect
//! telemetry from every device that answered, dispatch the records to the
//! sinks. The loop repeats that on a fixed interval until the process exits.
//!
//! # States
//!
//! - `Idle` - waiting for the next interval tick
//! - `Scanning` - a cycle is in progress
//!
//! A cycle runs inline in the loop, so two cycles never overlap. Ticks that
//! fire while a cycle is still running are skipped, not queued.
//!
//! # Error Handling
//!
//! A cycle cannot fail. Every address ends up with exactly one
//! [`DeviceOutcome`] in the [`CycleReport`]: not found by the probe, or a
//! record with status ok / partial / unreachable.

use crate::collectors::{Collector, CollectorConfig};
use crate::config::Config;
use crate::metrics::MetricsCollector;
use crate::miner::DeviceRpcClient;
use crate::probe::{candidates, Candidate, ProbeConfig, Prober};
use crate::sinks::{SinkDispatcher, SinkResult};
use crate::subnet::SubnetDescriptor;
use crate::telemetry::{TelemetryRecord, TelemetryStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddrV4;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    Idle,
    Scanning,
}

/// What happened to one address during a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeviceOutcome {
    /// Nothing answered the probe.
    NotFound { reason: String },
    /// The probe answered; a record was produced with this status.
    Collected { status: TelemetryStatus },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressOutcome {
    pub address: SocketAddrV4,
    #[serde(flatten)]
    pub outcome: DeviceOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// One entry per candidate, sorted by address.
    pub outcomes: Vec<AddressOutcome>,
    pub records: Vec<TelemetryRecord>,
    pub sink_results: Vec<SinkResult>,
}

impl CycleReport {
    pub fn devices_found(&self) -> usize {
        self.records.len()
    }

    pub fn not_found(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, DeviceOutcome::NotFound { .. }))
            .count()
    }

    pub fn count(&self, status: TelemetryStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    pub fn failed_deliveries(&self) -> usize {
        self.sink_results.iter().filter(|r| !r.is_delivered()).count()
    }
}

/// Read-only settings for the lifetime of a scanner.
#[derive(Debug, Clone)]
pub struct ScannerSettings {
    pub subnet: SubnetDescriptor,
    pub port: u16,
    pub interval: Duration,
    pub concurrency: usize,
    pub probe_timeout: Duration,
    pub collect_stats: bool,
    pub resolve_mac: bool,
}

impl ScannerSettings {
    /// Validates `config` and extracts the scanner settings.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let subnet = config.validate()?;
        Ok(Self {
            subnet,
            port: config.scanner.port,
            interval: config.scanner.scan_interval(),
            concurrency: config.scanner.concurrency,
            probe_timeout: config.scanner.probe_timeout(),
            collect_stats: config.scanner.collect_stats,
            resolve_mac: config.scanner.resolve_mac,
        })
    }
}

pub struct Scanner {
    settings: ScannerSettings,
    prober: Prober,
    collector: Collector,
    dispatcher: SinkDispatcher,
    metrics: MetricsCollector,
    state: watch::Sender<ScanState>,
}

impl Scanner {
    pub fn new(
        settings: ScannerSettings,
        client: DeviceRpcClient,
        dispatcher: SinkDispatcher,
        metrics: MetricsCollector,
    ) -> Self {
        let prober = Prober::new(
            &client,
            ProbeConfig {
                timeout: settings.probe_timeout,
                concurrency: settings.concurrency,
            },
        );
        let collector = Collector::new(
            client,
            CollectorConfig {
                concurrency: settings.concurrency,
                collect_stats: settings.collect_stats,
                resolve_mac: settings.resolve_mac,
            },
        );
        let (state, _) = watch::channel(ScanState::Idle);

        Self {
            settings,
            prober,
            collector,
            dispatcher,
            metrics,
            state,
        }
    }

    pub fn settings(&self) -> &ScannerSettings {
        &self.settings
    }

    pub fn state(&self) -> ScanState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScanState> {
        self.state.subscribe()
    }

    /// Runs cycles forever, one per interval tick.
    pub async fn run(&self) {
        info!(
            "Scanning {} every {}s (port {}, {} workers)",
            self.settings.subnet,
            self.settings.interval.as_secs(),
            self.settings.port,
            self.settings.concurrency
        );

        let mut ticker = interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.run_cycle().await;
        }
    }

    /// One full cycle over the configured subnet.
    pub async fn run_cycle(&self) -> CycleReport {
        let candidates = candidates(self.settings.subnet.hosts(), self.settings.port);
        self.scan_candidates(candidates).await
    }

    /// One full cycle over an explicit candidate list.
    pub async fn scan_candidates(&self, mut candidates: Vec<Candidate>) -> CycleReport {
        let started_at = Utc::now();
        let started = Instant::now();
        self.set_state(ScanState::Scanning);

        candidates.sort();
        candidates.dedup();

        let probe = self.prober.probe_all(candidates).await;
        let records = self.collector.collect_all(&probe.reachable).await;

        self.metrics.reset_devices();
        let sink_results = self
            .dispatcher
            .dispatch_all(&records, self.settings.concurrency)
            .await;

        let statuses: HashMap<SocketAddrV4, TelemetryStatus> = records
            .iter()
            .map(|r| (r.socket_addr(), r.status))
            .collect();

        let mut outcomes: Vec<AddressOutcome> = probe
            .unreachable
            .iter()
            .map(|(addr, e)| AddressOutcome {
                address: *addr,
                outcome: DeviceOutcome::NotFound {
                    reason: e.to_string(),
                },
            })
            .chain(probe.reachable.iter().map(|handle| AddressOutcome {
                address: handle.addr,
                outcome: DeviceOutcome::Collected {
                    status: statuses
                        .get(&handle.addr)
                        .copied()
                        .unwrap_or(TelemetryStatus::Unreachable),
                },
            }))
            .collect();
        outcomes.sort_by_key(|o| o.address);

        let report = CycleReport {
            started_at,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            outcomes,
            records,
            sink_results,
        };

        self.record_cycle(&report, probe.total());
        self.set_state(ScanState::Idle);

        info!(
            "Scan cycle finished in {}ms: {} addresses, {} devices ({} ok, {} partial, {} unreachable), {} failed deliveries",
            report.duration_ms,
            report.outcomes.len(),
            report.devices_found(),
            report.count(TelemetryStatus::Ok),
            report.count(TelemetryStatus::Partial),
            report.count(TelemetryStatus::Unreachable),
            report.failed_deliveries(),
        );

        report
    }

    fn set_state(&self, state: ScanState) {
        self.state.send_replace(state);
        self.metrics
            .scan_in_progress
            .set(i64::from(state == ScanState::Scanning));
    }

    fn record_cycle(&self, report: &CycleReport, probed: usize) {
        let m = &self.metrics;
        m.scan_cycles_total.inc();
        m.scan_cycle_duration_seconds
            .set(report.duration_ms as f64 / 1000.0);
        m.candidates_probed
            .set(i64::try_from(probed).unwrap_or(i64::MAX));
        m.devices_found
            .set(i64::try_from(report.devices_found()).unwrap_or(i64::MAX));
        for status in [
            TelemetryStatus::Ok,
            TelemetryStatus::Partial,
            TelemetryStatus::Unreachable,
        ] {
            m.devices_by_status
                .with_label_values(&[status.as_str()])
                .set(i64::try_from(report.count(status)).unwrap_or(i64::MAX));
        }
        m.up.set(if report.devices_found() > 0 { 1.0 } else { 0.0 });
    }
}
