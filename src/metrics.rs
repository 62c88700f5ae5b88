//! Prometheus Metrics Definitions
//!
//! This module defines all Prometheus metrics exposed by the scanner.
//!
//! # Metric Categories
//!
//! ## Scan Cycle
//! - Cycle count, duration and state
//! - Candidates probed, devices found, records by status
//!
//! ## Devices
//! - Online flag, hash rate, temperatures, fans, share counters, uptime
//! - Device series are cleared before each cycle's records are published, so a miner that
//!   disappears stops being reported instead of freezing at its last value
//!
//! ## Sinks
//! - Delivery outcomes per sink
//!
//! All metrics use the `asic_` namespace prefix.

use prometheus::{
    Encoder, Gauge, GaugeVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

const NAMESPACE: &str = "asic";

/// Metrics collector for the scanner
#[derive(Clone)]
pub struct MetricsCollector {
    registry: Arc<Registry>,

    // Scan cycle metrics
    pub up: Arc<Gauge>,
    pub scan_cycles_total: Arc<IntCounter>,
    pub scan_cycle_duration_seconds: Arc<Gauge>,
    pub scan_in_progress: Arc<IntGauge>,
    pub candidates_probed: Arc<IntGauge>,
    pub devices_found: Arc<IntGauge>,
    pub devices_by_status: Arc<IntGaugeVec>,

    // Device metrics
    pub device_up: Arc<GaugeVec>,
    pub device_hashrate_ghs: Arc<GaugeVec>,
    pub device_temperature_celsius: Arc<GaugeVec>,
    pub device_fan_rpm: Arc<GaugeVec>,
    pub device_shares: Arc<GaugeVec>,
    pub device_elapsed_seconds: Arc<GaugeVec>,

    // Sink metrics
    pub sink_deliveries_total: Arc<IntCounterVec>,
}

impl MetricsCollector {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Scan cycle metrics
        let up = Gauge::with_opts(
            Opts::new(
                "up",
                "Whether the last scan cycle found at least one device (1=yes, 0=no)",
            )
            .namespace(NAMESPACE),
        )?;

        let scan_cycles_total = IntCounter::with_opts(
            Opts::new("scan_cycles_total", "Number of completed scan cycles").namespace(NAMESPACE),
        )?;

        let scan_cycle_duration_seconds = Gauge::with_opts(
            Opts::new(
                "scan_cycle_duration_seconds",
                "Wall time of the last completed scan cycle",
            )
            .namespace(NAMESPACE),
        )?;

        let scan_in_progress = IntGauge::with_opts(
            Opts::new(
                "scan_in_progress",
                "Scan loop state (1=scanning, 0=idle)",
            )
            .namespace(NAMESPACE),
        )?;

        let candidates_probed = IntGauge::with_opts(
            Opts::new(
                "candidates_probed",
                "Addresses probed during the last scan cycle",
            )
            .namespace(NAMESPACE),
        )?;

        let devices_found = IntGauge::with_opts(
            Opts::new(
                "devices_found",
                "Devices that answered the probe during the last scan cycle",
            )
            .namespace(NAMESPACE),
        )?;

        let devices_by_status = IntGaugeVec::new(
            Opts::new(
                "devices_by_status",
                "Telemetry records of the last cycle by status (ok/partial/unreachable)",
            )
            .namespace(NAMESPACE),
            &["status"],
        )?;

        // Device metrics
        let device_up = GaugeVec::new(
            Opts::new(
                "device_up",
                "Device answered at least one core command (1=online, 0=vanished)",
            )
            .namespace(NAMESPACE),
            &["address"],
        )?;

        let device_hashrate_ghs = GaugeVec::new(
            Opts::new("device_hashrate_ghs", "Hash rate in GH/s by averaging window")
                .namespace(NAMESPACE),
            &["address", "worker", "window"],
        )?;

        let device_temperature_celsius = GaugeVec::new(
            Opts::new(
                "device_temperature_celsius",
                "Temperature sensor reading in Celsius",
            )
            .namespace(NAMESPACE),
            &["address", "sensor"],
        )?;

        let device_fan_rpm = GaugeVec::new(
            Opts::new("device_fan_rpm", "Fan speed in RPM").namespace(NAMESPACE),
            &["address", "fan"],
        )?;

        let device_shares = GaugeVec::new(
            Opts::new(
                "device_shares",
                "Cumulative share counters as reported by the device (accepted/rejected/hardware_errors)",
            )
            .namespace(NAMESPACE),
            &["address", "type"],
        )?;

        let device_elapsed_seconds = GaugeVec::new(
            Opts::new(
                "device_elapsed_seconds",
                "Seconds since the mining process started",
            )
            .namespace(NAMESPACE),
            &["address"],
        )?;

        // Sink metrics
        let sink_deliveries_total = IntCounterVec::new(
            Opts::new(
                "sink_deliveries_total",
                "Telemetry deliveries by sink and result (delivered/failed)",
            )
            .namespace(NAMESPACE),
            &["sink", "result"],
        )?;

        // Register all metrics
        registry.register(Box::new(up.clone()))?;
        registry.register(Box::new(scan_cycles_total.clone()))?;
        registry.register(Box::new(scan_cycle_duration_seconds.clone()))?;
        registry.register(Box::new(scan_in_progress.clone()))?;
        registry.register(Box::new(candidates_probed.clone()))?;
        registry.register(Box::new(devices_found.clone()))?;
        registry.register(Box::new(devices_by_status.clone()))?;
        registry.register(Box::new(device_up.clone()))?;
        registry.register(Box::new(device_hashrate_ghs.clone()))?;
        registry.register(Box::new(device_temperature_celsius.clone()))?;
        registry.register(Box::new(device_fan_rpm.clone()))?;
        registry.register(Box::new(device_shares.clone()))?;
        registry.register(Box::new(device_elapsed_seconds.clone()))?;
        registry.register(Box::new(sink_deliveries_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            up: Arc::new(up),
            scan_cycles_total: Arc::new(scan_cycles_total),
            scan_cycle_duration_seconds: Arc::new(scan_cycle_duration_seconds),
            scan_in_progress: Arc::new(scan_in_progress),
            candidates_probed: Arc::new(candidates_probed),
            devices_found: Arc::new(devices_found),
            devices_by_status: Arc::new(devices_by_status),
            device_up: Arc::new(device_up),
            device_hashrate_ghs: Arc::new(device_hashrate_ghs),
            device_temperature_celsius: Arc::new(device_temperature_celsius),
            device_fan_rpm: Arc::new(device_fan_rpm),
            device_shares: Arc::new(device_shares),
            device_elapsed_seconds: Arc::new(device_elapsed_seconds),
            sink_deliveries_total: Arc::new(sink_deliveries_total),
        })
    }

    /// Set a labelled gauge
    pub fn set_gauge(&self, gauge: &GaugeVec, labels: &[&str], value: f64) {
        gauge.with_label_values(labels).set(value);
    }

    /// Set a labelled gauge to 1 or 0
    pub fn set_bool_metric(&self, gauge: &GaugeVec, labels: &[&str], value: bool) {
        self.set_gauge(gauge, labels, if value { 1.0 } else { 0.0 });
    }

    /// Render metrics in Prometheus text format
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Drop every per-device series (called before a cycle's records are dispatched)
    pub fn reset_devices(&self) {
        self.device_up.reset();
        self.device_hashrate_ghs.reset();
        self.device_temperature_celsius.reset();
        self.device_fan_rpm.reset();
        self.device_shares.reset();
        self.device_elapsed_seconds.reset();
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics collector")
    }
}
