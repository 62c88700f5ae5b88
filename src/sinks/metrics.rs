//! Prometheus Sink
//!
//! Publishes each record to the device gauges served on `/metrics`.
//!
//! # Metrics Produced
//! - `asic_device_up` - 1 unless the record is `unreachable`
//!   - Labels: address
//! - `asic_device_hashrate_ghs` - average and 5s hash rate
//!   - Labels: address, worker, window
//! - `asic_device_temperature_celsius` - one series per sensor, numbered from 1
//!   - Labels: address, sensor
//! - `asic_device_fan_rpm` - one series per fan, numbered from 1
//!   - Labels: address, fan
//! - `asic_device_shares` - accepted/rejected/hardware_errors
//!   - Labels: address, type
//! - `asic_device_elapsed_seconds`
//!   - Labels: address

use super::Sink;
use crate::error::Result;
use crate::metrics::MetricsCollector;
use crate::telemetry::{TelemetryRecord, TelemetryStatus};
use async_trait::async_trait;

pub struct PrometheusSink {
    metrics: MetricsCollector,
}

impl PrometheusSink {
    pub fn new(metrics: MetricsCollector) -> Self {
        Self { metrics }
    }

    fn publish(&self, record: &TelemetryRecord) {
        let m = &self.metrics;
        let address = record.address.to_string();
        let address = address.as_str();

        m.set_bool_metric(
            &m.device_up,
            &[address],
            record.status != TelemetryStatus::Unreachable,
        );

        let worker = record.worker.as_deref().unwrap_or("");
        if let Some(ghs) = record.hashrate_ghs {
            m.set_gauge(&m.device_hashrate_ghs, &[address, worker, "avg"], ghs);
        }
        if let Some(ghs) = record.hashrate_5s_ghs {
            m.set_gauge(&m.device_hashrate_ghs, &[address, worker, "5s"], ghs);
        }

        for (i, temp) in record.temperatures.iter().flatten().enumerate() {
            let sensor = (i + 1).to_string();
            m.set_gauge(&m.device_temperature_celsius, &[address, &sensor], *temp);
        }
        if let Some(max) = record.temperature_max {
            m.set_gauge(&m.device_temperature_celsius, &[address, "max"], max);
        }

        for (i, rpm) in record.fans.iter().flatten().enumerate() {
            let fan = (i + 1).to_string();
            m.set_gauge(&m.device_fan_rpm, &[address, &fan], f64::from(*rpm));
        }

        let counters = [
            ("accepted", record.accepted),
            ("rejected", record.rejected),
            ("hardware_errors", record.hardware_errors),
        ];
        for (kind, value) in counters {
            if let Some(value) = value {
                m.set_gauge(&m.device_shares, &[address, kind], value as f64);
            }
        }

        if let Some(elapsed) = record.elapsed_seconds {
            m.set_gauge(&m.device_elapsed_seconds, &[address], elapsed as f64);
        }
    }
}

#[async_trait]
impl Sink for PrometheusSink {
    fn name(&self) -> &str {
        "prometheus"
    }

    async fn deliver(&self, record: &TelemetryRecord) -> Result<()> {
        self.publish(record);
        Ok(())
    }
}
