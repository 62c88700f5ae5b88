//! Scan cycle tests
//!
//! Full probe → collect → dispatch cycles against simulated devices.

#![recursion_limit = "256"]

mod common;

use asic_scanner::metrics::MetricsCollector;
use asic_scanner::scanner::{DeviceOutcome, ScanState, Scanner, ScannerSettings};
use asic_scanner::sinks::{FileStore, PrometheusSink, SinkDispatcher};
use asic_scanner::subnet::SubnetDescriptor;
use asic_scanner::telemetry::TelemetryStatus;
use common::*;
use std::net::SocketAddrV4;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn settings(subnet: &str, port: u16, interval: Duration) -> ScannerSettings {
    ScannerSettings {
        subnet: SubnetDescriptor::parse(subnet).unwrap(),
        port,
        interval,
        concurrency: 8,
        probe_timeout: Duration::from_millis(300),
        collect_stats: true,
        resolve_mac: false,
    }
}

fn scanner(settings: ScannerSettings, store: &Path, metrics: &MetricsCollector) -> Scanner {
    let dispatcher = SinkDispatcher::new(vec![
        Arc::new(PrometheusSink::new(metrics.clone())),
        Arc::new(FileStore::new(store)),
    ])
    .with_metrics(metrics.clone());
    Scanner::new(settings, test_client(500), dispatcher, metrics.clone())
}

#[tokio::test]
async fn test_cycle_reports_every_candidate_once() {
    // Given: Three live devices, one broken device and two dead addresses
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("telemetry.jsonl");
    let metrics = MetricsCollector::new().unwrap();

    let mut live = Vec::new();
    for i in 0..3 {
        live.push(spawn_antminer(1_000.0 * f64::from(i + 1)).await);
    }
    let broken = spawn_device(|request| match request.command.as_str() {
        "summary" => Reply::Json(summary_reply(10.0, 10.0)),
        _ => Reply::Raw(b"oops".to_vec()),
    })
    .await;
    let dead = vec![refused_addr().await, refused_addr().await];

    let mut candidates: Vec<SocketAddrV4> = live.clone();
    candidates.push(broken);
    candidates.extend(dead.iter().copied());

    let scanner = scanner(settings("127.0.0.1/32", 4028, Duration::from_secs(30)), &store, &metrics);

    // When: Running one cycle over them
    let report = scanner.scan_candidates(candidates.clone()).await;

    // Then: One outcome per distinct candidate, sorted
    let mut expected = candidates.clone();
    expected.sort();
    expected.dedup();
    let addresses: Vec<SocketAddrV4> = report.outcomes.iter().map(|o| o.address).collect();
    assert_eq!(addresses, expected);

    // And: Live devices are ok, the broken one partial, the dead ones not found
    for outcome in &report.outcomes {
        let expected_outcome = if live.contains(&outcome.address) {
            Some(TelemetryStatus::Ok)
        } else if outcome.address == broken {
            Some(TelemetryStatus::Partial)
        } else {
            None
        };
        match (&outcome.outcome, expected_outcome) {
            (DeviceOutcome::Collected { status }, Some(expected)) => assert_eq!(*status, expected),
            (DeviceOutcome::NotFound { reason }, None) => assert!(!reason.is_empty()),
            (other, expected) => panic!("{}: got {:?}, expected {:?}", outcome.address, other, expected),
        }
    }

    // And: Every record reached every sink
    assert_eq!(report.devices_found(), 4);
    assert_eq!(report.sink_results.len(), 8);
    assert_eq!(report.failed_deliveries(), 0);
    assert_eq!(FileStore::load(&store).await.unwrap().len(), 4);

    // And: The cycle metrics reflect it
    assert_eq!(metrics.scan_cycles_total.get(), 1);
    assert_eq!(metrics.devices_found.get(), 4);
    assert_eq!(metrics.devices_by_status.with_label_values(&["ok"]).get(), 3);
    assert_eq!(metrics.devices_by_status.with_label_values(&["partial"]).get(), 1);
    assert_eq!(metrics.up.get(), 1.0);
    assert_eq!(scanner.state(), ScanState::Idle);
    assert_eq!(metrics.scan_in_progress.get(), 0);
}

#[tokio::test]
async fn test_run_cycle_enumerates_configured_subnet() {
    // Given: A device on loopback and a /32 subnet pointing at it
    let dir = TempDir::new().unwrap();
    let metrics = MetricsCollector::new().unwrap();
    let device = spawn_antminer(500.0).await;
    let scanner = scanner(
        settings("127.0.0.1/32", device.port(), Duration::from_secs(30)),
        &dir.path().join("t.jsonl"),
        &metrics,
    );

    // When: Running a configured cycle
    let report = scanner.run_cycle().await;

    // Then: The single host was scanned and found
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].address, device);
    assert_eq!(
        report.outcomes[0].outcome,
        DeviceOutcome::Collected {
            status: TelemetryStatus::Ok
        }
    );
}

#[tokio::test]
async fn test_empty_cycle_reports_down() {
    let dir = TempDir::new().unwrap();
    let metrics = MetricsCollector::new().unwrap();
    let scanner = scanner(
        settings("127.0.0.1/32", 4028, Duration::from_secs(30)),
        &dir.path().join("t.jsonl"),
        &metrics,
    );

    let report = scanner.scan_candidates(vec![refused_addr().await]).await;

    assert_eq!(report.devices_found(), 0);
    assert_eq!(report.not_found(), 1);
    assert_eq!(metrics.up.get(), 0.0);
}

#[tokio::test]
async fn test_vanished_device_series_are_dropped() {
    // Given: A device seen in one cycle
    let dir = TempDir::new().unwrap();
    let metrics = MetricsCollector::new().unwrap();
    let device = spawn_antminer(700.0).await;
    let scanner = scanner(
        settings("127.0.0.1/32", 4028, Duration::from_secs(30)),
        &dir.path().join("t.jsonl"),
        &metrics,
    );
    scanner.scan_candidates(vec![device]).await;
    assert!(metrics.render().unwrap().contains("asic_device_up{"));

    // When: The next cycle no longer includes it
    scanner.scan_candidates(Vec::new()).await;

    // Then: Its gauges are gone rather than frozen
    let rendered = metrics.render().unwrap();
    assert!(!rendered.contains("asic_device_up{"));
    assert!(!rendered.contains("asic_device_hashrate_ghs{"));
}

#[tokio::test]
async fn test_report_serializes_outcomes() {
    let dir = TempDir::new().unwrap();
    let metrics = MetricsCollector::new().unwrap();
    let device = spawn_antminer(700.0).await;
    let scanner = scanner(
        settings("127.0.0.1/32", 4028, Duration::from_secs(30)),
        &dir.path().join("t.jsonl"),
        &metrics,
    );

    let report = scanner.scan_candidates(vec![device]).await;
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["outcomes"][0]["address"], device.to_string());
    assert_eq!(json["outcomes"][0]["outcome"], "collected");
    assert_eq!(json["outcomes"][0]["status"], "ok");
    assert_eq!(json["records"][0]["model"], "Antminer S19j Pro");
    assert_eq!(json["sink_results"][0]["result"], "delivered");
}

#[tokio::test]
async fn test_loop_runs_cycles_on_interval() {
    // Given: A scanner with a short interval
    let dir = TempDir::new().unwrap();
    let metrics = MetricsCollector::new().unwrap();
    let device = spawn_antminer(100.0).await;
    let scanner = Arc::new(scanner(
        settings("127.0.0.1/32", device.port(), Duration::from_millis(100)),
        &dir.path().join("t.jsonl"),
        &metrics,
    ));
    let mut state = scanner.subscribe();

    // When: The loop runs for a while
    let running = Arc::clone(&scanner);
    let task = tokio::spawn(async move { running.run().await });
    tokio::time::timeout(Duration::from_secs(2), state.changed())
        .await
        .expect("no state change")
        .unwrap();
    tokio::time::sleep(Duration::from_millis(450)).await;
    task.abort();

    // Then: Several cycles completed, none overlapping
    assert!(metrics.scan_cycles_total.get() >= 2);
    assert!(metrics.scan_in_progress.get() <= 1);
}
