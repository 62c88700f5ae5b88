use asic_scanner::metrics::MetricsCollector;

#[test]
fn test_metrics_registration() {
    // Verify that all metrics can be created and registered without panicking
    let metrics = MetricsCollector::new().expect("Failed to create metrics collector");

    // Test that we can render metrics (even if empty)
    let rendered = metrics.render();
    assert!(rendered.is_ok(), "Failed to render metrics");

    // Scalar metrics always appear; vectors only once a series is set
    let output = rendered.unwrap();
    for name in [
        "asic_up",
        "asic_scan_cycles_total",
        "asic_scan_cycle_duration_seconds",
        "asic_scan_in_progress",
        "asic_candidates_probed",
        "asic_devices_found",
    ] {
        assert!(output.contains(name), "Missing {} metric", name);
    }
    assert!(!output.contains("asic_asic_"), "Double namespace prefix");
}

#[test]
fn test_metrics_update() {
    let metrics = MetricsCollector::new().expect("Failed to create metrics collector");

    metrics.up.set(1.0);
    metrics.scan_cycles_total.inc();
    metrics
        .devices_by_status
        .with_label_values(&["partial"])
        .set(2);
    metrics.set_gauge(
        &metrics.device_temperature_celsius,
        &["192.168.2.40", "1"],
        71.5,
    );

    let rendered = metrics.render().unwrap();
    assert!(rendered.contains("asic_up 1"), "up metric not set correctly");
    assert!(rendered.contains("asic_scan_cycles_total 1"));
    assert!(rendered.contains(r#"asic_devices_by_status{status="partial"} 2"#));
    assert!(rendered.contains(
        r#"asic_device_temperature_celsius{address="192.168.2.40",sensor="1"} 71.5"#
    ));
}

#[test]
fn test_bool_metric() {
    let metrics = MetricsCollector::new().unwrap();

    metrics.set_bool_metric(&metrics.device_up, &["10.0.0.1"], true);
    metrics.set_bool_metric(&metrics.device_up, &["10.0.0.2"], false);

    assert_eq!(metrics.device_up.with_label_values(&["10.0.0.1"]).get(), 1.0);
    assert_eq!(metrics.device_up.with_label_values(&["10.0.0.2"]).get(), 0.0);
}

#[test]
fn test_metrics_reset_devices() {
    let metrics = MetricsCollector::new().expect("Failed to create metrics collector");

    // Set device and cycle values
    metrics.set_gauge(&metrics.device_fan_rpm, &["10.0.0.1", "1"], 5_400.0);
    metrics.scan_cycles_total.inc();
    metrics
        .sink_deliveries_total
        .with_label_values(&["storage", "delivered"])
        .inc();

    // Reset should clear device series only
    metrics.reset_devices();

    let rendered = metrics.render().expect("Failed to render after reset");
    assert!(!rendered.contains("asic_device_fan_rpm{"));
    assert!(rendered.contains("asic_scan_cycles_total 1"));
    assert!(rendered.contains(r#"asic_sink_deliveries_total{result="delivered",sink="storage"} 1"#));
}
