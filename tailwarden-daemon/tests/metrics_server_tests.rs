//! Integration tests for the metrics exporter.

use tailwarden_core::config::MetricsConfig;
use tailwarden_daemon::metrics_server;
use serial_test::serial;

#[test]
#[serial]
fn test_install_metrics_recorder_succeeds_with_valid_config() {
    // Given: a valid metrics configuration on a non-standard port
    let config = MetricsConfig {
        enabled: true,
        listen_addr: "127.0.0.1".to_owned(),
        port: 19187,
    };

    // When: installing the recorder
    let result = metrics_server::install_metrics_recorder(&config);

    // Then: it succeeds and metrics can be recorded
    assert!(
        result.is_ok(),
        "install_metrics_recorder should succeed with valid config: {:?}",
        result.err()
    );
    metrics::counter!(tailwarden_core::metrics::LINES_ANALYZED_TOTAL).increment(1);
}

#[test]
#[serial]
fn test_install_metrics_recorder_fails_with_invalid_address() {
    let config = MetricsConfig {
        enabled: true,
        listen_addr: "999.999.999.999".to_owned(),
        port: 9187,
    };

    assert!(
        metrics_server::install_metrics_recorder(&config).is_err(),
        "install_metrics_recorder should fail with invalid address"
    );
}
