//! Metric names and descriptions.
//!
//! Every Prometheus metric name is defined here once. Crates record through
//! the `metrics` facade macros using these constants:
//!
//! ```ignore
//! metrics::counter!(tailwarden_core::metrics::LINES_ANALYZED_TOTAL).increment(1);
//! ```
//!
//! # Naming
//!
//! - prefix: `tailwarden_`
//! - suffix: `_total` (counter), `_seconds` (histogram), none (gauge)

// ─── label keys ──────────────────────────────────────────────────────

/// Severity label key (low, medium, high, critical)
pub const LABEL_SEVERITY: &str = "severity";

/// Pattern category label key (database, memory, ...)
pub const LABEL_CATEGORY: &str = "category";

/// Delivery endpoint label key (primary, fallback)
pub const LABEL_ENDPOINT: &str = "endpoint";

/// Outcome label key (success, failure)
pub const LABEL_RESULT: &str = "result";

/// Source kind label key (file, directory, docker, journal, eventlog)
pub const LABEL_SOURCE_KIND: &str = "source_kind";

// ─── analysis ────────────────────────────────────────────────────────

/// Lines handed to an analyzer (counter)
pub const LINES_ANALYZED_TOTAL: &str = "tailwarden_lines_analyzed_total";

/// Lines suppressed by a dedup cache (counter)
pub const LINES_SUPPRESSED_TOTAL: &str = "tailwarden_lines_suppressed_total";

/// Incidents produced (counter, labels: severity, category)
pub const INCIDENTS_DETECTED_TOTAL: &str = "tailwarden_incidents_detected_total";

// ─── delivery ────────────────────────────────────────────────────────

/// Delivery attempts (counter, labels: endpoint, result)
pub const DELIVERIES_TOTAL: &str = "tailwarden_deliveries_total";

/// Time spent delivering one incident, both attempts included (histogram, seconds)
pub const DELIVERY_DURATION_SECONDS: &str = "tailwarden_delivery_duration_seconds";

// ─── watchers ────────────────────────────────────────────────────────

/// Recoverable watcher errors (counter, label: source_kind)
pub const WATCHER_ERRORS_TOTAL: &str = "tailwarden_watcher_errors_total";

/// Watcher tasks currently running (gauge)
pub const ACTIVE_WATCHERS: &str = "tailwarden_active_watchers";

// ─── buckets ─────────────────────────────────────────────────────────

/// Delivery latency buckets (seconds), 10ms up to two full timeouts
pub const DELIVERY_DURATION_BUCKETS: [f64; 8] = [0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 20.0];

/// Registers HELP text for every metric.
///
/// Call once, after the global recorder has been installed.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        LINES_ANALYZED_TOTAL,
        "Total number of log lines handed to an analyzer"
    );
    describe_counter!(
        LINES_SUPPRESSED_TOTAL,
        "Total number of log lines suppressed as repeats"
    );
    describe_counter!(
        INCIDENTS_DETECTED_TOTAL,
        "Total number of incidents detected, by severity and category"
    );
    describe_counter!(
        DELIVERIES_TOTAL,
        "Total number of delivery attempts, by endpoint and result"
    );
    describe_histogram!(
        DELIVERY_DURATION_SECONDS,
        "Time to deliver one incident including fallback, in seconds"
    );
    describe_counter!(
        WATCHER_ERRORS_TOTAL,
        "Total number of recoverable watcher errors, by source kind"
    );
    describe_gauge!(ACTIVE_WATCHERS, "Number of watcher tasks currently running");
}
