//! Metric names and descriptions for the consumption loop.
//!
//! Recording goes through the `metrics` facade; installing an exporter is left
//! to the host process.

use metrics::{describe_counter, describe_histogram};

/// Events reduced and committed
pub const EVENTS_APPLIED: &str = "projection_events_applied_total";
/// Events at or below the watermark
pub const EVENTS_SKIPPED: &str = "projection_events_skipped_total";
/// Events outside the projection's subscriptions
pub const EVENTS_IGNORED: &str = "projection_events_ignored_total";
/// Failed commit attempts
pub const EXECUTION_FAILURES: &str = "projection_execution_failures_total";
/// Time spent committing one batch
pub const COMMIT_DURATION: &str = "projection_commit_duration_seconds";

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        EVENTS_APPLIED,
        "Total number of events reduced and committed to a projection"
    );
    describe_counter!(
        EVENTS_SKIPPED,
        "Total number of redelivered events skipped by the sequence watermark"
    );
    describe_counter!(
        EVENTS_IGNORED,
        "Total number of events a projection does not react to"
    );
    describe_counter!(
        EXECUTION_FAILURES,
        "Total number of statement batches that failed to commit"
    );
    describe_histogram!(
        COMMIT_DURATION,
        metrics::Unit::Seconds,
        "Time taken to commit a statement batch and its watermark"
    );
}
