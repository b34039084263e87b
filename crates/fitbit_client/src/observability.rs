//! Metric names shared by the client and the sync service.

/// Counter, labelled `outcome` (`success`, a failure class or `network_error`).
pub const API_REQUESTS_TOTAL: &str = "fitbit_api_requests_total";
/// Counter, labelled `reason`.
pub const API_RETRIES_TOTAL: &str = "fitbit_api_retries_total";
/// Gauge of points waiting for the next flush.
pub const POINTS_BUFFERED: &str = "fitbit_points_buffered";
pub const POINTS_WRITTEN_TOTAL: &str = "fitbit_points_written_total";
pub const POINTS_DROPPED_TOTAL: &str = "fitbit_points_dropped_total";
pub const SINK_FAILURES_TOTAL: &str = "fitbit_sink_failures_total";
/// Counter, labelled `metric` and `outcome` (`recorded` or `failed`).
pub const FETCHES_TOTAL: &str = "fitbit_fetches_total";

/// Register descriptions with the installed recorder.
pub fn describe_metrics() {
    metrics::describe_counter!(API_REQUESTS_TOTAL, "Fitbit API attempts by outcome");
    metrics::describe_counter!(API_RETRIES_TOTAL, "Fitbit API retries by reason");
    metrics::describe_gauge!(POINTS_BUFFERED, "Points held in the buffer");
    metrics::describe_counter!(POINTS_WRITTEN_TOTAL, "Points written to the sink");
    metrics::describe_counter!(
        POINTS_DROPPED_TOTAL,
        "Points discarded because the buffer cap was reached"
    );
    metrics::describe_counter!(SINK_FAILURES_TOTAL, "Failed sink writes");
    metrics::describe_counter!(FETCHES_TOTAL, "Metric fetches by outcome");
}
