use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec,
    IntCounter, IntCounterVec,
};

lazy_static! {
    /// Aggregation requests by policy and outcome (ok, invalid_parameter, store_unavailable, not_found).
    pub static ref AGGREGATOR_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "aggregator_requests_total",
        "Aggregation requests segmented by policy and outcome",
        &["policy", "outcome"]
    )
    .expect("failed to register aggregator_requests_total");

    /// End-to-end pipeline latency, selection through assembly.
    pub static ref AGGREGATOR_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "aggregator_request_duration_seconds",
        "Aggregation pipeline duration segmented by policy",
        &["policy"]
    )
    .expect("failed to register aggregator_request_duration_seconds");

    /// Candidate-set size after selection and truncation.
    pub static ref AGGREGATOR_CANDIDATES: HistogramVec = register_histogram_vec!(
        "aggregator_candidates",
        "Number of ranked candidates handed to fan-out segmented by policy",
        &["policy"],
        vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0]
    )
    .expect("failed to register aggregator_candidates");

    /// Ranked ids dropped because the content store had no record.
    pub static ref AGGREGATOR_FANOUT_DROPPED_TOTAL: IntCounter = register_int_counter!(
        "aggregator_fanout_dropped_total",
        "Ranked identifiers dropped during fan-out for missing content"
    )
    .expect("failed to register aggregator_fanout_dropped_total");

    /// Store call failures after deadline, retry and breaker.
    pub static ref AGGREGATOR_STORE_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "aggregator_store_errors_total",
        "Store call failures segmented by store and error kind",
        &["store", "kind"]
    )
    .expect("failed to register aggregator_store_errors_total");
}
