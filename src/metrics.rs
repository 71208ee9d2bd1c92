use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, GaugeVec, Histogram, register_counter, register_counter_vec,
    register_gauge_vec, register_histogram,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("gateway_requests_total", "Total number of proxied API requests").unwrap();
    pub static ref ADMISSIONS_TOTAL: CounterVec = register_counter_vec!(
        "gateway_admissions_total",
        "Admission decisions by policy and outcome",
        &["policy", "outcome"]
    )
    .unwrap();
    pub static ref TRACKED_KEYS: GaugeVec = register_gauge_vec!(
        "gateway_tracked_keys",
        "Client keys currently held by each limiter",
        &["policy"]
    )
    .unwrap();
    pub static ref UPSTREAM_LATENCY: Histogram = register_histogram!(
        "gateway_upstream_latency_seconds",
        "Upstream round trip in seconds"
    )
    .unwrap();
}
