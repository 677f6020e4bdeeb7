//! Prometheus metrics definitions.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    HistogramVec, IntCounter, IntCounterVec, IntGauge,
};

/// 1 once the model is loaded, 0 before.
pub static MODEL_LOADED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "embedding_model_loaded",
        "Whether the embedding model has finished loading"
    )
    .unwrap()
});

/// Total texts encoded.
pub static TEXTS_EMBEDDED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("embedding_texts_total", "Total number of texts embedded").unwrap()
});

/// Request latency histogram.
pub static REQUEST_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "embedding_request_duration_seconds",
        "Request latency in seconds",
        &["endpoint", "method"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .unwrap()
});

/// Request counter.
pub static REQUEST_COUNT: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "embedding_requests_total",
        "Total number of requests",
        &["endpoint", "method", "status"]
    )
    .unwrap()
});

/// Initialize all metrics (call once at startup).
pub fn init_metrics() {
    let _ = &*MODEL_LOADED;
    let _ = &*TEXTS_EMBEDDED;
    let _ = &*REQUEST_LATENCY;
    let _ = &*REQUEST_COUNT;

    tracing::debug!("Prometheus metrics initialized");
}

/// Record a finished request.
pub fn observe_request(endpoint: &str, method: &str, status: u16, seconds: f64) {
    REQUEST_COUNT
        .with_label_values(&[endpoint, method, &status.to_string()])
        .inc();
    REQUEST_LATENCY
        .with_label_values(&[endpoint, method])
        .observe(seconds);
}
