//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{
    Gauge, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry,
};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("deepwiki_http_requests_total", "Total number of HTTP requests"),
        &["method", "endpoint", "status"]
    ).expect("metric can be created");
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "deepwiki_http_request_duration_seconds",
            "HTTP request duration in seconds"
        ).buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method", "endpoint"]
    ).expect("metric can be created");

    // Remote Data Service Metrics
    pub static ref REMOTE_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("deepwiki_remote_requests_total", "Total number of remote data service requests"),
        &["operation", "table", "outcome"]
    ).expect("metric can be created");
    pub static ref REMOTE_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "deepwiki_remote_request_duration_seconds",
            "Remote data service request duration in seconds"
        ).buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["operation", "table"]
    ).expect("metric can be created");
    pub static ref INVALID_ROWS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("deepwiki_invalid_rows_total", "Rows skipped because they failed validation"),
        &["table"]
    ).expect("metric can be created");

    // Browse Metrics
    pub static ref BROWSE_QUERIES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("deepwiki_browse_queries_total", "Total number of browse page queries"),
        &["sort", "outcome"]
    ).expect("metric can be created");
    pub static ref STALE_RESPONSES_TOTAL: IntCounter = IntCounter::new(
        "deepwiki_stale_responses_total",
        "Page responses discarded because a newer query was issued"
    ).expect("metric can be created");
    pub static ref DEBOUNCED_SEARCHES_TOTAL: IntCounter = IntCounter::new(
        "deepwiki_debounced_searches_total",
        "Search keystrokes superseded within the quiet period"
    ).expect("metric can be created");

    // Counter Metrics
    pub static ref COUNTER_RETRIES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("deepwiki_counter_retries_total", "Atomic counter increments retried"),
        &["column"]
    ).expect("metric can be created");
    pub static ref COUNTER_ROLLBACKS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("deepwiki_counter_rollbacks_total", "Counter updates abandoned after all retries"),
        &["column"]
    ).expect("metric can be created");

    // Favorites Metrics
    pub static ref FAVORITES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("deepwiki_favorites_total", "Favorite additions and removals"),
        &["action", "post_type"]
    ).expect("metric can be created");

    // Cache Metrics
    pub static ref CACHE_HITS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("deepwiki_cache_hits_total", "Total number of cache hits"),
        &["cache_name"]
    ).expect("metric can be created");
    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("deepwiki_cache_misses_total", "Total number of cache misses"),
        &["cache_name"]
    ).expect("metric can be created");
    pub static ref CACHE_SIZE: IntGaugeVec = IntGaugeVec::new(
        Opts::new("deepwiki_cache_size", "Current number of items in cache"),
        &["cache_name"]
    ).expect("metric can be created");

    // Application Metrics
    pub static ref APP_UPTIME_SECONDS: Gauge = Gauge::new(
        "deepwiki_app_uptime_seconds",
        "Application uptime in seconds"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("deepwiki_errors_total", "Total number of errors"),
        &["error_type", "endpoint"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
            .expect("HTTP_REQUESTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
            .expect("HTTP_REQUEST_DURATION_SECONDS can be registered");
        REGISTRY
            .register(Box::new(REMOTE_REQUESTS_TOTAL.clone()))
            .expect("REMOTE_REQUESTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(REMOTE_REQUEST_DURATION_SECONDS.clone()))
            .expect("REMOTE_REQUEST_DURATION_SECONDS can be registered");
        REGISTRY
            .register(Box::new(INVALID_ROWS_TOTAL.clone()))
            .expect("INVALID_ROWS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(BROWSE_QUERIES_TOTAL.clone()))
            .expect("BROWSE_QUERIES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(STALE_RESPONSES_TOTAL.clone()))
            .expect("STALE_RESPONSES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(DEBOUNCED_SEARCHES_TOTAL.clone()))
            .expect("DEBOUNCED_SEARCHES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(COUNTER_RETRIES_TOTAL.clone()))
            .expect("COUNTER_RETRIES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(COUNTER_ROLLBACKS_TOTAL.clone()))
            .expect("COUNTER_ROLLBACKS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(FAVORITES_TOTAL.clone()))
            .expect("FAVORITES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(CACHE_HITS_TOTAL.clone()))
            .expect("CACHE_HITS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(CACHE_MISSES_TOTAL.clone()))
            .expect("CACHE_MISSES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(CACHE_SIZE.clone()))
            .expect("CACHE_SIZE can be registered");
        REGISTRY
            .register(Box::new(APP_UPTIME_SECONDS.clone()))
            .expect("APP_UPTIME_SECONDS can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}
