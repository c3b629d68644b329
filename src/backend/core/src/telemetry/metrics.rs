//! Prometheus metrics for requests, the cache and the audit pipeline.
//!
//! Metric names are kept in one place so dashboards and the code agree:
//!
//! - Request duration histograms with configurable buckets
//! - Cache hit/miss/invalidation counters
//! - Audit publish and sink flush counters, pending-batch gauge
//!
//! # Example
//!
//! ```rust,no_run
//! use goods_core::telemetry::metrics::{PipelineMetrics, RequestDurationHistogram};
//!
//! RequestDurationHistogram::record("GET", "/goods/list", 200, 0.004);
//! PipelineMetrics::flushed(100, 0);
//! ```

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Deserialize;
use std::collections::HashMap;

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Whether metrics collection is enabled
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,

    /// Histogram buckets for request durations (in seconds)
    #[serde(default = "default_duration_buckets")]
    pub duration_buckets: Vec<f64>,

    /// Labels added to every metric
    #[serde(default)]
    pub global_labels: HashMap<String, String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            duration_buckets: default_duration_buckets(),
            global_labels: HashMap::new(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_duration_buckets() -> Vec<f64> {
    vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
}

/// Handle used by the `/metrics` endpoint.
#[derive(Clone, Default)]
pub struct MetricsRegistry {
    prometheus_handle: Option<PrometheusHandle>,
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("prometheus_handle", &self.prometheus_handle.is_some())
            .finish()
    }
}

impl MetricsRegistry {
    /// A registry that renders nothing (metrics disabled, tests).
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.prometheus_handle.is_some()
    }

    /// Render all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.prometheus_handle
            .as_ref()
            .map(|h| h.render())
            .unwrap_or_default()
    }
}

/// Initialize the metrics subsystem.
///
/// Installs the global Prometheus recorder. Returns a disabled registry when
/// `config.enabled` is false.
pub fn init_metrics(config: &MetricsConfig, service_name: &str) -> anyhow::Result<MetricsRegistry> {
    if !config.enabled {
        return Ok(MetricsRegistry::disabled());
    }

    let mut builder = PrometheusBuilder::new();

    for (key, value) in &config.global_labels {
        builder = builder.add_global_label(key, value);
    }

    builder = builder.set_buckets(&config.duration_buckets)?;

    let handle = builder.install_recorder()?;

    register_metric_descriptions();

    tracing::info!(service_name = %service_name, "Metrics initialized");

    Ok(MetricsRegistry {
        prometheus_handle: Some(handle),
    })
}

/// Register all metric descriptions.
fn register_metric_descriptions() {
    // Request metrics
    describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_counter!("http_requests_total", "Total number of HTTP requests");

    // Errors
    describe_counter!("goods_errors_total", "Errors raised, by code and category");

    // Cache
    describe_counter!("goods_cache_hits_total", "Reads served from the cache");
    describe_counter!("goods_cache_misses_total", "Reads that fell through to the store");
    describe_counter!(
        "goods_cache_invalidations_total",
        "Cache entries deleted after a mutation"
    );

    // Reordering
    describe_counter!(
        "goods_reprioritize_conflicts_total",
        "Serialization conflicts hit while reprioritizing"
    );

    // Audit pipeline
    describe_counter!("goods_audit_published_total", "Audit events handed to the bus");
    describe_counter!(
        "goods_audit_publish_failures_total",
        "Audit events the bus refused"
    );
    describe_counter!("goods_sink_flushes_total", "Successful sink flushes");
    describe_counter!(
        "goods_sink_events_written_total",
        "Audit events durably written to the sink"
    );
    describe_counter!(
        "goods_sink_events_skipped_total",
        "Audit events dropped because their payload could not be encoded"
    );
    describe_counter!("goods_sink_flush_failures_total", "Sink flushes that failed to commit");
    describe_gauge!("goods_sink_pending_events", "Audit events waiting in the batch");
}

/// Request duration histogram for HTTP requests.
pub struct RequestDurationHistogram;

impl RequestDurationHistogram {
    /// Record a request duration.
    pub fn record(method: &str, path: &str, status_code: u16, duration_seconds: f64) {
        histogram!(
            "http_request_duration_seconds",
            "method" => method.to_string(),
            "path" => path.to_string(),
            "status_code" => status_code.to_string(),
        )
        .record(duration_seconds);

        counter!(
            "http_requests_total",
            "method" => method.to_string(),
            "path" => path.to_string(),
            "status_code" => status_code.to_string(),
        )
        .increment(1);
    }
}

/// Counters for the cache policy.
pub struct CacheMetrics;

impl CacheMetrics {
    pub fn hit() {
        counter!("goods_cache_hits_total").increment(1);
    }

    pub fn miss() {
        counter!("goods_cache_misses_total").increment(1);
    }

    pub fn invalidated(count: usize) {
        counter!("goods_cache_invalidations_total").increment(count as u64);
    }
}

/// Counters for the audit producer, the reorder engine and the sink writer.
pub struct PipelineMetrics;

impl PipelineMetrics {
    pub fn published(action: &str) {
        counter!("goods_audit_published_total", "action" => action.to_string()).increment(1);
    }

    pub fn publish_failed(action: &str) {
        counter!("goods_audit_publish_failures_total", "action" => action.to_string())
            .increment(1);
    }

    pub fn reprioritize_conflict() {
        counter!("goods_reprioritize_conflicts_total").increment(1);
    }

    /// A flush committed `written` rows and dropped `skipped` unencodable ones.
    pub fn flushed(written: usize, skipped: usize) {
        counter!("goods_sink_flushes_total").increment(1);
        counter!("goods_sink_events_written_total").increment(written as u64);
        if skipped > 0 {
            counter!("goods_sink_events_skipped_total").increment(skipped as u64);
        }
    }

    pub fn flush_failed() {
        counter!("goods_sink_flush_failures_total").increment(1);
    }

    pub fn pending(count: usize) {
        gauge!("goods_sink_pending_events").set(count as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_config_defaults() {
        let config = MetricsConfig::default();
        assert!(config.enabled);
        assert!(!config.duration_buckets.is_empty());
    }

    #[test]
    fn test_disabled_registry_renders_empty() {
        let registry = MetricsRegistry::disabled();
        assert!(!registry.is_enabled());
        assert_eq!(registry.render(), "");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        RequestDurationHistogram::record("GET", "/goods/list", 200, 0.01);
        CacheMetrics::hit();
        PipelineMetrics::flushed(3, 1);
        PipelineMetrics::pending(0);
    }
}
