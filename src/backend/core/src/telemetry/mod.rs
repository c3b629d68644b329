//! Telemetry: structured logging and Prometheus metrics.
//!
//! - **Logging**: JSON/pretty/compact `tracing` output with per-module levels
//! - **Metrics**: request durations, cache effectiveness, audit pipeline health

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, redact_url, LogFormat, LoggingConfig, SpanEventConfig};
pub use metrics::{
    init_metrics, CacheMetrics, MetricsConfig, MetricsRegistry, PipelineMetrics,
    RequestDurationHistogram,
};

/// Initialize logging and metrics together.
///
/// Logging comes first so metric initialization is itself logged.
pub fn init_telemetry(
    logging: &LoggingConfig,
    metrics: &MetricsConfig,
    environment: &str,
) -> anyhow::Result<MetricsRegistry> {
    init_logging(logging, environment)?;
    init_metrics(metrics, env!("CARGO_PKG_NAME"))
}
