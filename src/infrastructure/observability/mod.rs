//! Observability infrastructure - Tracing and Metrics

mod config;
mod metrics;
mod tracing_setup;

pub use config::{MetricsConfig, ObservabilityConfig, TracingConfig};
pub use metrics::{init_metrics, PrometheusMetrics};
pub use tracing_setup::{init_tracing, shutdown_tracing};
