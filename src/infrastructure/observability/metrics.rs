//! Prometheus metrics for a single provisioning run
//!
//! A batch job has no scrape endpoint, so the rendered exposition text is
//! written to a file at exit for a textfile collector to pick up.

use std::path::Path;

use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use super::config::MetricsConfig;
use crate::domain::DomainError;
use crate::infrastructure::output::write_text;

#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: PrometheusHandle,
}

impl PrometheusMetrics {
    pub fn render(&self) -> String {
        self.handle.render()
    }

    pub async fn write_textfile(&self, path: &Path) -> Result<(), DomainError> {
        write_text(path, &self.render()).await?;
        tracing::info!(path = %path.display(), "Metrics written");
        Ok(())
    }
}

/// Install the global Prometheus recorder
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::info!("Prometheus metrics disabled");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            register_default_metrics();
            tracing::debug!("Prometheus metrics recorder installed");
            Some(PrometheusMetrics { handle })
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize Prometheus metrics");
            None
        }
    }
}

fn register_default_metrics() {
    gauge!("kb_provisioner_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}
