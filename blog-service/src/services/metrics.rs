//! Prometheus metrics for blog-service.

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder. Call once at startup.
pub fn init_metrics() -> anyhow::Result<()> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    METRICS_HANDLE
        .set(handle)
        .map_err(|_| anyhow::anyhow!("metrics handle already initialized"))
}

pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// Count one `/generate` outcome.
pub fn record_generation(outcome: &'static str) {
    counter!("blog_generations_total", "outcome" => outcome).increment(1);
}

/// Count provider-reported token usage.
pub fn record_tokens(input_tokens: Option<u32>, output_tokens: Option<u32>) {
    if let Some(tokens) = input_tokens {
        counter!("blog_generation_tokens_total", "direction" => "input").increment(tokens.into());
    }
    if let Some(tokens) = output_tokens {
        counter!("blog_generation_tokens_total", "direction" => "output").increment(tokens.into());
    }
}
