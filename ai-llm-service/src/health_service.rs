//! Boot-time reachability checks for the configured profiles.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::llm_model_config::LlmModelConfig;

/// Result of probing one profile endpoint.
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub model: String,
    pub endpoint: String,
    pub reachable: bool,
    pub latency_ms: u64,
}

/// Probes each distinct config with a short GET against its base endpoint.
///
/// A failed probe is reported, not fatal: providers may still come up after
/// the workers start.
pub async fn check_many(configs: &[LlmModelConfig], timeout_secs: u64) -> Vec<HealthStatus> {
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "health client build failed");
            return Vec::new();
        }
    };

    let mut out = Vec::with_capacity(configs.len());
    for cfg in configs {
        let started = Instant::now();
        let reachable = match client.get(&cfg.endpoint).send().await {
            Ok(_) => true,
            Err(e) => {
                warn!(endpoint = %cfg.endpoint, error = %e, "health probe failed");
                false
            }
        };
        let status = HealthStatus {
            model: cfg.model.clone(),
            endpoint: cfg.endpoint.clone(),
            reachable,
            latency_ms: started.elapsed().as_millis() as u64,
        };
        debug!(?status, "health probe");
        out.push(status);
    }
    out
}
