use std::sync::Arc;

use sha2::{Digest, Sha256};

use orbitwatch_core::emission::{EmissionStats, EmissionStatsSnapshot};
use orbitwatch_core::{ChangeDetector, Config, PollScheduler, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    scheduler: Arc<PollScheduler>,
    emission_stats: Arc<EmissionStats>,
    log_backend: String,
    config_hash: String,
}

impl AppState {
    pub fn new(
        config: Config,
        scheduler: Arc<PollScheduler>,
        emission_stats: Arc<EmissionStats>,
        log_backend: impl Into<String>,
    ) -> Self {
        Self {
            config_hash: config_hash(&config),
            config,
            scheduler,
            emission_stats,
            log_backend: log_backend.into(),
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn scheduler(&self) -> &Arc<PollScheduler> {
        &self.scheduler
    }

    pub fn detector(&self) -> &Arc<ChangeDetector> {
        self.scheduler.detector()
    }

    pub fn emission_stats(&self) -> EmissionStatsSnapshot {
        self.emission_stats.snapshot()
    }

    /// Name of the event log backing the emission gateway.
    pub fn log_backend(&self) -> &str {
        &self.log_backend
    }

    /// Short digest of the loaded configuration.
    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }
}

/// First 16 hex chars of the SHA-256 of the serialized config.
pub fn config_hash(config: &Config) -> String {
    let config_json = serde_json::to_string(config).unwrap_or_default();
    let digest = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    digest[..16].to_string()
}
