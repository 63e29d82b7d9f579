//! Scheduler configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the poll scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How long in-flight cycles may run after shutdown is requested
    /// (milliseconds). Fetches still outstanding afterwards are abandoned.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_ms: u64,
}

fn default_shutdown_grace() -> u64 {
    5000 // 5 seconds
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            shutdown_grace_ms: default_shutdown_grace(),
        }
    }
}
