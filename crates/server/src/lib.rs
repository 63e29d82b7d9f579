//! HTTP surface and process wiring for the orbitwatch poller.

pub mod api;
pub mod metrics;
pub mod state;

use std::sync::Arc;

use orbitwatch_core::config::EmissionConfig;
use orbitwatch_core::{EmissionError, EventLog, LogBackend, MemoryEventLog, SqliteEventLog};

/// Open the event log selected by the emission config.
pub fn create_event_log(config: &EmissionConfig) -> Result<Arc<dyn EventLog>, EmissionError> {
    let log: Arc<dyn EventLog> = match config.backend {
        LogBackend::Memory => Arc::new(MemoryEventLog::new(config.partitions)),
        LogBackend::Sqlite => Arc::new(SqliteEventLog::new(&config.path, config.partitions)?),
    };
    Ok(log)
}
