//! Keyed event emission to compacted append logs.
//!
//! The [`EmissionGateway`] turns a changed record into a keyed JSON message
//! and queues it for the [`EmissionMonitor`], which appends queued messages
//! one at a time and records each outcome. Callers get a receipt back
//! immediately; the outcome only feeds logs and metrics.

mod events;
mod gateway;
mod memory;
mod monitor;
mod sqlite;
mod types;

pub use events::*;
pub use gateway::*;
pub use memory::MemoryEventLog;
pub use monitor::*;
pub use sqlite::SqliteEventLog;
pub use types::*;
