use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EmissionError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Log unavailable: {0}")]
    Unavailable(String),
}

/// A keyed message bound for one topic.
#[derive(Debug, Clone, PartialEq)]
pub struct LogMessage {
    pub topic: String,
    pub key: String,
    /// JSON-encoded event.
    pub payload: String,
}

/// Where an appended message landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPosition {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
}

/// A stored log entry, as returned by the backends' read helpers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
    pub key: String,
    pub payload: String,
    pub appended_at_ms: i64,
}

/// Trait for keyed, partitioned append logs.
///
/// Implementations must place every message with the same key on the same
/// partition so that per-key ordering and compaction hold.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Backend name for logs and status.
    fn name(&self) -> &str;

    /// Append a message, returning its partition and offset.
    async fn append(&self, message: LogMessage) -> Result<LogPosition, EmissionError>;
}

/// Stable partition for a key: 32-bit FNV-1a modulo the partition count.
pub fn partition_for(key: &str, partitions: u32) -> u32 {
    const FNV_OFFSET: u32 = 0x811c_9dc5;
    const FNV_PRIME: u32 = 0x0100_0193;

    let hash = key.bytes().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ byte as u32).wrapping_mul(FNV_PRIME)
    });
    hash % partitions.max(1)
}
