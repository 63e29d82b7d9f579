//! Mock event log for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::emission::{EmissionError, EventLog, LogEntry, LogMessage, LogPosition, MemoryEventLog};

/// Mock implementation of the EventLog trait.
///
/// Appends to an in-memory log, and can be told to fail or stall.
pub struct MockEventLog {
    inner: MemoryEventLog,
    /// Every message offered to the log, including failed ones.
    attempts: Arc<RwLock<Vec<LogMessage>>>,
    /// If set, the next append will fail with this error.
    next_error: Arc<RwLock<Option<EmissionError>>>,
    /// If set, every append fails with this error.
    persistent_error: Arc<RwLock<Option<EmissionError>>>,
    /// Simulated append latency.
    delay: Arc<RwLock<Duration>>,
}

impl Default for MockEventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEventLog {
    /// Create a mock log with three partitions per topic.
    pub fn new() -> Self {
        Self {
            inner: MemoryEventLog::new(3),
            attempts: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            persistent_error: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(Duration::ZERO)),
        }
    }

    /// Make the next append fail.
    pub async fn set_next_error(&self, error: EmissionError) {
        *self.next_error.write().await = Some(error);
    }

    /// Make every append fail until cleared with `None`.
    pub async fn set_persistent_error(&self, error: Option<EmissionError>) {
        *self.persistent_error.write().await = error;
    }

    /// Add latency to every append.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    /// Messages offered to the log, in arrival order.
    pub async fn attempts(&self) -> Vec<LogMessage> {
        self.attempts.read().await.clone()
    }

    /// Successfully appended entries on a topic.
    pub fn entries(&self, topic: &str) -> Vec<LogEntry> {
        self.inner.entries(topic)
    }

    /// Latest appended entry per key on a topic.
    pub fn compacted(&self, topic: &str) -> Vec<LogEntry> {
        self.inner.compacted(topic)
    }
}

#[async_trait]
impl EventLog for MockEventLog {
    fn name(&self) -> &str {
        "mock"
    }

    async fn append(&self, message: LogMessage) -> Result<LogPosition, EmissionError> {
        self.attempts.write().await.push(message.clone());

        let delay = *self.delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        if let Some(error) = self.persistent_error.read().await.clone() {
            return Err(error);
        }
        self.inner.append(message).await
    }
}
