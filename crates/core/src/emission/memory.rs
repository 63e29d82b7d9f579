//! In-process compacted log.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use super::{partition_for, EmissionError, EventLog, LogEntry, LogMessage, LogPosition};

/// Ordered per-topic/partition log held in memory.
///
/// Nothing survives a restart. Useful for tests and for running without
/// a database file.
pub struct MemoryEventLog {
    partitions: u32,
    /// topic -> partitions -> entries in offset order
    topics: Mutex<HashMap<String, Vec<Vec<LogEntry>>>>,
}

impl MemoryEventLog {
    pub fn new(partitions: u32) -> Self {
        Self {
            partitions: partitions.max(1),
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// Every entry on a topic, partition by partition in offset order.
    pub fn entries(&self, topic: &str) -> Vec<LogEntry> {
        let topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        topics
            .get(topic)
            .map(|partitions| partitions.iter().flatten().cloned().collect())
            .unwrap_or_default()
    }

    /// Latest entry per key, ordered by key.
    pub fn compacted(&self, topic: &str) -> Vec<LogEntry> {
        let mut latest: HashMap<String, LogEntry> = HashMap::new();
        for entry in self.entries(topic) {
            // Entries for one key share a partition, so offset order is append order
            latest.insert(entry.key.clone(), entry);
        }
        let mut view: Vec<LogEntry> = latest.into_values().collect();
        view.sort_by(|a, b| a.key.cmp(&b.key));
        view
    }
}

#[async_trait]
impl EventLog for MemoryEventLog {
    fn name(&self) -> &str {
        "memory"
    }

    async fn append(&self, message: LogMessage) -> Result<LogPosition, EmissionError> {
        let partition = partition_for(&message.key, self.partitions);
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        let partitions = topics
            .entry(message.topic.clone())
            .or_insert_with(|| vec![Vec::new(); self.partitions as usize]);
        let entries = &mut partitions[partition as usize];
        let offset = entries.len() as u64;

        entries.push(LogEntry {
            topic: message.topic.clone(),
            partition,
            offset,
            key: message.key,
            payload: message.payload,
            appended_at_ms: Utc::now().timestamp_millis(),
        });

        Ok(LogPosition {
            topic: message.topic,
            partition,
            offset,
        })
    }
}
