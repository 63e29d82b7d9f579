//! Mock emission sink for testing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::emission::{EmissionReceipt, EmissionSink};
use crate::telemetry::CanonicalRecord;

/// Records every dispatch synchronously, without a runtime or a log.
#[derive(Debug, Default)]
pub struct MockEmissionSink {
    dispatched: Mutex<Vec<(CanonicalRecord, String)>>,
    next_id: AtomicU64,
}

impl MockEmissionSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatched records with the source label they were observed from.
    pub fn dispatched(&self) -> Vec<(CanonicalRecord, String)> {
        self.dispatched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn dispatch_count(&self) -> usize {
        self.dispatched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl EmissionSink for MockEmissionSink {
    fn dispatch(&self, record: &CanonicalRecord, source: &str) -> EmissionReceipt {
        self.dispatched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((record.clone(), source.to_string()));

        EmissionReceipt {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            kind: record.kind(),
            topic: format!("mock-{}", record.kind()),
            key: record.log_key(),
        }
    }
}
