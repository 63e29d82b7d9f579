use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc;

use crate::metrics;

use super::{EmissionOutcome, EventLog, PendingEmission};

/// Running totals of publish attempts.
#[derive(Debug, Default)]
pub struct EmissionStats {
    dispatched: AtomicU64,
    published: AtomicU64,
    failed: AtomicU64,
    last_error: Mutex<Option<String>>,
}

/// Point-in-time copy of [`EmissionStats`].
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct EmissionStatsSnapshot {
    pub dispatched: u64,
    pub published: u64,
    pub failed: u64,
    pub last_error: Option<String>,
}

impl EmissionStats {
    pub(crate) fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self, error: String) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    pub fn snapshot(&self) -> EmissionStatsSnapshot {
        EmissionStatsSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            last_error: self
                .last_error
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }
}

/// Background task that appends queued messages to the log and records
/// each outcome.
///
/// Appends run one at a time in queue order. Outcomes never flow back into
/// change detection.
pub struct EmissionMonitor {
    log: Arc<dyn EventLog>,
    rx: mpsc::Receiver<PendingEmission>,
    stats: Arc<EmissionStats>,
}

impl EmissionMonitor {
    pub fn new(
        log: Arc<dyn EventLog>,
        rx: mpsc::Receiver<PendingEmission>,
        stats: Arc<EmissionStats>,
    ) -> Self {
        Self { log, rx, stats }
    }

    /// Run the monitor, draining the queue until every gateway clone is dropped
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        tracing::info!(backend = self.log.name(), "Emission monitor started");

        while let Some(pending) = self.rx.recv().await {
            let result = match pending.message {
                Ok(message) => self.log.append(message).await,
                Err(e) => Err(e),
            };
            self.record(EmissionOutcome {
                receipt: pending.receipt,
                result,
            });
        }

        tracing::info!("Emission monitor shutting down");
    }

    fn record(&self, outcome: EmissionOutcome) {
        let receipt = &outcome.receipt;
        match &outcome.result {
            Ok(position) => {
                tracing::info!(
                    topic = %position.topic,
                    key = %receipt.key,
                    partition = position.partition,
                    offset = position.offset,
                    "Event published"
                );
                metrics::EMISSIONS_TOTAL
                    .with_label_values(&[receipt.topic.as_str(), "success"])
                    .inc();
                self.stats.record_published();
            }
            Err(e) => {
                tracing::error!(
                    topic = %receipt.topic,
                    key = %receipt.key,
                    receipt_id = receipt.id,
                    "Failed to publish event: {}",
                    e
                );
                metrics::EMISSIONS_TOTAL
                    .with_label_values(&[receipt.topic.as_str(), "failure"])
                    .inc();
                self.stats.record_failed(e.to_string());
            }
        }
    }
}
