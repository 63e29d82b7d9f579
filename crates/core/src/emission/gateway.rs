use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error};

use crate::config::TopicConfig;
use crate::metrics;
use crate::telemetry::{CanonicalRecord, RecordKind};

use super::{encode_event, EmissionError, EmissionMonitor, EmissionStats, EventLog, LogMessage, LogPosition};

/// Proof that a publish was dispatched. Says nothing about its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmissionReceipt {
    /// Monotonic per-gateway dispatch id.
    pub id: u64,
    pub kind: RecordKind,
    pub topic: String,
    pub key: String,
}

/// An encoded message waiting for its turn at the log.
#[derive(Debug, Clone)]
pub struct PendingEmission {
    pub receipt: EmissionReceipt,
    pub message: Result<LogMessage, EmissionError>,
}

/// Completion of one publish attempt.
#[derive(Debug, Clone)]
pub struct EmissionOutcome {
    pub receipt: EmissionReceipt,
    pub result: Result<LogPosition, EmissionError>,
}

/// Anything that can take a changed record and start publishing it.
///
/// `dispatch` must not block or suspend: it is called while the detection
/// engine holds a state lock.
pub trait EmissionSink: Send + Sync {
    fn dispatch(&self, record: &CanonicalRecord, source: &str) -> EmissionReceipt;
}

/// Publishes records to the per-kind topics of an [`EventLog`].
///
/// Messages are queued in dispatch order and appended one at a time by the
/// [`EmissionMonitor`], so a later dispatch for a key never lands before an
/// earlier one. Cheaply cloneable.
#[derive(Clone)]
pub struct EmissionGateway {
    log_name: Arc<str>,
    topics: TopicConfig,
    pending: mpsc::Sender<PendingEmission>,
    stats: Arc<EmissionStats>,
    next_id: Arc<AtomicU64>,
}

impl EmissionGateway {
    pub fn new(
        log_name: &str,
        topics: TopicConfig,
        pending: mpsc::Sender<PendingEmission>,
        stats: Arc<EmissionStats>,
    ) -> Self {
        Self {
            log_name: Arc::from(log_name),
            topics,
            pending,
            stats,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn stats(&self) -> &Arc<EmissionStats> {
        &self.stats
    }

    pub fn log_name(&self) -> &str {
        &self.log_name
    }

    fn reject(&self, pending: PendingEmission, reason: &str) {
        let receipt = &pending.receipt;
        error!(
            topic = %receipt.topic,
            key = %receipt.key,
            receipt_id = receipt.id,
            "Dropping event: {}",
            reason
        );
        metrics::EMISSIONS_TOTAL
            .with_label_values(&[receipt.topic.as_str(), "failure"])
            .inc();
        self.stats
            .record_failed(EmissionError::Unavailable(reason.to_string()).to_string());
    }
}

impl EmissionSink for EmissionGateway {
    fn dispatch(&self, record: &CanonicalRecord, source: &str) -> EmissionReceipt {
        let kind = record.kind();
        let receipt = EmissionReceipt {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            kind,
            topic: self.topics.for_kind(kind).to_string(),
            key: record.log_key(),
        };
        self.stats.record_dispatched();

        // Encode now so the queue owns no borrowed record
        let message = encode_event(record, source, Utc::now().timestamp_millis())
            .map(|payload| LogMessage {
                topic: receipt.topic.clone(),
                key: receipt.key.clone(),
                payload,
            })
            .map_err(|e| EmissionError::Serialization(e.to_string()));

        let pending = PendingEmission {
            receipt: receipt.clone(),
            message,
        };
        match self.pending.try_send(pending) {
            Ok(()) => debug!(
                topic = %receipt.topic,
                key = %receipt.key,
                receipt_id = receipt.id,
                "Dispatched event"
            ),
            Err(TrySendError::Full(pending)) => self.reject(pending, "emission queue full"),
            Err(TrySendError::Closed(pending)) => self.reject(pending, "emission monitor stopped"),
        }
        receipt
    }
}

/// Create a complete emission system
///
/// Returns:
/// - `EmissionGateway` - hand this to the detection engine (cloneable)
/// - `EmissionMonitor` - spawn this as a background task with `tokio::spawn(monitor.run())`
pub fn create_emission_system(
    log: Arc<dyn EventLog>,
    topics: TopicConfig,
    buffer_size: usize,
) -> (EmissionGateway, EmissionMonitor) {
    let (tx, rx) = mpsc::channel(buffer_size.max(1));
    let stats = Arc::new(EmissionStats::default());
    let gateway = EmissionGateway::new(log.name(), topics, tx, Arc::clone(&stats));
    let monitor = EmissionMonitor::new(log, rx, stats);
    (gateway, monitor)
}
