use std::sync::Arc;

use tracing::{debug, info};

use crate::emission::{EmissionReceipt, EmissionSink};
use crate::metrics;
use crate::telemetry::{CanonicalRecord, RecordKind};

use super::{has_changed, LastKnownState};

/// Outcome of observing one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// No cached state for the key; the record was emitted and stored.
    FirstObservation(EmissionReceipt),
    /// The record differs meaningfully from the cached one; emitted and stored.
    Changed(EmissionReceipt),
    /// Within thresholds of the cached record; nothing happened.
    Unchanged,
}

impl Decision {
    pub fn emitted(&self) -> bool {
        !matches!(self, Decision::Unchanged)
    }

    pub fn receipt(&self) -> Option<&EmissionReceipt> {
        match self {
            Decision::FirstObservation(r) | Decision::Changed(r) => Some(r),
            Decision::Unchanged => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Decision::FirstObservation(_) => "first_observation",
            Decision::Changed(_) => "changed",
            Decision::Unchanged => "unchanged",
        }
    }
}

/// Decides whether observed records are meaningful changes and emits them.
///
/// Each instance owns its own state; nothing is shared between detectors.
pub struct ChangeDetector {
    state: LastKnownState,
    sink: Arc<dyn EmissionSink>,
}

impl ChangeDetector {
    pub fn new(sink: Arc<dyn EmissionSink>) -> Self {
        Self::with_state(sink, LastKnownState::new())
    }

    pub fn with_state(sink: Arc<dyn EmissionSink>, state: LastKnownState) -> Self {
        Self { state, sink }
    }

    /// Observe a record reported by `source` (the adapter's label).
    ///
    /// For one dedup key the read, predicate, dispatch and write happen under
    /// a single shard lock, so concurrent observations of the same key are
    /// serialized and emit at most once per distinct change. The cache is
    /// updated as soon as the emission is dispatched, whatever its outcome.
    pub fn observe(&self, record: CanonicalRecord, source: &str) -> Decision {
        let kind = record.kind();
        let key = record.dedup_key();

        let decision = {
            let mut shard = self.state.lock_shard(kind, &key);
            let decision = match shard.get(&key) {
                None => Decision::FirstObservation(self.sink.dispatch(&record, source)),
                Some(previous) if has_changed(previous, &record) => {
                    Decision::Changed(self.sink.dispatch(&record, source))
                }
                Some(_) => Decision::Unchanged,
            };
            if decision.emitted() {
                shard.insert(key.clone(), record);
            }
            decision
        };

        metrics::DECISIONS_TOTAL
            .with_label_values(&[kind.as_str(), decision.label()])
            .inc();
        match &decision {
            Decision::Unchanged => debug!(kind = %kind, key = %key, "No meaningful change"),
            emitted => info!(
                kind = %kind,
                key = %key,
                source = %source,
                decision = emitted.label(),
                "Change detected"
            ),
        }
        decision
    }

    /// Number of keys with known state for a kind.
    pub fn tracked_keys(&self, kind: RecordKind) -> usize {
        self.state.len(kind)
    }

    /// Cached record for a dedup key.
    pub fn last_known(&self, kind: RecordKind, key: &str) -> Option<CanonicalRecord> {
        self.state.get(kind, key)
    }
}
