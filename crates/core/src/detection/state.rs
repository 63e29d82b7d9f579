//! Sharded last-known-state store.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::telemetry::{CanonicalRecord, RecordKind};

const DEFAULT_SHARDS: usize = 16;

type Shard = HashMap<String, CanonicalRecord>;

/// Last emitted record per dedup key, partitioned by record kind.
///
/// Each kind's keys are spread over a fixed set of shards, each behind its own
/// short synchronous mutex. Holding a shard guard serializes every decision
/// for the keys in that shard.
pub struct LastKnownState {
    /// Indexed by `kind_index`.
    kinds: [Vec<Mutex<Shard>>; 3],
}

fn kind_index(kind: RecordKind) -> usize {
    match kind {
        RecordKind::ElementSet => 0,
        RecordKind::Position => 1,
        RecordKind::Pass => 2,
    }
}

impl LastKnownState {
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }

    pub fn with_shards(shards: usize) -> Self {
        let shards = shards.max(1);
        let make = || (0..shards).map(|_| Mutex::new(Shard::new())).collect::<Vec<_>>();
        Self {
            kinds: [make(), make(), make()],
        }
    }

    /// Lock the shard holding `key`.
    pub(crate) fn lock_shard(&self, kind: RecordKind, key: &str) -> MutexGuard<'_, Shard> {
        let shards = &self.kinds[kind_index(kind)];
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() % shards.len() as u64) as usize;
        // A panic while holding a shard cannot leave a half-written entry
        shards[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached record for a key, if any.
    pub fn get(&self, kind: RecordKind, key: &str) -> Option<CanonicalRecord> {
        self.lock_shard(kind, key).get(key).cloned()
    }

    /// Number of keys known for a kind.
    pub fn len(&self, kind: RecordKind) -> usize {
        self.kinds[kind_index(kind)]
            .iter()
            .map(|shard| shard.lock().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        RecordKind::ALL.iter().all(|kind| self.len(*kind) == 0)
    }
}

impl Default for LastKnownState {
    fn default() -> Self {
        Self::new()
    }
}
