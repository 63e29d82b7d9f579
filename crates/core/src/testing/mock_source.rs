//! Mock source adapter for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::source::{FetchRequest, SourceAdapter, SourceError};
use crate::telemetry::{CanonicalRecord, RecordKind};

use super::fixtures;

/// A recorded fetch for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedFetch {
    /// The request that was fetched.
    pub request: FetchRequest,
    /// When the fetch was made.
    pub timestamp: Instant,
}

impl std::ops::Deref for RecordedFetch {
    type Target = FetchRequest;

    fn deref(&self) -> &Self::Target {
        &self.request
    }
}

/// Mock implementation of the SourceAdapter trait.
///
/// Provides controllable behavior for testing:
/// - Return configurable records per satellite (or a generated default)
/// - Track fetch requests and peak concurrency for assertions
/// - Simulate per-satellite failures, one-shot failures and delays
pub struct MockSourceAdapter {
    name: String,
    label: String,
    kind: RecordKind,
    /// Configured records per satellite id.
    records: Arc<RwLock<HashMap<String, Vec<CanonicalRecord>>>>,
    /// Persistent failures per satellite id.
    failures: Arc<RwLock<HashMap<String, SourceError>>>,
    /// If set, the next fetch will fail with this error.
    next_error: Arc<RwLock<Option<SourceError>>>,
    /// Simulated latency for every fetch.
    delay: Arc<RwLock<Duration>>,
    /// Recorded fetches.
    fetches: Arc<RwLock<Vec<RecordedFetch>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl std::fmt::Debug for MockSourceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSourceAdapter")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("records", &"<records>")
            .field("failures", &"<failures>")
            .finish()
    }
}

impl MockSourceAdapter {
    /// Create a mock adapter; its label is the upper-cased name.
    pub fn new(name: &str, kind: RecordKind) -> Self {
        Self {
            name: name.to_string(),
            label: name.to_uppercase(),
            kind,
            records: Arc::new(RwLock::new(HashMap::new())),
            failures: Arc::new(RwLock::new(HashMap::new())),
            next_error: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(Duration::ZERO)),
            fetches: Arc::new(RwLock::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn element_sets(name: &str) -> Self {
        Self::new(name, RecordKind::ElementSet)
    }

    pub fn positions(name: &str) -> Self {
        Self::new(name, RecordKind::Position)
    }

    pub fn passes(name: &str) -> Self {
        Self::new(name, RecordKind::Pass)
    }

    /// Set the records returned for a satellite.
    pub async fn set_records(&self, satellite_id: &str, records: Vec<CanonicalRecord>) {
        self.records
            .write()
            .await
            .insert(satellite_id.to_string(), records);
    }

    /// Make every fetch for a satellite fail.
    pub async fn fail_for(&self, satellite_id: &str, error: SourceError) {
        self.failures
            .write()
            .await
            .insert(satellite_id.to_string(), error);
    }

    /// Stop failing fetches for a satellite.
    pub async fn clear_failure(&self, satellite_id: &str) {
        self.failures.write().await.remove(satellite_id);
    }

    /// Make the next fetch (any satellite) fail.
    pub async fn set_next_error(&self, error: SourceError) {
        *self.next_error.write().await = Some(error);
    }

    /// Add latency to every fetch.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    /// Get recorded fetches.
    pub async fn recorded_requests(&self) -> Vec<RecordedFetch> {
        self.fetches.read().await.clone()
    }

    /// Number of fetches started.
    pub async fn fetch_count(&self) -> usize {
        self.fetches.read().await.len()
    }

    /// Highest number of fetches observed running at once.
    pub fn max_concurrent_fetches(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Record generated when nothing was configured for a satellite.
    fn default_records(&self, request: &FetchRequest) -> Vec<CanonicalRecord> {
        let id = &request.satellite.id;
        match self.kind {
            RecordKind::ElementSet => {
                vec![fixtures::element_set(id, &request.satellite.name).into()]
            }
            RecordKind::Position => vec![fixtures::position(id, 10.0, 20.0, 420.0).into()],
            RecordKind::Pass => match &request.observer {
                Some(observer) => vec![fixtures::pass(
                    id,
                    observer.latitude,
                    observer.longitude,
                    fixtures::FIXTURE_TIME_MS,
                )
                .into()],
                None => Vec::new(),
            },
        }
    }
}

/// Decrements the in-flight counter even if the fetch is aborted.
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SourceAdapter for MockSourceAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn kind(&self) -> RecordKind {
        self.kind
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<CanonicalRecord>, SourceError> {
        self.fetches.write().await.push(RecordedFetch {
            request: request.clone(),
            timestamp: Instant::now(),
        });

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let _in_flight = InFlight(Arc::clone(&self.in_flight));

        let delay = *self.delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        if let Some(error) = self.failures.read().await.get(&request.satellite.id) {
            return Err(error.clone());
        }

        let configured = self.records.read().await.get(&request.satellite.id).cloned();
        Ok(configured.unwrap_or_else(|| self.default_records(request)))
    }
}
