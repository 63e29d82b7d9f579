//! Adapter contract and failure taxonomy.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{ObserverLocation, TrackedSatellite};
use crate::telemetry::{CanonicalRecord, RecordKind, TelemetryError, TleError};

/// One fetch: a tracked satellite plus source-specific extra parameters.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub satellite: TrackedSatellite,
    /// Observer location; set only for pass sources.
    pub observer: Option<ObserverLocation>,
    /// Pass prediction lookahead window in days.
    pub lookahead_days: u32,
}

impl FetchRequest {
    pub fn for_satellite(satellite: TrackedSatellite) -> Self {
        Self {
            satellite,
            observer: None,
            lookahead_days: 0,
        }
    }

    pub fn with_observer(mut self, observer: ObserverLocation, lookahead_days: u32) -> Self {
        self.observer = Some(observer);
        self.lookahead_days = lookahead_days;
        self
    }
}

/// Errors an adapter may surface for a single fetch.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SourceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("transient failure: {0}")]
    Transient(String),
}

impl SourceError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::NotFound(_) => "not_found",
            SourceError::Unauthenticated(_) => "unauthenticated",
            SourceError::Malformed(_) => "malformed",
            SourceError::Transient(_) => "transient",
        }
    }
}

impl From<TleError> for SourceError {
    fn from(e: TleError) -> Self {
        SourceError::Malformed(e.to_string())
    }
}

impl From<TelemetryError> for SourceError {
    fn from(e: TelemetryError) -> Self {
        SourceError::Malformed(e.to_string())
    }
}

/// Trait for telemetry sources.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Unique registration name, e.g. `celestrak` or `n2yo-passes`.
    fn name(&self) -> &str;

    /// Source label carried on emitted events, e.g. `CELESTRAK`.
    fn label(&self) -> &str;

    /// Record kind this adapter produces.
    fn kind(&self) -> RecordKind;

    /// Fetch canonical records for one request.
    ///
    /// Element-set and position adapters return exactly one record; pass
    /// adapters return every pass in the lookahead window. Records are fully
    /// validated; a parse failure is `SourceError::Malformed`, never a
    /// partially filled record.
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<CanonicalRecord>, SourceError>;

    /// Whether requests are cross-joined with observer locations.
    fn needs_observer(&self) -> bool {
        self.kind() == RecordKind::Pass
    }
}
