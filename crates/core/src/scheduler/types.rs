//! Types for the poll scheduler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::telemetry::RecordKind;

/// Errors returned by scheduler control operations.
#[derive(Debug, Error, PartialEq)]
pub enum SchedulerError {
    /// No source registered under this name.
    #[error("unknown source: {0}")]
    UnknownSource(String),

    /// A source with this name is already registered.
    #[error("source already registered: {0}")]
    DuplicateSource(String),

    /// The source's previous cycle has not finished.
    #[error("cycle already in flight for source: {0}")]
    CycleInFlight(String),

    /// The cycle was aborted because the scheduler stopped.
    #[error("cycle cancelled by shutdown for source: {0}")]
    Cancelled(String),

    /// An adapter could not be constructed.
    #[error("failed to build adapter {name}: {reason}")]
    AdapterInit { name: String, reason: String },
}

/// Result of one completed poll cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CycleSummary {
    /// Fetches dispatched.
    pub requests: usize,
    /// Fetches that failed or were lost.
    pub failures: usize,
    /// Records that produced an emission.
    pub emitted: usize,
}

/// Current state of one registered source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceStatus {
    pub name: String,
    pub label: String,
    pub kind: RecordKind,
    pub enabled: bool,
    pub in_flight: bool,
    pub interval_secs: f64,
    pub cycles_started: u64,
    pub cycles_skipped: u64,
    pub fetch_failures: u64,
    pub last_cycle_started_at: Option<DateTime<Utc>>,
    pub last_cycle_finished_at: Option<DateTime<Utc>>,
}

/// Current state of the scheduler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerStatus {
    /// Whether the poll loops are running.
    pub running: bool,
    /// Registered sources in registration order.
    pub sources: Vec<SourceStatus>,
}
