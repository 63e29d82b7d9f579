//! Scheduler status and per-source control handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use orbitwatch_core::emission::EmissionStatsSnapshot;
use orbitwatch_core::scheduler::{CycleSummary, SourceStatus};
use orbitwatch_core::{RecordKind, SchedulerError, SchedulerStatus};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

/// Number of keys held in last-known state, per record kind.
#[derive(Debug, Serialize)]
pub struct TrackedKeysResponse {
    pub element_set: usize,
    pub position: usize,
    pub pass: usize,
}

/// Emission totals plus the log they are appended to.
#[derive(Debug, Serialize)]
pub struct EmissionStatusResponse {
    pub backend: String,
    #[serde(flatten)]
    pub stats: EmissionStatsSnapshot,
}

/// Full service status
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub config_hash: String,
    pub scheduler: SchedulerStatus,
    pub tracked_keys: TrackedKeysResponse,
    pub emission: EmissionStatusResponse,
}

/// Result of a manual poll
#[derive(Debug, Serialize)]
pub struct PollResponse {
    pub source: String,
    #[serde(flatten)]
    pub summary: CycleSummary,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct SourceErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<SourceErrorResponse>);

fn scheduler_error(e: SchedulerError) -> ApiError {
    let status = match e {
        SchedulerError::UnknownSource(_) => StatusCode::NOT_FOUND,
        SchedulerError::CycleInFlight(_) => StatusCode::CONFLICT,
        SchedulerError::Cancelled(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(SourceErrorResponse {
            error: e.to_string(),
        }),
    )
}

fn source_status(state: &AppState, name: &str) -> Result<SourceStatus, ApiError> {
    state
        .scheduler()
        .status()
        .sources
        .into_iter()
        .find(|s| s.name == name)
        .ok_or_else(|| scheduler_error(SchedulerError::UnknownSource(name.to_string())))
}

// ============================================================================
// Handlers
// ============================================================================

/// Get scheduler, cache and emission status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let detector = state.detector();
    Json(StatusResponse {
        config_hash: state.config_hash().to_string(),
        scheduler: state.scheduler().status(),
        tracked_keys: TrackedKeysResponse {
            element_set: detector.tracked_keys(RecordKind::ElementSet),
            position: detector.tracked_keys(RecordKind::Position),
            pass: detector.tracked_keys(RecordKind::Pass),
        },
        emission: EmissionStatusResponse {
            backend: state.log_backend().to_string(),
            stats: state.emission_stats(),
        },
    })
}

/// Enable a source
pub async fn enable_source(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<SourceStatus>, ApiError> {
    state
        .scheduler()
        .set_enabled(&name, true)
        .map_err(scheduler_error)?;
    source_status(&state, &name).map(Json)
}

/// Disable a source. A cycle already running completes.
pub async fn disable_source(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<SourceStatus>, ApiError> {
    state
        .scheduler()
        .set_enabled(&name, false)
        .map_err(scheduler_error)?;
    source_status(&state, &name).map(Json)
}

/// Run one cycle of a source now and wait for it
pub async fn poll_source(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<PollResponse>, ApiError> {
    let summary = state
        .scheduler()
        .poll_now(&name)
        .await
        .map_err(scheduler_error)?;
    Ok(Json(PollResponse {
        source: name,
        summary,
    }))
}
