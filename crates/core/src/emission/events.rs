//! JSON event payloads written to the logs.

use serde::{Deserialize, Serialize};

use crate::telemetry::{CanonicalRecord, OrbitalElementSet, PassPrediction, PositionFix};

/// Element-set change event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TleUpdateEvent {
    pub satellite_id: String,
    pub satellite_name: String,
    /// Publish time (unix ms).
    pub timestamp: i64,
    pub line1: String,
    pub line2: String,
    pub epoch_year: u32,
    pub epoch_day: f64,
    pub mean_motion: f64,
    pub eccentricity: f64,
    pub inclination: f64,
    pub source: String,
}

/// Position change event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PositionEvent {
    pub satellite_id: String,
    pub satellite_name: String,
    /// Fix time (unix ms).
    pub timestamp: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub velocity: f64,
    pub source: String,
}

/// New pass event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PassEvent {
    pub satellite_id: String,
    pub satellite_name: String,
    /// Publish time (unix ms).
    pub timestamp: i64,
    pub observer_latitude: f64,
    pub observer_longitude: f64,
    pub start_time: i64,
    pub end_time: i64,
    pub max_elevation: f64,
    pub start_azimuth: f64,
    pub end_azimuth: f64,
}

impl TleUpdateEvent {
    pub fn new(elements: &OrbitalElementSet, source: &str, published_at_ms: i64) -> Self {
        Self {
            satellite_id: elements.satellite_id.clone(),
            satellite_name: elements.satellite_name.clone(),
            timestamp: published_at_ms,
            line1: elements.line1.clone(),
            line2: elements.line2.clone(),
            epoch_year: elements.epoch_year,
            epoch_day: elements.epoch_day,
            mean_motion: elements.mean_motion,
            eccentricity: elements.eccentricity,
            inclination: elements.inclination,
            source: source.to_string(),
        }
    }
}

impl PositionEvent {
    pub fn new(fix: &PositionFix, source: &str) -> Self {
        Self {
            satellite_id: fix.satellite_id.clone(),
            satellite_name: fix.satellite_name.clone(),
            timestamp: fix.timestamp_ms,
            latitude: fix.latitude,
            longitude: fix.longitude,
            altitude: fix.altitude_km,
            velocity: fix.velocity_km_per_s,
            source: source.to_string(),
        }
    }
}

impl PassEvent {
    pub fn new(pass: &PassPrediction, published_at_ms: i64) -> Self {
        Self {
            satellite_id: pass.satellite_id.clone(),
            satellite_name: pass.satellite_name.clone(),
            timestamp: published_at_ms,
            observer_latitude: pass.observer_lat,
            observer_longitude: pass.observer_lon,
            start_time: pass.start_time_ms,
            end_time: pass.end_time_ms,
            max_elevation: pass.max_elevation_deg,
            start_azimuth: pass.start_azimuth_deg,
            end_azimuth: pass.end_azimuth_deg,
        }
    }
}

/// Encode a record as the JSON value published for its kind.
pub fn encode_event(
    record: &CanonicalRecord,
    source: &str,
    published_at_ms: i64,
) -> Result<String, serde_json::Error> {
    match record {
        CanonicalRecord::ElementSet(e) => {
            serde_json::to_string(&TleUpdateEvent::new(e, source, published_at_ms))
        }
        CanonicalRecord::Position(p) => serde_json::to_string(&PositionEvent::new(p, source)),
        CanonicalRecord::Pass(p) => serde_json::to_string(&PassEvent::new(p, published_at_ms)),
    }
}
