//! Canonical record types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::keys::{pass_dedup_key, pass_log_key};

/// Standard gravitational parameter of Earth (km^3/s^2).
const EARTH_MU: f64 = 398_600.4418;

/// Mean Earth radius (km).
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Errors raised when a record violates the canonical model's invariants.
#[derive(Debug, Error, PartialEq)]
pub enum TelemetryError {
    #[error("satellite id must not be empty")]
    EmptySatelliteId,

    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("pass end time {end_ms} is not after start time {start_ms}")]
    InvalidPassWindow { start_ms: i64, end_ms: i64 },
}

/// Which canonical record type a value belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    ElementSet,
    Position,
    Pass,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [RecordKind::ElementSet, RecordKind::Position, RecordKind::Pass];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::ElementSet => "element_set",
            RecordKind::Position => "position",
            RecordKind::Pass => "pass",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An orbital element set decoded from two-line element text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrbitalElementSet {
    pub satellite_id: String,
    pub satellite_name: String,
    /// Raw first TLE line, kept verbatim for change detection and emission.
    pub line1: String,
    /// Raw second TLE line.
    pub line2: String,
    pub epoch_year: u32,
    pub epoch_day: f64,
    /// Revolutions per day.
    pub mean_motion: f64,
    pub eccentricity: f64,
    /// Degrees.
    pub inclination: f64,
    pub raan: f64,
    pub argument_of_perigee: f64,
    pub mean_anomaly: f64,
    /// When this record was produced (unix ms).
    pub last_updated_ms: i64,
}

impl OrbitalElementSet {
    pub fn validate(&self) -> Result<(), TelemetryError> {
        if self.satellite_id.trim().is_empty() {
            return Err(TelemetryError::EmptySatelliteId);
        }
        Ok(())
    }
}

/// A sub-satellite position fix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PositionFix {
    pub satellite_id: String,
    pub satellite_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_km: f64,
    /// Circular orbital velocity derived from altitude.
    pub velocity_km_per_s: f64,
    pub timestamp_ms: i64,
}

impl PositionFix {
    /// Build a validated position fix, deriving velocity from altitude.
    pub fn new(
        satellite_id: impl Into<String>,
        satellite_name: impl Into<String>,
        latitude: f64,
        longitude: f64,
        altitude_km: f64,
        timestamp_ms: i64,
    ) -> Result<Self, TelemetryError> {
        let fix = Self {
            satellite_id: satellite_id.into(),
            satellite_name: satellite_name.into(),
            latitude,
            longitude,
            altitude_km,
            velocity_km_per_s: orbital_velocity_km_per_s(altitude_km),
            timestamp_ms,
        };
        fix.validate()?;
        Ok(fix)
    }

    pub fn validate(&self) -> Result<(), TelemetryError> {
        if self.satellite_id.trim().is_empty() {
            return Err(TelemetryError::EmptySatelliteId);
        }
        check_range("latitude", self.latitude, -90.0, 90.0)?;
        check_range("longitude", self.longitude, -180.0, 180.0)?;
        if !(self.altitude_km >= 0.0) {
            return Err(TelemetryError::OutOfRange {
                field: "altitude_km",
                value: self.altitude_km,
            });
        }
        Ok(())
    }
}

/// A predicted pass of a satellite over an observer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PassPrediction {
    pub satellite_id: String,
    pub satellite_name: String,
    pub observer_lat: f64,
    pub observer_lon: f64,
    pub start_time_ms: i64,
    pub end_time_ms: i64,
    pub max_elevation_deg: f64,
    pub start_azimuth_deg: f64,
    pub end_azimuth_deg: f64,
}

impl PassPrediction {
    pub fn validate(&self) -> Result<(), TelemetryError> {
        if self.satellite_id.trim().is_empty() {
            return Err(TelemetryError::EmptySatelliteId);
        }
        check_range("observer_lat", self.observer_lat, -90.0, 90.0)?;
        check_range("observer_lon", self.observer_lon, -180.0, 180.0)?;
        if self.end_time_ms <= self.start_time_ms {
            return Err(TelemetryError::InvalidPassWindow {
                start_ms: self.start_time_ms,
                end_ms: self.end_time_ms,
            });
        }
        check_range("max_elevation_deg", self.max_elevation_deg, 0.0, 90.0)?;
        check_azimuth("start_azimuth_deg", self.start_azimuth_deg)?;
        check_azimuth("end_azimuth_deg", self.end_azimuth_deg)?;
        Ok(())
    }
}

/// Normalized telemetry from any source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CanonicalRecord {
    ElementSet(OrbitalElementSet),
    Position(PositionFix),
    Pass(PassPrediction),
}

impl CanonicalRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            CanonicalRecord::ElementSet(_) => RecordKind::ElementSet,
            CanonicalRecord::Position(_) => RecordKind::Position,
            CanonicalRecord::Pass(_) => RecordKind::Pass,
        }
    }

    pub fn satellite_id(&self) -> &str {
        match self {
            CanonicalRecord::ElementSet(e) => &e.satellite_id,
            CanonicalRecord::Position(p) => &p.satellite_id,
            CanonicalRecord::Pass(p) => &p.satellite_id,
        }
    }

    /// Identity used to index last-known state.
    ///
    /// Element sets and positions are keyed by satellite; passes by satellite,
    /// quantized observer location and start time.
    pub fn dedup_key(&self) -> String {
        match self {
            CanonicalRecord::ElementSet(e) => e.satellite_id.clone(),
            CanonicalRecord::Position(p) => p.satellite_id.clone(),
            CanonicalRecord::Pass(p) => pass_dedup_key(p),
        }
    }

    /// Key of the message on the compacted log.
    ///
    /// Pass log keys omit the start time, so compaction keeps only the most
    /// recent pass per satellite/observer pair.
    pub fn log_key(&self) -> String {
        match self {
            CanonicalRecord::ElementSet(e) => e.satellite_id.clone(),
            CanonicalRecord::Position(p) => p.satellite_id.clone(),
            CanonicalRecord::Pass(p) => pass_log_key(&p.satellite_id, p.observer_lat, p.observer_lon),
        }
    }

    pub fn validate(&self) -> Result<(), TelemetryError> {
        match self {
            CanonicalRecord::ElementSet(e) => e.validate(),
            CanonicalRecord::Position(p) => p.validate(),
            CanonicalRecord::Pass(p) => p.validate(),
        }
    }
}

impl From<OrbitalElementSet> for CanonicalRecord {
    fn from(value: OrbitalElementSet) -> Self {
        CanonicalRecord::ElementSet(value)
    }
}

impl From<PositionFix> for CanonicalRecord {
    fn from(value: PositionFix) -> Self {
        CanonicalRecord::Position(value)
    }
}

impl From<PassPrediction> for CanonicalRecord {
    fn from(value: PassPrediction) -> Self {
        CanonicalRecord::Pass(value)
    }
}

/// Circular orbit speed at the given altitude above mean Earth radius.
pub fn orbital_velocity_km_per_s(altitude_km: f64) -> f64 {
    (EARTH_MU / (EARTH_RADIUS_KM + altitude_km)).sqrt()
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), TelemetryError> {
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(TelemetryError::OutOfRange { field, value })
    }
}

fn check_azimuth(field: &'static str, value: f64) -> Result<(), TelemetryError> {
    if (0.0..360.0).contains(&value) {
        Ok(())
    } else {
        Err(TelemetryError::OutOfRange { field, value })
    }
}
