//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the source, log and emission
//! seams, so the scheduler and detector can be exercised without network
//! access or a database.
//!
//! # Example
//!
//! ```rust,ignore
//! use orbitwatch_core::testing::{MockSourceAdapter, MockEventLog, fixtures};
//!
//! let adapter = MockSourceAdapter::element_sets("celestrak");
//! adapter.set_records("25544", vec![fixtures::iss_elements().into()]).await;
//! adapter.fail_for("43013", SourceError::Transient("timeout".into())).await;
//!
//! let log = MockEventLog::new();
//! // Use in a PollScheduler / EmissionGateway...
//! ```

mod mock_emission_sink;
mod mock_event_log;
mod mock_source;

pub use mock_emission_sink::MockEmissionSink;
pub use mock_event_log::MockEventLog;
pub use mock_source::{MockSourceAdapter, RecordedFetch};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::config::{ObserverLocation, TrackedSatellite};
    use crate::telemetry::{orbital_velocity_km_per_s, OrbitalElementSet, PassPrediction, PositionFix};

    /// First line of the reference ISS element set.
    pub const ISS_LINE1: &str =
        "1 25544U 98067A   23001.00000000  .00001234  00000-0  12345-4 0  9999";
    /// Second line of the reference ISS element set.
    pub const ISS_LINE2: &str =
        "2 25544  51.6400 123.4567 0001234  12.3456 347.8901 15.48901234123456";

    /// Fixed timestamp used by fixtures (2023-11-14T22:13:20Z).
    pub const FIXTURE_TIME_MS: i64 = 1_700_000_000_000;

    /// The reference ISS element set, as a 3-line CelesTrak body.
    pub fn iss_tle_body() -> String {
        format!("ISS (ZARYA)\n{}\n{}\n", ISS_LINE1, ISS_LINE2)
    }

    /// The reference ISS element set.
    pub fn iss_elements() -> OrbitalElementSet {
        OrbitalElementSet {
            satellite_id: "25544".to_string(),
            satellite_name: "ISS (ZARYA)".to_string(),
            line1: ISS_LINE1.to_string(),
            line2: ISS_LINE2.to_string(),
            epoch_year: 23,
            epoch_day: 1.0,
            mean_motion: 15.48901234,
            eccentricity: 0.0001234,
            inclination: 51.64,
            raan: 123.4567,
            argument_of_perigee: 12.3456,
            mean_anomaly: 347.8901,
            last_updated_ms: FIXTURE_TIME_MS,
        }
    }

    /// An element set for an arbitrary satellite, derived from the ISS one.
    pub fn element_set(satellite_id: &str, satellite_name: &str) -> OrbitalElementSet {
        let iss = iss_elements();
        OrbitalElementSet {
            satellite_id: satellite_id.to_string(),
            satellite_name: satellite_name.to_string(),
            line1: iss.line1.replacen("25544", satellite_id, 1),
            line2: iss.line2.replacen("25544", satellite_id, 1),
            ..iss
        }
    }

    /// A position fix at `FIXTURE_TIME_MS`.
    pub fn position(satellite_id: &str, latitude: f64, longitude: f64, altitude_km: f64) -> PositionFix {
        PositionFix {
            satellite_id: satellite_id.to_string(),
            satellite_name: format!("SAT {}", satellite_id),
            latitude,
            longitude,
            altitude_km,
            velocity_km_per_s: orbital_velocity_km_per_s(altitude_km),
            timestamp_ms: FIXTURE_TIME_MS,
        }
    }

    /// A ten-minute pass starting at `start_time_ms`.
    pub fn pass(
        satellite_id: &str,
        observer_lat: f64,
        observer_lon: f64,
        start_time_ms: i64,
    ) -> PassPrediction {
        PassPrediction {
            satellite_id: satellite_id.to_string(),
            satellite_name: format!("SAT {}", satellite_id),
            observer_lat,
            observer_lon,
            start_time_ms,
            end_time_ms: start_time_ms + 600_000,
            max_elevation_deg: 45.0,
            start_azimuth_deg: 310.0,
            end_azimuth_deg: 120.0,
        }
    }

    pub fn satellite(id: &str) -> TrackedSatellite {
        TrackedSatellite::new(id, format!("SAT {}", id))
    }

    pub fn observer(name: &str, latitude: f64, longitude: f64) -> ObserverLocation {
        ObserverLocation::new(name, latitude, longitude)
    }
}
