//! Type-specific change predicates.

use crate::telemetry::{CanonicalRecord, OrbitalElementSet, PositionFix};

const MEAN_MOTION_EPSILON: f64 = 1e-5;
const ECCENTRICITY_EPSILON: f64 = 1e-7;
const INCLINATION_EPSILON_DEG: f64 = 1e-3;

const LATITUDE_EPSILON_DEG: f64 = 0.01;
const LONGITUDE_EPSILON_DEG: f64 = 0.01;
const ALTITUDE_EPSILON_KM: f64 = 1.0;

fn element_set_changed(previous: &OrbitalElementSet, current: &OrbitalElementSet) -> bool {
    previous.line1 != current.line1
        || previous.line2 != current.line2
        || (current.mean_motion - previous.mean_motion).abs() > MEAN_MOTION_EPSILON
        || (current.eccentricity - previous.eccentricity).abs() > ECCENTRICITY_EPSILON
        || (current.inclination - previous.inclination).abs() > INCLINATION_EPSILON_DEG
}

fn position_changed(previous: &PositionFix, current: &PositionFix) -> bool {
    (current.latitude - previous.latitude).abs() > LATITUDE_EPSILON_DEG
        || (current.longitude - previous.longitude).abs() > LONGITUDE_EPSILON_DEG
        || (current.altitude_km - previous.altitude_km).abs() > ALTITUDE_EPSILON_KM
}

/// Whether `current` differs meaningfully from the cached `previous` record
/// for the same dedup key.
///
/// A pass is identified entirely by its key, so once cached it never counts
/// as changed.
pub fn has_changed(previous: &CanonicalRecord, current: &CanonicalRecord) -> bool {
    match (previous, current) {
        (CanonicalRecord::ElementSet(p), CanonicalRecord::ElementSet(c)) => {
            element_set_changed(p, c)
        }
        (CanonicalRecord::Position(p), CanonicalRecord::Position(c)) => position_changed(p, c),
        (CanonicalRecord::Pass(_), CanonicalRecord::Pass(_)) => false,
        // State is partitioned by kind, so a mismatch means a new identity
        _ => true,
    }
}
