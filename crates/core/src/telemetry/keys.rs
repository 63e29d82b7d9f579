//! Dedup and log key derivation.

use super::PassPrediction;

/// Render a coordinate with six decimal digits so equal locations always
/// produce the same string regardless of input float precision.
pub fn quantize_coordinate(value: f64) -> String {
    let rendered = format!("{:.6}", value);
    // "-0.000000" and "0.000000" denote the same location
    if rendered == "-0.000000" {
        "0.000000".to_string()
    } else {
        rendered
    }
}

/// Compacted-log key for a pass: `{satellite}_{lat}_{lon}`.
pub fn pass_log_key(satellite_id: &str, observer_lat: f64, observer_lon: f64) -> String {
    format!(
        "{}_{}_{}",
        satellite_id,
        quantize_coordinate(observer_lat),
        quantize_coordinate(observer_lon)
    )
}

/// Dedup key for a pass: the log key plus the start time.
pub fn pass_dedup_key(pass: &PassPrediction) -> String {
    format!(
        "{}_{}",
        pass_log_key(&pass.satellite_id, pass.observer_lat, pass.observer_lon),
        pass.start_time_ms
    )
}
