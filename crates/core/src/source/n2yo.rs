//! N2YO position and visual-pass sources.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::{N2yoConfig, ObserverLocation};
use crate::telemetry::{CanonicalRecord, PassPrediction, PositionFix, RecordKind};

use super::http::{build_client, get_json};
use super::{FetchRequest, SourceAdapter, SourceError};

const LABEL: &str = "N2YO";

#[derive(Debug, Deserialize)]
struct N2yoInfo {
    #[serde(default)]
    satname: Option<String>,
    #[serde(default)]
    satid: u64,
}

#[derive(Debug, Deserialize)]
struct N2yoPosition {
    satlatitude: f64,
    satlongitude: f64,
    sataltitude: f64,
    /// Unix seconds.
    timestamp: i64,
}

#[derive(Debug, Deserialize)]
struct PositionsResponse {
    info: Option<N2yoInfo>,
    #[serde(default)]
    positions: Vec<N2yoPosition>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct N2yoPass {
    start_az: f64,
    #[serde(rename = "startUTC")]
    start_utc: i64,
    max_el: f64,
    end_az: f64,
    #[serde(rename = "endUTC")]
    end_utc: i64,
}

#[derive(Debug, Deserialize)]
struct PassesResponse {
    info: Option<N2yoInfo>,
    #[serde(default)]
    passes: Vec<N2yoPass>,
    #[serde(default)]
    error: Option<String>,
}

/// N2YO reports API problems as a 200 with an `error` field.
fn check_api_error(error: Option<String>) -> Result<(), SourceError> {
    match error {
        Some(msg) if msg.to_lowercase().contains("api key") => {
            Err(SourceError::Unauthenticated(msg))
        }
        Some(msg) => Err(SourceError::Malformed(msg)),
        None => Ok(()),
    }
}

/// Resolve the satellite name, preferring the one N2YO reports.
fn satellite_name(info: &Option<N2yoInfo>, fallback: &str) -> String {
    info.as_ref()
        .and_then(|i| i.satname.as_deref())
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

/// Fold an azimuth into [0, 360).
fn normalize_azimuth(deg: f64) -> f64 {
    let folded = deg.rem_euclid(360.0);
    // Tiny negatives round up to exactly 360.0
    if folded >= 360.0 {
        0.0
    } else {
        folded
    }
}

/// Unix seconds to unix milliseconds, rejecting values that overflow.
fn seconds_to_ms(seconds: i64, field: &str) -> Result<i64, SourceError> {
    seconds.checked_mul(1000).ok_or_else(|| {
        SourceError::Malformed(format!("{} out of range: {}", field, seconds))
    })
}

fn positions_to_fix(
    response: PositionsResponse,
    satellite_id: &str,
    fallback_name: &str,
) -> Result<PositionFix, SourceError> {
    check_api_error(response.error)?;
    if response.info.as_ref().map_or(true, |i| i.satid == 0) && response.positions.is_empty() {
        return Err(SourceError::NotFound(format!(
            "no position for satellite {}",
            satellite_id
        )));
    }
    let name = satellite_name(&response.info, fallback_name);
    let position = response.positions.into_iter().next().ok_or_else(|| {
        SourceError::Malformed(format!("no positions in response for {}", satellite_id))
    })?;

    Ok(PositionFix::new(
        satellite_id,
        name,
        position.satlatitude,
        position.satlongitude,
        position.sataltitude,
        seconds_to_ms(position.timestamp, "timestamp")?,
    )?)
}

fn passes_to_predictions(
    response: PassesResponse,
    satellite_id: &str,
    fallback_name: &str,
    observer: &ObserverLocation,
) -> Result<Vec<PassPrediction>, SourceError> {
    check_api_error(response.error)?;
    let name = satellite_name(&response.info, fallback_name);

    response
        .passes
        .into_iter()
        .map(|pass| -> Result<PassPrediction, SourceError> {
            let prediction = PassPrediction {
                satellite_id: satellite_id.to_string(),
                satellite_name: name.clone(),
                observer_lat: observer.latitude,
                observer_lon: observer.longitude,
                start_time_ms: seconds_to_ms(pass.start_utc, "startUTC")?,
                end_time_ms: seconds_to_ms(pass.end_utc, "endUTC")?,
                max_elevation_deg: pass.max_el,
                start_azimuth_deg: normalize_azimuth(pass.start_az),
                end_azimuth_deg: normalize_azimuth(pass.end_az),
            };
            prediction.validate()?;
            Ok(prediction)
        })
        .collect()
}

/// Current sub-satellite position from N2YO.
pub struct N2yoPositionAdapter {
    client: Client,
    config: N2yoConfig,
}

impl N2yoPositionAdapter {
    pub fn new(config: N2yoConfig) -> reqwest::Result<Self> {
        let client = build_client(config.timeout_secs, false)?;
        Ok(Self { client, config })
    }

    fn build_url(&self, satellite_id: &str) -> String {
        format!(
            "{}/positions/{}/0/0/0/1/&apiKey={}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(satellite_id),
            urlencoding::encode(&self.config.api_key)
        )
    }
}

#[async_trait]
impl SourceAdapter for N2yoPositionAdapter {
    fn name(&self) -> &str {
        "n2yo-positions"
    }

    fn label(&self) -> &str {
        LABEL
    }

    fn kind(&self) -> RecordKind {
        RecordKind::Position
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<CanonicalRecord>, SourceError> {
        let satellite = &request.satellite;
        debug!(satellite_id = %satellite.id, "Fetching N2YO position");

        let response: PositionsResponse =
            get_json(&self.client, &self.build_url(&satellite.id)).await?;
        let fix = positions_to_fix(response, &satellite.id, &satellite.name)?;
        Ok(vec![fix.into()])
    }
}

/// Visual pass predictions from N2YO for one observer.
pub struct N2yoPassAdapter {
    client: Client,
    config: N2yoConfig,
}

impl N2yoPassAdapter {
    pub fn new(config: N2yoConfig) -> reqwest::Result<Self> {
        let client = build_client(config.timeout_secs, false)?;
        Ok(Self { client, config })
    }

    fn build_url(&self, satellite_id: &str, observer: &ObserverLocation, days: u32) -> String {
        format!(
            "{}/visualpasses/{}/{}/{}/0/{}/{}/&apiKey={}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(satellite_id),
            observer.latitude,
            observer.longitude,
            days,
            self.config.min_visibility_secs,
            urlencoding::encode(&self.config.api_key)
        )
    }
}

#[async_trait]
impl SourceAdapter for N2yoPassAdapter {
    fn name(&self) -> &str {
        "n2yo-passes"
    }

    fn label(&self) -> &str {
        LABEL
    }

    fn kind(&self) -> RecordKind {
        RecordKind::Pass
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<CanonicalRecord>, SourceError> {
        let satellite = &request.satellite;
        let observer = request.observer.as_ref().ok_or_else(|| {
            SourceError::Malformed("pass request without an observer location".to_string())
        })?;
        let days = if request.lookahead_days == 0 {
            self.config.pass_lookahead_days
        } else {
            request.lookahead_days
        };
        debug!(
            satellite_id = %satellite.id,
            observer = %observer.name,
            days,
            "Fetching N2YO visual passes"
        );

        let response: PassesResponse =
            get_json(&self.client, &self.build_url(&satellite.id, observer, days)).await?;
        let passes = passes_to_predictions(response, &satellite.id, &satellite.name, observer)?;
        Ok(passes.into_iter().map(CanonicalRecord::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> N2yoConfig {
        N2yoConfig {
            api_key: "KEY".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_position_url() {
        let adapter = N2yoPositionAdapter::new(config()).unwrap();
        assert_eq!(
            adapter.build_url("25544"),
            "https://api.n2yo.com/rest/v1/satellite/positions/25544/0/0/0/1/&apiKey=KEY"
        );
    }

    #[test]
    fn test_pass_url() {
        let adapter = N2yoPassAdapter::new(config()).unwrap();
        let observer = ObserverLocation::new("Ottawa", 45.5, -75.25);
        assert_eq!(
            adapter.build_url("25544", &observer, 2),
            "https://api.n2yo.com/rest/v1/satellite/visualpasses/25544/45.5/-75.25/0/2/300/&apiKey=KEY"
        );
    }

    #[test]
    fn test_position_response_converts_seconds() {
        let json = r#"{
            "info": {"satname": "SPACE STATION", "satid": 25544, "transactionscount": 1},
            "positions": [{"satlatitude": 12.5, "satlongitude": -45.25, "sataltitude": 418.2,
                           "azimuth": 1.0, "elevation": -40.0, "ra": 0.0, "dec": 0.0,
                           "timestamp": 1700000000}]
        }"#;
        let response: PositionsResponse = serde_json::from_str(json).unwrap();
        let fix = positions_to_fix(response, "25544", "ISS").unwrap();
        assert_eq!(fix.satellite_name, "SPACE STATION");
        assert_eq!(fix.timestamp_ms, 1_700_000_000_000);
        assert!((fix.latitude - 12.5).abs() < 1e-12);
        assert!(fix.velocity_km_per_s > 7.0);
    }

    #[test]
    fn test_position_unknown_satellite_is_not_found() {
        let json = r#"{"info": {"satname": null, "satid": 0, "transactionscount": 1}, "positions": []}"#;
        let response: PositionsResponse = serde_json::from_str(json).unwrap();
        let err = positions_to_fix(response, "99999", "X").unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
    }

    #[test]
    fn test_position_out_of_range_is_malformed() {
        let json = r#"{"info": {"satname": "X", "satid": 1},
            "positions": [{"satlatitude": 95.0, "satlongitude": 0.0, "sataltitude": 400.0, "timestamp": 1}]}"#;
        let response: PositionsResponse = serde_json::from_str(json).unwrap();
        let err = positions_to_fix(response, "1", "X").unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)));
    }

    #[test]
    fn test_invalid_api_key_is_unauthenticated() {
        let json = r#"{"error": "Invalid API Key!"}"#;
        let response: PositionsResponse = serde_json::from_str(json).unwrap();
        let err = positions_to_fix(response, "25544", "ISS").unwrap_err();
        assert!(matches!(err, SourceError::Unauthenticated(_)));
    }

    #[test]
    fn test_passes_response() {
        let json = r#"{
            "info": {"satname": "SPACE STATION", "satid": 25544, "passescount": 2},
            "passes": [
                {"startAz": 310.5, "startAzCompass": "NW", "startEl": 10.0, "startUTC": 1700000000,
                 "maxAz": 30.0, "maxAzCompass": "NNE", "maxEl": 62.4, "maxUTC": 1700000300,
                 "endAz": 120.0, "endAzCompass": "ESE", "endEl": 10.0, "endUTC": 1700000600, "duration": 600},
                {"startAz": 200.0, "startUTC": 1700090000, "maxEl": 20.0, "endAz": 360.0, "endUTC": 1700090400}
            ]
        }"#;
        let observer = ObserverLocation::new("Ottawa", 45.0, -75.0);
        let response: PassesResponse = serde_json::from_str(json).unwrap();
        let passes = passes_to_predictions(response, "25544", "ISS", &observer).unwrap();

        assert_eq!(passes.len(), 2);
        assert_eq!(passes[0].start_time_ms, 1_700_000_000_000);
        assert_eq!(passes[0].end_time_ms, 1_700_000_600_000);
        assert_eq!(passes[0].observer_lat, 45.0);
        assert!((passes[0].max_elevation_deg - 62.4).abs() < 1e-12);
        assert_eq!(passes[1].end_azimuth_deg, 0.0);
    }

    #[test]
    fn test_no_passes_is_empty() {
        let json = r#"{"info": {"satname": "SPACE STATION", "satid": 25544, "passescount": 0}}"#;
        let observer = ObserverLocation::new("Ottawa", 45.0, -75.0);
        let response: PassesResponse = serde_json::from_str(json).unwrap();
        assert!(passes_to_predictions(response, "25544", "ISS", &observer)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_inverted_pass_window_is_malformed() {
        let json = r#"{"info": {"satid": 25544},
            "passes": [{"startAz": 1.0, "startUTC": 20, "maxEl": 10.0, "endAz": 2.0, "endUTC": 10}]}"#;
        let observer = ObserverLocation::new("Ottawa", 45.0, -75.0);
        let response: PassesResponse = serde_json::from_str(json).unwrap();
        let err = passes_to_predictions(response, "25544", "ISS", &observer).unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)));
    }

    #[test]
    fn test_overflowing_position_timestamp_is_malformed() {
        let json = r#"{"info": {"satname": "X", "satid": 1},
            "positions": [{"satlatitude": 1.0, "satlongitude": 2.0, "sataltitude": 400.0,
                           "timestamp": 9223372036854775807}]}"#;
        let response: PositionsResponse = serde_json::from_str(json).unwrap();
        let err = positions_to_fix(response, "1", "X").unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)));
    }

    #[test]
    fn test_overflowing_pass_time_is_malformed() {
        let json = r#"{"info": {"satid": 25544},
            "passes": [{"startAz": 1.0, "startUTC": -9223372036854775808, "maxEl": 10.0,
                        "endAz": 2.0, "endUTC": 10}]}"#;
        let observer = ObserverLocation::new("Ottawa", 45.0, -75.0);
        let response: PassesResponse = serde_json::from_str(json).unwrap();
        let err = passes_to_predictions(response, "25544", "ISS", &observer).unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)));
    }

    #[test]
    fn test_azimuth_stays_below_full_circle() {
        assert_eq!(normalize_azimuth(-1e-20), 0.0);
        assert_eq!(normalize_azimuth(360.0), 0.0);
        assert_eq!(normalize_azimuth(-90.0), 270.0);
        assert_eq!(normalize_azimuth(725.5), 5.5);

        let json = r#"{"info": {"satid": 25544},
            "passes": [{"startAz": -1e-20, "startUTC": 10, "maxEl": 10.0, "endAz": 2.0, "endUTC": 20}]}"#;
        let observer = ObserverLocation::new("Ottawa", 45.0, -75.0);
        let response: PassesResponse = serde_json::from_str(json).unwrap();
        let passes = passes_to_predictions(response, "25544", "ISS", &observer).unwrap();
        assert_eq!(passes[0].start_azimuth_deg, 0.0);
    }
}
