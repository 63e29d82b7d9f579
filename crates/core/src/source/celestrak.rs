//! CelesTrak GP element-set source.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::CelestrakConfig;
use crate::telemetry::{parse_tle, split_tle_body, CanonicalRecord, OrbitalElementSet, RecordKind};

use super::http::{build_client, get_text};
use super::{FetchRequest, SourceAdapter, SourceError};

/// Body CelesTrak returns for an unknown catalog number.
const NO_DATA_MARKER: &str = "No GP data found";

pub struct CelestrakAdapter {
    client: Client,
    config: CelestrakConfig,
}

impl CelestrakAdapter {
    pub fn new(config: CelestrakConfig) -> reqwest::Result<Self> {
        let client = build_client(config.timeout_secs, false)?;
        Ok(Self { client, config })
    }

    fn build_url(&self, satellite_id: &str) -> String {
        format!(
            "{}/NORAD/elements/gp.php?CATNR={}&FORMAT=TLE",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(satellite_id)
        )
    }
}

/// Decode a CelesTrak TLE body, falling back to the configured name when the
/// body carries only the two element lines.
pub(crate) fn parse_celestrak_body(
    body: &str,
    satellite_id: &str,
    fallback_name: &str,
) -> Result<OrbitalElementSet, SourceError> {
    if body.trim().starts_with(NO_DATA_MARKER) {
        return Err(SourceError::NotFound(format!(
            "no element set for satellite {}",
            satellite_id
        )));
    }
    let (name, line1, line2) = split_tle_body(body)?;
    let elements = parse_tle(name.unwrap_or(fallback_name), line1, line2)?;
    elements.validate()?;
    Ok(elements)
}

#[async_trait]
impl SourceAdapter for CelestrakAdapter {
    fn name(&self) -> &str {
        "celestrak"
    }

    fn label(&self) -> &str {
        "CELESTRAK"
    }

    fn kind(&self) -> RecordKind {
        RecordKind::ElementSet
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<CanonicalRecord>, SourceError> {
        let satellite = &request.satellite;
        debug!(satellite_id = %satellite.id, "Fetching CelesTrak element set");

        let body = get_text(&self.client, &self.build_url(&satellite.id)).await?;
        let elements = parse_celestrak_body(&body, &satellite.id, &satellite.name)?;
        Ok(vec![elements.into()])
    }
}
