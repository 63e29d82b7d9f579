//! Space-Track GP element-set source.
//!
//! Space-Track requires a session: a form login sets the `chocolatechip`
//! cookie, which the client's cookie jar then sends on every query.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::config::SpaceTrackConfig;
use crate::telemetry::{parse_tle, split_tle_body, CanonicalRecord, OrbitalElementSet, RecordKind};

use super::http::{build_client, status_error, transport_error};
use super::{FetchRequest, SourceAdapter, SourceError};

const SESSION_COOKIE: &str = "chocolatechip";

pub struct SpaceTrackAdapter {
    client: Client,
    config: SpaceTrackConfig,
    /// Generation of the current session, `None` until a login succeeds.
    session: Arc<RwLock<Option<u64>>>,
    /// Held across a login so concurrent requests share one.
    login_lock: Arc<Mutex<()>>,
}

impl SpaceTrackAdapter {
    pub fn new(config: SpaceTrackConfig) -> reqwest::Result<Self> {
        let client = build_client(config.timeout_secs, true)?;
        Ok(Self {
            client,
            config,
            session: Arc::new(RwLock::new(None)),
            login_lock: Arc::new(Mutex::new(())),
        })
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn query_url(&self, satellite_id: &str) -> String {
        format!(
            "{}/basicspacedata/query/class/gp/NORAD_CAT_ID/{}/orderby/EPOCH%20desc/limit/1/format/tle",
            self.base_url(),
            urlencoding::encode(satellite_id)
        )
    }

    /// Log in and return the new session generation. Callers hold `login_lock`.
    async fn login(&self) -> Result<u64, SourceError> {
        let url = format!("{}/ajaxauth/login", self.base_url());
        let params = [
            ("identity", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let has_cookie = response.cookies().any(|c| c.name() == SESSION_COOKIE);
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(match status_error(status, &body) {
                SourceError::NotFound(msg) => SourceError::Unauthenticated(msg),
                other => other,
            });
        }
        if !has_cookie || body.contains("Failed") {
            return Err(SourceError::Unauthenticated(
                "Space-Track login rejected".to_string(),
            ));
        }

        let mut session = self.session.write().await;
        let generation = (*session).map_or(1, |g| g + 1);
        *session = Some(generation);
        debug!(generation, "Space-Track login successful");
        Ok(generation)
    }

    /// Log in unless another request already replaced the `stale` session
    /// (or established one, when `stale` is `None`) while we waited.
    async fn refresh_session(&self, stale: Option<u64>) -> Result<u64, SourceError> {
        let _login = self.login_lock.lock().await;
        if let Some(current) = *self.session.read().await {
            if Some(current) != stale {
                return Ok(current);
            }
        }
        self.login().await
    }

    async fn ensure_authenticated(&self) -> Result<u64, SourceError> {
        if let Some(generation) = *self.session.read().await {
            return Ok(generation);
        }
        self.refresh_session(None).await
    }

    /// Authenticated GET; re-establishes the session once on 401.
    async fn get(&self, url: &str) -> Result<String, SourceError> {
        let generation = self.ensure_authenticated().await?;

        let mut response = self.client.get(url).send().await.map_err(transport_error)?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("Space-Track session expired, re-authenticating");
            self.refresh_session(Some(generation)).await?;
            response = self.client.get(url).send().await.map_err(transport_error)?;
        }

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        Ok(body)
    }
}

/// Decode a Space-Track TLE body. Bare 2-line bodies are named `NORAD-{id}`.
pub(crate) fn parse_spacetrack_body(
    body: &str,
    satellite_id: &str,
) -> Result<OrbitalElementSet, SourceError> {
    if body.trim().is_empty() {
        return Err(SourceError::NotFound(format!(
            "no element set for satellite {}",
            satellite_id
        )));
    }
    let (name, line1, line2) = split_tle_body(body)?;
    let name = match name {
        Some(name) => name.to_string(),
        None => format!("NORAD-{}", satellite_id),
    };
    let elements = parse_tle(&name, line1, line2)?;
    elements.validate()?;
    Ok(elements)
}

#[async_trait]
impl SourceAdapter for SpaceTrackAdapter {
    fn name(&self) -> &str {
        "spacetrack"
    }

    fn label(&self) -> &str {
        "SPACETRACK"
    }

    fn kind(&self) -> RecordKind {
        RecordKind::ElementSet
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<CanonicalRecord>, SourceError> {
        let satellite_id = &request.satellite.id;
        debug!(satellite_id = %satellite_id, "Fetching Space-Track element set");

        let body = self.get(&self.query_url(satellite_id)).await?;
        let elements = parse_spacetrack_body(&body, satellite_id)?;
        Ok(vec![elements.into()])
    }
}
