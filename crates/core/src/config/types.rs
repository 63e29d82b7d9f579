use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::scheduler::SchedulerConfig;
use crate::telemetry::RecordKind;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Satellites polled on every cycle.
    #[serde(default)]
    pub satellites: Vec<TrackedSatellite>,
    /// Observer locations cross-joined with satellites for pass sources.
    #[serde(default)]
    pub observers: Vec<ObserverLocation>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub emission: EmissionConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

/// A satellite the poller tracks.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TrackedSatellite {
    /// NORAD catalog number.
    pub id: String,
    pub name: String,
}

impl TrackedSatellite {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A ground location passes are predicted for.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ObserverLocation {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl ObserverLocation {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Where change events are appended.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogBackend {
    /// In-process log, lost on restart.
    Memory,
    /// SQLite-backed log at `emission.path`.
    Sqlite,
}

/// Event emission configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmissionConfig {
    #[serde(default = "default_backend")]
    pub backend: LogBackend,
    #[serde(default = "default_log_path")]
    pub path: PathBuf,
    /// Partitions per topic; keys are hashed onto partitions.
    #[serde(default = "default_partitions")]
    pub partitions: u32,
    #[serde(default)]
    pub topics: TopicConfig,
    /// Capacity of the channel feeding the emission monitor.
    #[serde(default = "default_monitor_buffer")]
    pub monitor_buffer: usize,
}

impl Default for EmissionConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_log_path(),
            partitions: default_partitions(),
            topics: TopicConfig::default(),
            monitor_buffer: default_monitor_buffer(),
        }
    }
}

fn default_backend() -> LogBackend {
    LogBackend::Sqlite
}

fn default_log_path() -> PathBuf {
    PathBuf::from("orbitwatch.db")
}

fn default_partitions() -> u32 {
    3
}

fn default_monitor_buffer() -> usize {
    1000
}

/// Topic name per record kind.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TopicConfig {
    #[serde(default = "default_element_set_topic")]
    pub element_set: String,
    #[serde(default = "default_position_topic")]
    pub position: String,
    #[serde(default = "default_pass_topic")]
    pub pass: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            element_set: default_element_set_topic(),
            position: default_position_topic(),
            pass: default_pass_topic(),
        }
    }
}

impl TopicConfig {
    /// Topic a record kind is published to.
    pub fn for_kind(&self, kind: RecordKind) -> &str {
        match kind {
            RecordKind::ElementSet => &self.element_set,
            RecordKind::Position => &self.position,
            RecordKind::Pass => &self.pass,
        }
    }
}

fn default_element_set_topic() -> String {
    "satellite-tle".to_string()
}

fn default_position_topic() -> String {
    "satellite-position".to_string()
}

fn default_pass_topic() -> String {
    "satellite-pass".to_string()
}

/// Per-source configuration. A missing section means the source is not registered.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub celestrak: Option<CelestrakConfig>,
    #[serde(default)]
    pub spacetrack: Option<SpaceTrackConfig>,
    #[serde(default)]
    pub n2yo: Option<N2yoConfig>,
}

/// CelesTrak TLE source
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CelestrakConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_celestrak_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_celestrak_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

impl Default for CelestrakConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_celestrak_interval(),
            base_url: default_celestrak_url(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_celestrak_interval() -> u64 {
    3600
}

fn default_celestrak_url() -> String {
    "https://celestrak.org".to_string()
}

/// Space-Track TLE source (session login required)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpaceTrackConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_spacetrack_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_spacetrack_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Default for SpaceTrackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_spacetrack_interval(),
            base_url: default_spacetrack_url(),
            timeout_secs: default_timeout(),
            username: String::new(),
            password: String::new(),
        }
    }
}

fn default_spacetrack_interval() -> u64 {
    3600
}

fn default_spacetrack_url() -> String {
    "https://www.space-track.org".to_string()
}

/// N2YO position and pass source
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct N2yoConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_n2yo_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_n2yo_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    #[serde(default)]
    pub api_key: String,
    /// How many days ahead to ask for visual passes.
    #[serde(default = "default_lookahead_days")]
    pub pass_lookahead_days: u32,
    /// Minimum optical visibility (seconds) for a pass to be reported.
    #[serde(default = "default_min_visibility")]
    pub min_visibility_secs: u32,
}

impl Default for N2yoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_n2yo_interval(),
            base_url: default_n2yo_url(),
            timeout_secs: default_timeout(),
            api_key: String::new(),
            pass_lookahead_days: default_lookahead_days(),
            min_visibility_secs: default_min_visibility(),
        }
    }
}

fn default_n2yo_interval() -> u64 {
    300
}

fn default_n2yo_url() -> String {
    "https://api.n2yo.com/rest/v1/satellite".to_string()
}

fn default_lookahead_days() -> u32 {
    2
}

fn default_min_visibility() -> u32 {
    300
}

fn default_timeout() -> u32 {
    30
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub satellites: Vec<TrackedSatellite>,
    pub observers: Vec<ObserverLocation>,
    pub server: ServerConfig,
    pub scheduler: SchedulerConfig,
    pub emission: EmissionConfig,
    pub sources: SanitizedSourcesConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSourcesConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub celestrak: Option<CelestrakConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spacetrack: Option<SanitizedSpaceTrackConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n2yo: Option<SanitizedN2yoConfig>,
}

/// Space-Track config with the password hidden
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSpaceTrackConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub base_url: String,
    pub username: String,
    pub password_configured: bool,
}

/// N2YO config with the API key hidden
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedN2yoConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub base_url: String,
    pub api_key_configured: bool,
    pub pass_lookahead_days: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            satellites: config.satellites.clone(),
            observers: config.observers.clone(),
            server: config.server.clone(),
            scheduler: config.scheduler.clone(),
            emission: config.emission.clone(),
            sources: SanitizedSourcesConfig {
                celestrak: config.sources.celestrak.clone(),
                spacetrack: config.sources.spacetrack.as_ref().map(|s| {
                    SanitizedSpaceTrackConfig {
                        enabled: s.enabled,
                        interval_secs: s.interval_secs,
                        base_url: s.base_url.clone(),
                        username: s.username.clone(),
                        password_configured: !s.password.is_empty(),
                    }
                }),
                n2yo: config.sources.n2yo.as_ref().map(|n| SanitizedN2yoConfig {
                    enabled: n.enabled,
                    interval_secs: n.interval_secs,
                    base_url: n.base_url.clone(),
                    api_key_configured: !n.api_key.is_empty(),
                    pass_lookahead_days: n.pass_lookahead_days,
                }),
            },
        }
    }
}
