use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::source::{
    CelestrakAdapter, N2yoPassAdapter, N2yoPositionAdapter, SourceAdapter, SpaceTrackAdapter,
};

use super::SchedulerError;

/// A source to be polled, with its cadence.
#[derive(Clone)]
pub struct SourceRegistration {
    pub adapter: Arc<dyn SourceAdapter>,
    pub interval: Duration,
    /// Whether the source polls from the start.
    pub enabled: bool,
    /// Pass lookahead sent with observer requests.
    pub lookahead_days: u32,
}

impl SourceRegistration {
    pub fn new(adapter: Arc<dyn SourceAdapter>, interval: Duration) -> Self {
        Self {
            adapter,
            // tokio intervals reject a zero period
            interval: interval.max(Duration::from_millis(1)),
            enabled: true,
            lookahead_days: 0,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_lookahead_days(mut self, days: u32) -> Self {
        self.lookahead_days = days;
        self
    }
}

impl std::fmt::Debug for SourceRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistration")
            .field("adapter", &self.adapter.name())
            .field("interval", &self.interval)
            .field("enabled", &self.enabled)
            .field("lookahead_days", &self.lookahead_days)
            .finish()
    }
}

fn init_error(name: &str, e: reqwest::Error) -> SchedulerError {
    SchedulerError::AdapterInit {
        name: name.to_string(),
        reason: e.to_string(),
    }
}

/// Build registrations for every configured source.
///
/// Sources with a config section are registered even when disabled, so they
/// can be switched on at runtime. N2YO yields two sources sharing one config:
/// positions and visual passes.
pub fn registrations_from_config(config: &Config) -> Result<Vec<SourceRegistration>, SchedulerError> {
    let mut registrations = Vec::new();

    if let Some(celestrak) = &config.sources.celestrak {
        let adapter =
            CelestrakAdapter::new(celestrak.clone()).map_err(|e| init_error("celestrak", e))?;
        registrations.push(
            SourceRegistration::new(Arc::new(adapter), Duration::from_secs(celestrak.interval_secs))
                .enabled(celestrak.enabled),
        );
    }

    if let Some(spacetrack) = &config.sources.spacetrack {
        let adapter =
            SpaceTrackAdapter::new(spacetrack.clone()).map_err(|e| init_error("spacetrack", e))?;
        registrations.push(
            SourceRegistration::new(Arc::new(adapter), Duration::from_secs(spacetrack.interval_secs))
                .enabled(spacetrack.enabled),
        );
    }

    if let Some(n2yo) = &config.sources.n2yo {
        let interval = Duration::from_secs(n2yo.interval_secs);
        let positions =
            N2yoPositionAdapter::new(n2yo.clone()).map_err(|e| init_error("n2yo-positions", e))?;
        let passes =
            N2yoPassAdapter::new(n2yo.clone()).map_err(|e| init_error("n2yo-passes", e))?;
        registrations.push(SourceRegistration::new(Arc::new(positions), interval).enabled(n2yo.enabled));
        registrations.push(
            SourceRegistration::new(Arc::new(passes), interval)
                .enabled(n2yo.enabled)
                .with_lookahead_days(n2yo.pass_lookahead_days),
        );
    }

    Ok(registrations)
}
