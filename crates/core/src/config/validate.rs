use std::collections::HashSet;

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Satellite ids are non-empty and unique
/// - Observer coordinates are in range
/// - Enabled sources have a non-zero interval and their credentials
/// - Emission partitions and server port are not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for satellite in &config.satellites {
        if satellite.id.trim().is_empty() {
            return Err(invalid("satellites: id cannot be empty"));
        }
        if !seen.insert(satellite.id.as_str()) {
            return Err(invalid(format!(
                "satellites: duplicate id {}",
                satellite.id
            )));
        }
    }

    for observer in &config.observers {
        if !(-90.0..=90.0).contains(&observer.latitude) {
            return Err(invalid(format!(
                "observers.{}: latitude {} out of range",
                observer.name, observer.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&observer.longitude) {
            return Err(invalid(format!(
                "observers.{}: longitude {} out of range",
                observer.name, observer.longitude
            )));
        }
    }

    if let Some(celestrak) = &config.sources.celestrak {
        if celestrak.enabled && celestrak.interval_secs == 0 {
            return Err(invalid("sources.celestrak.interval_secs cannot be 0"));
        }
    }

    if let Some(spacetrack) = &config.sources.spacetrack {
        if spacetrack.enabled {
            if spacetrack.interval_secs == 0 {
                return Err(invalid("sources.spacetrack.interval_secs cannot be 0"));
            }
            if spacetrack.username.is_empty() || spacetrack.password.is_empty() {
                return Err(invalid(
                    "sources.spacetrack requires username and password when enabled",
                ));
            }
        }
    }

    if let Some(n2yo) = &config.sources.n2yo {
        if n2yo.enabled {
            if n2yo.interval_secs == 0 {
                return Err(invalid("sources.n2yo.interval_secs cannot be 0"));
            }
            if n2yo.api_key.is_empty() {
                return Err(invalid("sources.n2yo.api_key is required when enabled"));
            }
        }
    }

    if config.emission.partitions == 0 {
        return Err(invalid("emission.partitions cannot be 0"));
    }

    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    Ok(())
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}
