//! Two-line element (TLE) fixed-column parsing.

use thiserror::Error;

use super::OrbitalElementSet;

#[derive(Debug, Error, PartialEq)]
pub enum TleError {
    #[error("TLE line {line} too short: expected at least {expected} chars, got {actual}")]
    LineTooShort {
        line: u8,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid TLE field {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("Invalid TLE body: {0}")]
    InvalidBody(String),
}

/// Extract a fixed-column field (0-indexed, half-open) and trim it.
fn column<'a>(line: &'a str, line_no: u8, start: usize, end: usize) -> Result<&'a str, TleError> {
    line.get(start..end)
        .map(str::trim)
        .ok_or(TleError::LineTooShort {
            line: line_no,
            expected: end,
            actual: line.len(),
        })
}

fn parse_f64(field: &'static str, raw: &str) -> Result<f64, TleError> {
    raw.parse::<f64>().map_err(|_| TleError::InvalidField {
        field,
        value: raw.to_string(),
    })
}

/// Parse a named TLE into an [`OrbitalElementSet`].
///
/// Every field is required; a short line or an unparsable number fails the
/// whole record.
pub fn parse_tle(name: &str, line1: &str, line2: &str) -> Result<OrbitalElementSet, TleError> {
    let line1 = line1.trim_end();
    let line2 = line2.trim_end();

    let satellite_id = column(line1, 1, 2, 7)?;
    if satellite_id.is_empty() {
        return Err(TleError::InvalidField {
            field: "satellite_id",
            value: satellite_id.to_string(),
        });
    }

    let epoch_year_raw = column(line1, 1, 18, 20)?;
    let epoch_year = epoch_year_raw
        .parse::<u32>()
        .map_err(|_| TleError::InvalidField {
            field: "epoch_year",
            value: epoch_year_raw.to_string(),
        })?;
    let epoch_day = parse_f64("epoch_day", column(line1, 1, 20, 32)?)?;

    let inclination = parse_f64("inclination", column(line2, 2, 8, 16)?)?;
    let raan = parse_f64("raan", column(line2, 2, 17, 25)?)?;
    // Eccentricity is stored with an implied leading decimal point
    let eccentricity_digits = column(line2, 2, 26, 33)?;
    if eccentricity_digits.is_empty() || !eccentricity_digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(TleError::InvalidField {
            field: "eccentricity",
            value: eccentricity_digits.to_string(),
        });
    }
    let eccentricity = parse_f64("eccentricity", &format!("0.{}", eccentricity_digits))?;
    let argument_of_perigee = parse_f64("argument_of_perigee", column(line2, 2, 34, 42)?)?;
    let mean_anomaly = parse_f64("mean_anomaly", column(line2, 2, 43, 51)?)?;
    let mean_motion = parse_f64("mean_motion", column(line2, 2, 52, 63)?)?;

    Ok(OrbitalElementSet {
        satellite_id: satellite_id.to_string(),
        satellite_name: name.trim().to_string(),
        line1: line1.to_string(),
        line2: line2.to_string(),
        epoch_year,
        epoch_day,
        mean_motion,
        eccentricity,
        inclination,
        raan,
        argument_of_perigee,
        mean_anomaly,
        last_updated_ms: chrono::Utc::now().timestamp_millis(),
    })
}

/// Split a TLE response body into an optional name line and the two element lines.
///
/// Accepts both the 3-line form (name, line 1, line 2) and the bare 2-line form.
/// Only the first element set in the body is returned.
pub fn split_tle_body(body: &str) -> Result<(Option<&str>, &str, &str), TleError> {
    let lines: Vec<&str> = body
        .lines()
        .map(|l| l.trim_end())
        .filter(|l| !l.trim().is_empty())
        .collect();

    match lines.as_slice() {
        [l1, l2, ..] if l1.starts_with("1 ") && l2.starts_with("2 ") => Ok((None, *l1, *l2)),
        [name, l1, l2, ..] if l1.starts_with("1 ") && l2.starts_with("2 ") => {
            Ok((Some((*name).trim()), *l1, *l2))
        }
        _ => Err(TleError::InvalidBody(format!(
            "expected a 2- or 3-line element set, got {} line(s)",
            lines.len()
        ))),
    }
}
