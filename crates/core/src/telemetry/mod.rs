//! Canonical telemetry model.
//!
//! Every source adapter normalizes its response into one of the record types
//! defined here, so the rest of the system never sees source-specific layouts.

mod keys;
mod tle;
mod types;

pub use keys::{pass_dedup_key, pass_log_key, quantize_coordinate};
pub use tle::{parse_tle, split_tle_body, TleError};
pub use types::*;
