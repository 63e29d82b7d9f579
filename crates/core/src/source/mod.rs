//! Telemetry source adapters.
//!
//! A `SourceAdapter` turns one (satellite[, observer]) request into canonical
//! records. The concrete adapters talk to CelesTrak, Space-Track and N2YO over
//! HTTP; anything else can plug in by implementing the trait.

mod celestrak;
mod http;
mod n2yo;
mod spacetrack;
mod types;

pub use celestrak::CelestrakAdapter;
pub use n2yo::{N2yoPassAdapter, N2yoPositionAdapter};
pub use spacetrack::SpaceTrackAdapter;
pub use types::*;
