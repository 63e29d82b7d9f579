//! Change detection over last-known state.
//!
//! The [`ChangeDetector`] owns the last-known record per dedup key. For each
//! observed record it decides whether the change is meaningful, dispatches an
//! emission if so, and commits the new state, all under the key's shard lock.

mod engine;
mod predicate;
mod state;

pub use engine::{ChangeDetector, Decision};
pub use predicate::has_changed;
pub use state::LastKnownState;
