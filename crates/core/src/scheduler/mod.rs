//! Periodic polling of telemetry sources.
//!
//! Every registered source gets its own loop and interval:
//! - **Ticks**: independent per source; the first fires immediately
//! - **Cycles**: one fetch per satellite (per satellite and observer for pass
//!   sources), all concurrent, each routed to the change detector
//! - **Overlap**: a tick that arrives while the previous cycle is still running
//!   is skipped and counted

mod config;
mod registration;
mod runner;
mod types;

pub use config::SchedulerConfig;
pub use registration::{registrations_from_config, SourceRegistration};
pub use runner::PollScheduler;
pub use types::{CycleSummary, SchedulerError, SchedulerStatus, SourceStatus};
