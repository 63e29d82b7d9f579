pub mod config;
pub mod detection;
pub mod emission;
pub mod metrics;
pub mod scheduler;
pub mod source;
pub mod telemetry;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, LogBackend,
    ObserverLocation, SanitizedConfig, TrackedSatellite,
};
pub use detection::{ChangeDetector, Decision};
pub use emission::{
    create_emission_system, EmissionError, EmissionGateway, EmissionMonitor, EmissionReceipt,
    EmissionSink, EventLog, MemoryEventLog, SqliteEventLog,
};
pub use scheduler::{
    registrations_from_config, PollScheduler, SchedulerConfig, SchedulerError, SchedulerStatus,
    SourceRegistration,
};
pub use source::{FetchRequest, SourceAdapter, SourceError};
pub use telemetry::{CanonicalRecord, OrbitalElementSet, PassPrediction, PositionFix, RecordKind};
