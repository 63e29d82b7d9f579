use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use orbitwatch_core::{
    create_emission_system, load_config, registrations_from_config, validate_config,
    ChangeDetector, EmissionSink, PollScheduler,
};
use orbitwatch_server::api::create_router;
use orbitwatch_server::create_event_log;
use orbitwatch_server::state::AppState;

/// How long to wait for queued appends on shutdown.
const MONITOR_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("ORBITWATCH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!(
        satellites = config.satellites.len(),
        observers = config.observers.len(),
        config_hash = %orbitwatch_server::state::config_hash(&config),
        "Configuration loaded successfully"
    );

    // Open the event log
    let event_log = create_event_log(&config.emission).context("Failed to open event log")?;
    info!(
        backend = event_log.name(),
        partitions = config.emission.partitions,
        "Event log initialized"
    );

    // Create emission system
    let (gateway, monitor) = create_emission_system(
        event_log,
        config.emission.topics.clone(),
        config.emission.monitor_buffer,
    );
    let emission_stats = Arc::clone(gateway.stats());
    let log_backend = gateway.log_name().to_string();

    // Spawn emission monitor task
    let monitor_handle = tokio::spawn(monitor.run());

    // Change detection over the gateway
    let sink: Arc<dyn EmissionSink> = Arc::new(gateway);
    let detector = Arc::new(ChangeDetector::new(sink));

    // Create scheduler and register configured sources
    let mut scheduler = PollScheduler::new(
        config.scheduler.clone(),
        config.satellites.clone(),
        config.observers.clone(),
        Arc::clone(&detector),
    );
    for registration in registrations_from_config(&config).context("Failed to build sources")? {
        scheduler
            .register(registration)
            .context("Failed to register source")?;
    }
    let scheduler = Arc::new(scheduler);

    scheduler.start().await;

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        Arc::clone(&scheduler),
        emission_stats,
        log_backend,
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    scheduler.stop().await;

    // The gateway lives inside the detector; dropping the last holders closes
    // the queue so the monitor appends what is left and exits.
    drop(scheduler);
    drop(detector);

    match tokio::time::timeout(MONITOR_DRAIN_TIMEOUT, monitor_handle).await {
        Ok(_) => info!("Emission monitor stopped"),
        Err(_) => warn!("Emission monitor did not drain in time"),
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
