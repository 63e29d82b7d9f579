//! Poll scheduler implementation.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::{ObserverLocation, TrackedSatellite};
use crate::detection::ChangeDetector;
use crate::metrics;
use crate::source::{FetchRequest, SourceAdapter};

use super::{
    CycleSummary, SchedulerConfig, SchedulerError, SchedulerStatus, SourceRegistration,
    SourceStatus,
};

/// Per-source counters. Timestamps are unix ms, 0 meaning never.
#[derive(Default)]
struct SourceStats {
    cycles_started: AtomicU64,
    cycles_skipped: AtomicU64,
    fetch_failures: AtomicU64,
    last_cycle_started_ms: AtomicI64,
    last_cycle_finished_ms: AtomicI64,
}

fn timestamp(ms: &AtomicI64) -> Option<DateTime<Utc>> {
    match ms.load(Ordering::Relaxed) {
        0 => None,
        ms => DateTime::from_timestamp_millis(ms),
    }
}

struct RegisteredSource {
    adapter: Arc<dyn SourceAdapter>,
    interval: Duration,
    lookahead_days: u32,
    enabled: AtomicBool,
    in_flight: AtomicBool,
    stats: SourceStats,
}

impl RegisteredSource {
    fn name(&self) -> &str {
        self.adapter.name()
    }

    /// Claim the in-flight slot without waiting.
    fn try_begin_cycle(self: &Arc<Self>) -> Option<InFlightGuard> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard(Arc::clone(self)))
    }

    fn status(&self) -> SourceStatus {
        SourceStatus {
            name: self.name().to_string(),
            label: self.adapter.label().to_string(),
            kind: self.adapter.kind(),
            enabled: self.enabled.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            interval_secs: self.interval.as_secs_f64(),
            cycles_started: self.stats.cycles_started.load(Ordering::Relaxed),
            cycles_skipped: self.stats.cycles_skipped.load(Ordering::Relaxed),
            fetch_failures: self.stats.fetch_failures.load(Ordering::Relaxed),
            last_cycle_started_at: timestamp(&self.stats.last_cycle_started_ms),
            last_cycle_finished_at: timestamp(&self.stats.last_cycle_finished_ms),
        }
    }
}

/// Clears the source's in-flight flag when the cycle ends or is dropped.
struct InFlightGuard(Arc<RegisteredSource>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::Release);
    }
}

/// What every cycle fans out over.
struct Targets {
    satellites: Vec<TrackedSatellite>,
    observers: Vec<ObserverLocation>,
}

impl Targets {
    fn requests_for(&self, source: &RegisteredSource) -> Vec<FetchRequest> {
        if source.adapter.needs_observer() {
            self.satellites
                .iter()
                .flat_map(|satellite| {
                    self.observers.iter().map(move |observer| {
                        FetchRequest::for_satellite(satellite.clone())
                            .with_observer(observer.clone(), source.lookahead_days)
                    })
                })
                .collect()
        } else {
            self.satellites
                .iter()
                .cloned()
                .map(FetchRequest::for_satellite)
                .collect()
        }
    }
}

/// Drives independent periodic fetch cycles per registered source.
pub struct PollScheduler {
    config: SchedulerConfig,
    targets: Arc<Targets>,
    detector: Arc<ChangeDetector>,
    sources: Vec<Arc<RegisteredSource>>,

    // Runtime state
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    loops: Mutex<Vec<JoinHandle<()>>>,
    /// Cycles started through `poll_now`, so `stop` can bound them too.
    manual: Mutex<JoinSet<()>>,
}

impl PollScheduler {
    /// Create a scheduler with no sources registered.
    pub fn new(
        config: SchedulerConfig,
        satellites: Vec<TrackedSatellite>,
        observers: Vec<ObserverLocation>,
        detector: Arc<ChangeDetector>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            targets: Arc::new(Targets {
                satellites,
                observers,
            }),
            detector,
            sources: Vec::new(),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            loops: Mutex::new(Vec::new()),
            manual: Mutex::new(JoinSet::new()),
        }
    }

    /// Register a source. Names must be unique.
    pub fn register(&mut self, registration: SourceRegistration) -> Result<(), SchedulerError> {
        let name = registration.adapter.name().to_string();
        if self.sources.iter().any(|s| s.name() == name) {
            return Err(SchedulerError::DuplicateSource(name));
        }

        info!(
            source = %name,
            interval_secs = registration.interval.as_secs_f64(),
            enabled = registration.enabled,
            "Registered source"
        );
        self.sources.push(Arc::new(RegisteredSource {
            adapter: registration.adapter,
            interval: registration.interval,
            lookahead_days: registration.lookahead_days,
            enabled: AtomicBool::new(registration.enabled),
            in_flight: AtomicBool::new(false),
            stats: SourceStats::default(),
        }));
        Ok(())
    }

    pub fn detector(&self) -> &Arc<ChangeDetector> {
        &self.detector
    }

    /// Start one poll loop per registered source.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Poll scheduler already running");
            return;
        }

        info!(sources = self.sources.len(), "Starting poll scheduler");

        let mut loops = self.loops.lock().await;
        for source in &self.sources {
            loops.push(self.spawn_source_loop(Arc::clone(source)));
        }

        info!("Poll scheduler started");
    }

    /// Stop all loops.
    ///
    /// In-flight cycles, scheduled or started through `poll_now`, get
    /// `shutdown_grace_ms` to finish; whatever is still outstanding after
    /// that is aborted and makes no change decision.
    pub async fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("Stopping poll scheduler");

            // Signal shutdown to all loops
            let _ = self.shutdown_tx.send(());

            let loops: Vec<_> = self.loops.lock().await.drain(..).collect();
            for handle in loops {
                if let Err(e) = handle.await {
                    error!("Poll loop ended abnormally: {}", e);
                }
            }
        } else {
            warn!("Poll scheduler not running");
        }

        self.drain_manual_polls().await;
        info!("Poll scheduler stopped");
    }

    /// Wait out outstanding manual cycles, aborting any past the grace period.
    async fn drain_manual_polls(&self) {
        let mut manual = std::mem::take(&mut *self.manual.lock().await);
        if manual.is_empty() {
            return;
        }

        let grace = Duration::from_millis(self.config.shutdown_grace_ms);
        let finished = tokio::time::timeout(grace, async {
            while manual.join_next().await.is_some() {}
        })
        .await;
        if finished.is_err() {
            warn!(
                outstanding = manual.len(),
                grace_ms = grace.as_millis() as u64,
                "Abandoning manual cycles after shutdown grace period"
            );
            manual.shutdown().await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Enable or disable a source at runtime.
    ///
    /// Disabling stops new ticks only; a cycle already running completes.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<(), SchedulerError> {
        let source = self.find(name)?;
        let previous = source.enabled.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            info!(source = %name, enabled, "Source toggled");
        }
        Ok(())
    }

    /// Run one cycle for a source right now and wait for it.
    ///
    /// Subject to the same in-flight rule and shutdown grace period as
    /// scheduled ticks.
    pub async fn poll_now(&self, name: &str) -> Result<CycleSummary, SchedulerError> {
        let source = self.find(name)?;
        let guard = source
            .try_begin_cycle()
            .ok_or_else(|| SchedulerError::CycleInFlight(name.to_string()))?;

        let cycle = run_cycle(
            Arc::clone(source),
            Arc::clone(&self.targets),
            Arc::clone(&self.detector),
            guard,
        );
        let (tx, rx) = oneshot::channel();
        {
            let mut manual = self.manual.lock().await;
            // Reap cycles that already finished
            while manual.try_join_next().is_some() {}
            manual.spawn(async move {
                let _ = tx.send(cycle.await);
            });
        }

        // The sender is dropped unsent only if `stop` aborted the cycle
        rx.await
            .map_err(|_| SchedulerError::Cancelled(name.to_string()))
    }

    /// Get current scheduler status.
    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            running: self.is_running(),
            sources: self.sources.iter().map(|s| s.status()).collect(),
        }
    }

    fn find(&self, name: &str) -> Result<&Arc<RegisteredSource>, SchedulerError> {
        self.sources
            .iter()
            .find(|s| s.name() == name)
            .ok_or_else(|| SchedulerError::UnknownSource(name.to_string()))
    }

    /// Spawn the tick loop for one source.
    fn spawn_source_loop(&self, source: Arc<RegisteredSource>) -> JoinHandle<()> {
        let targets = Arc::clone(&self.targets);
        let detector = Arc::clone(&self.detector);
        let grace = Duration::from_millis(self.config.shutdown_grace_ms);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let name = source.name().to_string();
            info!(source = %name, "Poll loop started");

            // The first tick completes immediately
            let mut ticker = tokio::time::interval(source.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut current: Option<JoinHandle<CycleSummary>> = None;

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!(source = %name, "Poll loop received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        if !source.enabled.load(Ordering::Relaxed) {
                            debug!(source = %name, "Source disabled, skipping tick");
                            continue;
                        }
                        let Some(guard) = source.try_begin_cycle() else {
                            source.stats.cycles_skipped.fetch_add(1, Ordering::Relaxed);
                            metrics::CYCLES_SKIPPED.with_label_values(&[&name]).inc();
                            warn!(source = %name, "Previous cycle still in flight, skipping tick");
                            continue;
                        };
                        current = Some(tokio::spawn(run_cycle(
                            Arc::clone(&source),
                            Arc::clone(&targets),
                            Arc::clone(&detector),
                            guard,
                        )));
                    }
                }
            }

            if let Some(mut handle) = current.filter(|h| !h.is_finished()) {
                match tokio::time::timeout(grace, &mut handle).await {
                    Ok(_) => info!(source = %name, "In-flight cycle finished during shutdown"),
                    Err(_) => {
                        warn!(
                            source = %name,
                            grace_ms = grace.as_millis() as u64,
                            "Abandoning in-flight cycle after shutdown grace period"
                        );
                        handle.abort();
                    }
                }
            }
            info!(source = %name, "Poll loop stopped");
        })
    }
}

/// Run one cycle: fan out every request, route results to the detector.
///
/// Dropping this future aborts all outstanding fetches.
async fn run_cycle(
    source: Arc<RegisteredSource>,
    targets: Arc<Targets>,
    detector: Arc<ChangeDetector>,
    _guard: InFlightGuard,
) -> CycleSummary {
    let name = source.name().to_string();
    let started = Instant::now();
    source.stats.cycles_started.fetch_add(1, Ordering::Relaxed);
    source
        .stats
        .last_cycle_started_ms
        .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    metrics::CYCLES_STARTED.with_label_values(&[&name]).inc();

    let requests = targets.requests_for(&source);
    let mut summary = CycleSummary {
        requests: requests.len(),
        ..Default::default()
    };
    debug!(source = %name, requests = summary.requests, "Poll cycle started");

    let mut tasks = JoinSet::new();
    for request in requests {
        let adapter = Arc::clone(&source.adapter);
        let detector = Arc::clone(&detector);
        tasks.spawn(async move { fetch_and_observe(adapter.as_ref(), &detector, &request).await });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Some(emitted)) => summary.emitted += emitted,
            Ok(None) => summary.failures += 1,
            Err(e) => {
                error!(source = %name, "Fetch task failed: {}", e);
                summary.failures += 1;
            }
        }
    }

    source
        .stats
        .fetch_failures
        .fetch_add(summary.failures as u64, Ordering::Relaxed);
    source
        .stats
        .last_cycle_finished_ms
        .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    info!(
        source = %name,
        requests = summary.requests,
        failures = summary.failures,
        emitted = summary.emitted,
        duration_ms = started.elapsed().as_millis() as u64,
        "Poll cycle finished"
    );
    summary
}

/// Fetch one request and feed every record to the detector.
///
/// Returns how many records were emitted, or `None` if the fetch failed.
async fn fetch_and_observe(
    adapter: &dyn SourceAdapter,
    detector: &ChangeDetector,
    request: &FetchRequest,
) -> Option<usize> {
    let source = adapter.name();
    let start = Instant::now();
    let result = adapter.fetch(request).await;
    metrics::FETCH_DURATION
        .with_label_values(&[source])
        .observe(start.elapsed().as_secs_f64());

    match result {
        Ok(records) => {
            metrics::FETCHES_TOTAL
                .with_label_values(&[source, "ok"])
                .inc();
            let emitted = records
                .into_iter()
                .map(|record| detector.observe(record, adapter.label()))
                .filter(|decision| decision.emitted())
                .count();
            Some(emitted)
        }
        Err(e) => {
            metrics::FETCHES_TOTAL
                .with_label_values(&[source, e.kind()])
                .inc();
            warn!(
                source = %source,
                satellite_id = %request.satellite.id,
                observer = request.observer.as_ref().map(|o| o.name.as_str()).unwrap_or("-"),
                "Fetch failed: {}",
                e
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emission::EmissionSink;
    use crate::source::SourceError;
    use crate::telemetry::RecordKind;
    use crate::testing::{fixtures, MockEmissionSink, MockSourceAdapter};

    fn scheduler_with(
        adapter: Arc<MockSourceAdapter>,
        satellites: Vec<TrackedSatellite>,
        observers: Vec<ObserverLocation>,
    ) -> (PollScheduler, Arc<MockEmissionSink>) {
        let sink = Arc::new(MockEmissionSink::new());
        let detector = Arc::new(ChangeDetector::new(Arc::clone(&sink) as Arc<dyn EmissionSink>));
        let mut scheduler =
            PollScheduler::new(SchedulerConfig::default(), satellites, observers, detector);
        scheduler
            .register(SourceRegistration::new(adapter, Duration::from_secs(3600)))
            .unwrap();
        (scheduler, sink)
    }

    #[tokio::test]
    async fn test_poll_now_fans_out_per_satellite() {
        let adapter = Arc::new(MockSourceAdapter::element_sets("mock"));
        let (scheduler, sink) = scheduler_with(
            Arc::clone(&adapter),
            vec![
                TrackedSatellite::new("25544", "ISS"),
                TrackedSatellite::new("43013", "NOAA 20"),
            ],
            vec![ObserverLocation::new("Ottawa", 45.0, -75.0)],
        );

        let summary = scheduler.poll_now("mock").await.unwrap();
        assert_eq!(summary.requests, 2);
        assert_eq!(summary.emitted, 2);
        assert_eq!(adapter.fetch_count().await, 2);
        assert_eq!(sink.dispatch_count(), 2);

        // Same data again: nothing new
        let summary = scheduler.poll_now("mock").await.unwrap();
        assert_eq!(summary.emitted, 0);
    }

    #[tokio::test]
    async fn test_pass_source_cross_joins_observers() {
        let adapter = Arc::new(MockSourceAdapter::passes("passes"));
        let (scheduler, _sink) = scheduler_with(
            Arc::clone(&adapter),
            vec![
                TrackedSatellite::new("25544", "ISS"),
                TrackedSatellite::new("43013", "NOAA 20"),
            ],
            vec![
                ObserverLocation::new("Ottawa", 45.0, -75.0),
                ObserverLocation::new("Quito", -0.18, -78.47),
                ObserverLocation::new("Oslo", 59.9, 10.7),
            ],
        );

        let summary = scheduler.poll_now("passes").await.unwrap();
        assert_eq!(summary.requests, 6);
        let requests = adapter.recorded_requests().await;
        assert!(requests.iter().all(|r| r.observer.is_some()));
    }

    #[tokio::test]
    async fn test_failure_does_not_block_siblings() {
        let adapter = Arc::new(MockSourceAdapter::element_sets("mock"));
        adapter
            .fail_for("43013", SourceError::Transient("timeout".to_string()))
            .await;
        let (scheduler, sink) = scheduler_with(
            Arc::clone(&adapter),
            vec![
                TrackedSatellite::new("25544", "ISS"),
                TrackedSatellite::new("43013", "NOAA 20"),
            ],
            vec![],
        );

        let summary = scheduler.poll_now("mock").await.unwrap();
        assert_eq!(summary.failures, 1);
        assert_eq!(summary.emitted, 1);
        assert_eq!(sink.dispatch_count(), 1);
        assert_eq!(scheduler.status().sources[0].fetch_failures, 1);
    }

    #[tokio::test]
    async fn test_unknown_source() {
        let adapter = Arc::new(MockSourceAdapter::element_sets("mock"));
        let (scheduler, _) = scheduler_with(adapter, vec![], vec![]);
        assert_eq!(
            scheduler.set_enabled("nope", false),
            Err(SchedulerError::UnknownSource("nope".to_string()))
        );
        assert!(matches!(
            scheduler.poll_now("nope").await,
            Err(SchedulerError::UnknownSource(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let adapter = Arc::new(MockSourceAdapter::element_sets("mock"));
        let (mut scheduler, _) = scheduler_with(Arc::clone(&adapter), vec![], vec![]);
        let err = scheduler
            .register(SourceRegistration::new(adapter, Duration::from_secs(1)))
            .unwrap_err();
        assert_eq!(err, SchedulerError::DuplicateSource("mock".to_string()));
    }

    #[tokio::test]
    async fn test_poll_now_rejected_while_in_flight() {
        let adapter = Arc::new(MockSourceAdapter::element_sets("slow"));
        adapter.set_delay(Duration::from_millis(200)).await;
        let (scheduler, _) = scheduler_with(
            Arc::clone(&adapter),
            vec![TrackedSatellite::new("25544", "ISS")],
            vec![],
        );
        let scheduler = Arc::new(scheduler);

        let background = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.poll_now("slow").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(
            scheduler.poll_now("slow").await,
            Err(SchedulerError::CycleInFlight("slow".to_string()))
        );
        assert!(scheduler.status().sources[0].in_flight);

        background.await.unwrap().unwrap();
        assert!(!scheduler.status().sources[0].in_flight);
    }

    #[tokio::test]
    async fn test_stop_aborts_manual_cycle_after_grace() {
        let adapter = Arc::new(MockSourceAdapter::element_sets("slow"));
        adapter.set_delay(Duration::from_secs(30)).await;
        let sink = Arc::new(MockEmissionSink::new());
        let detector = Arc::new(ChangeDetector::new(Arc::clone(&sink) as Arc<dyn EmissionSink>));
        let config = SchedulerConfig {
            shutdown_grace_ms: 50,
        };
        let mut scheduler = PollScheduler::new(
            config,
            vec![TrackedSatellite::new("25544", "ISS")],
            vec![],
            detector,
        );
        scheduler
            .register(
                SourceRegistration::new(Arc::clone(&adapter) as Arc<dyn SourceAdapter>, Duration::from_secs(3600))
                    .enabled(false),
            )
            .unwrap();
        let scheduler = Arc::new(scheduler);
        scheduler.start().await;

        let manual = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.poll_now("slow").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(scheduler.status().sources[0].in_flight);

        tokio::time::timeout(Duration::from_secs(5), scheduler.stop())
            .await
            .expect("stop should not wait for the whole fetch");

        assert_eq!(
            manual.await.unwrap(),
            Err(SchedulerError::Cancelled("slow".to_string()))
        );
        assert!(!scheduler.status().sources[0].in_flight);
        assert_eq!(sink.dispatch_count(), 0);
    }

    #[tokio::test]
    async fn test_stop_lets_short_manual_cycle_finish() {
        let adapter = Arc::new(MockSourceAdapter::element_sets("mock"));
        adapter.set_delay(Duration::from_millis(50)).await;
        let (scheduler, sink) = scheduler_with(
            Arc::clone(&adapter),
            vec![TrackedSatellite::new("25544", "ISS")],
            vec![],
        );
        let scheduler = Arc::new(scheduler);

        let manual = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.poll_now("mock").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        scheduler.stop().await;

        let summary = manual.await.unwrap().unwrap();
        assert_eq!(summary.emitted, 1);
        assert_eq!(sink.dispatch_count(), 1);
    }

    #[tokio::test]
    async fn test_status_reports_sources() {
        let adapter = Arc::new(MockSourceAdapter::positions("n2yo-positions"));
        let (scheduler, _) = scheduler_with(adapter, vec![], vec![]);
        scheduler.set_enabled("n2yo-positions", false).unwrap();

        let status = scheduler.status();
        assert!(!status.running);
        assert_eq!(status.sources.len(), 1);
        assert_eq!(status.sources[0].kind, RecordKind::Position);
        assert!(!status.sources[0].enabled);
        assert_eq!(status.sources[0].interval_secs, 3600.0);
    }

    #[tokio::test]
    async fn test_records_are_observed_with_adapter_label() {
        let adapter = Arc::new(MockSourceAdapter::element_sets("mock"));
        adapter
            .set_records("25544", vec![fixtures::iss_elements().into()])
            .await;
        let (scheduler, sink) = scheduler_with(
            adapter,
            vec![TrackedSatellite::new("25544", "ISS")],
            vec![],
        );

        scheduler.poll_now("mock").await.unwrap();
        let dispatched = sink.dispatched();
        assert_eq!(dispatched.len(), 1);
        assert_eq!(dispatched[0].1, "MOCK");
    }
}
