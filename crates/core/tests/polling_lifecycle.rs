//! Poll scheduler lifecycle integration tests.
//!
//! These tests run the full path with real timers:
//! tick -> adapter fetch -> change detection -> emission -> log

use std::sync::Arc;
use std::time::{Duration, Instant};

use orbitwatch_core::{
    config::TopicConfig,
    create_emission_system,
    emission::{EmissionError, EmissionStats},
    testing::{fixtures, MockEventLog, MockSourceAdapter},
    ChangeDetector, EmissionSink, EventLog, PollScheduler, RecordKind, SchedulerConfig,
    SourceAdapter, SourceError, SourceRegistration,
};

/// Test helper wiring a scheduler to a mock log through the real gateway.
struct TestHarness {
    log: Arc<MockEventLog>,
    detector: Arc<ChangeDetector>,
    stats: Arc<EmissionStats>,
}

impl TestHarness {
    fn new() -> Self {
        let log = Arc::new(MockEventLog::new());
        let (gateway, monitor) = create_emission_system(
            Arc::clone(&log) as Arc<dyn EventLog>,
            TopicConfig::default(),
            100,
        );
        let stats = Arc::clone(gateway.stats());
        tokio::spawn(monitor.run());
        let detector = Arc::new(ChangeDetector::new(Arc::new(gateway) as Arc<dyn EmissionSink>));

        Self {
            log,
            detector,
            stats,
        }
    }

    fn scheduler(&self, satellite_ids: &[&str], grace_ms: u64) -> PollScheduler {
        PollScheduler::new(
            SchedulerConfig {
                shutdown_grace_ms: grace_ms,
            },
            satellite_ids.iter().map(|id| fixtures::satellite(id)).collect(),
            vec![fixtures::observer("Ottawa", 45.0, -75.0)],
            Arc::clone(&self.detector),
        )
    }
}

/// Poll until `check` passes or the timeout elapses.
async fn wait_for<F: Fn() -> bool>(check: F, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

#[tokio::test]
async fn test_first_tick_is_immediate_and_repeats_are_deduplicated() {
    let harness = TestHarness::new();
    let adapter = Arc::new(MockSourceAdapter::element_sets("celestrak"));
    let mut scheduler = harness.scheduler(&["25544", "43013"], 1000);
    scheduler
        .register(SourceRegistration::new(
            Arc::clone(&adapter) as Arc<dyn SourceAdapter>,
            Duration::from_millis(50),
        ))
        .unwrap();

    scheduler.start().await;

    let log = Arc::clone(&harness.log);
    assert!(
        wait_for(|| log.entries("satellite-tle").len() == 2, Duration::from_millis(500)).await,
        "first cycle should emit one event per satellite"
    );

    // Several more ticks with identical data
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(adapter.fetch_count().await >= 4);
    assert_eq!(harness.log.entries("satellite-tle").len(), 2);

    // A real change is emitted on the next tick
    let mut changed = fixtures::element_set("25544", "SAT 25544");
    changed.mean_motion += 0.001;
    adapter.set_records("25544", vec![changed.into()]).await;
    assert!(
        wait_for(|| log.entries("satellite-tle").len() == 3, Duration::from_millis(500)).await,
        "changed element set should be emitted"
    );

    scheduler.stop().await;
    assert!(!scheduler.is_running());
    assert_eq!(harness.detector.tracked_keys(RecordKind::ElementSet), 2);
}

#[tokio::test]
async fn test_overlapping_ticks_are_skipped() {
    let harness = TestHarness::new();
    let adapter = Arc::new(MockSourceAdapter::positions("n2yo-positions"));
    adapter.set_delay(Duration::from_millis(300)).await;

    let mut scheduler = harness.scheduler(&["25544"], 1000);
    scheduler
        .register(SourceRegistration::new(
            Arc::clone(&adapter) as Arc<dyn SourceAdapter>,
            Duration::from_millis(50),
        ))
        .unwrap();

    scheduler.start().await;
    tokio::time::sleep(Duration::from_millis(250)).await;

    let status = scheduler.status();
    let source = &status.sources[0];
    assert_eq!(source.cycles_started, 1);
    assert!(source.cycles_skipped >= 2, "skipped: {}", source.cycles_skipped);
    assert!(source.in_flight);

    scheduler.stop().await;
}

#[tokio::test]
async fn test_sources_tick_independently() {
    let harness = TestHarness::new();
    let slow = Arc::new(MockSourceAdapter::element_sets("slow"));
    slow.set_delay(Duration::from_millis(500)).await;
    let fast = Arc::new(MockSourceAdapter::positions("fast"));

    let mut scheduler = harness.scheduler(&["25544"], 1000);
    scheduler
        .register(SourceRegistration::new(
            Arc::clone(&slow) as Arc<dyn SourceAdapter>,
            Duration::from_millis(50),
        ))
        .unwrap();
    scheduler
        .register(SourceRegistration::new(
            Arc::clone(&fast) as Arc<dyn SourceAdapter>,
            Duration::from_millis(50),
        ))
        .unwrap();

    scheduler.start().await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    // The slow source is stuck in its first cycle; the fast one keeps polling
    assert_eq!(slow.fetch_count().await, 1);
    assert!(fast.fetch_count().await >= 3);

    scheduler.stop().await;
}

#[tokio::test]
async fn test_disabled_source_does_not_poll_until_enabled() {
    let harness = TestHarness::new();
    let adapter = Arc::new(MockSourceAdapter::element_sets("spacetrack"));
    let mut scheduler = harness.scheduler(&["25544"], 1000);
    scheduler
        .register(
            SourceRegistration::new(
                Arc::clone(&adapter) as Arc<dyn SourceAdapter>,
                Duration::from_millis(30),
            )
            .enabled(false),
        )
        .unwrap();

    scheduler.start().await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(adapter.fetch_count().await, 0);

    scheduler.set_enabled("spacetrack", true).unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(adapter.fetch_count().await >= 1);

    scheduler.set_enabled("spacetrack", false).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let count = adapter.fetch_count().await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(adapter.fetch_count().await, count);

    scheduler.stop().await;
}

#[tokio::test]
async fn test_shutdown_abandons_fetches_after_grace() {
    let harness = TestHarness::new();
    let adapter = Arc::new(MockSourceAdapter::element_sets("celestrak"));
    adapter.set_delay(Duration::from_secs(2)).await;

    let mut scheduler = harness.scheduler(&["25544", "43013"], 100);
    scheduler
        .register(SourceRegistration::new(
            Arc::clone(&adapter) as Arc<dyn SourceAdapter>,
            Duration::from_secs(3600),
        ))
        .unwrap();

    scheduler.start().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(scheduler.status().sources[0].in_flight);

    let started = Instant::now();
    scheduler.stop().await;
    assert!(started.elapsed() < Duration::from_millis(1500));

    // Abandoned fetches never reach the detector
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!scheduler.status().sources[0].in_flight);
    assert_eq!(harness.detector.tracked_keys(RecordKind::ElementSet), 0);
    assert!(harness.log.attempts().await.is_empty());
}

#[tokio::test]
async fn test_shutdown_waits_for_short_cycles() {
    let harness = TestHarness::new();
    let adapter = Arc::new(MockSourceAdapter::element_sets("celestrak"));
    adapter.set_delay(Duration::from_millis(100)).await;

    let mut scheduler = harness.scheduler(&["25544"], 2000);
    scheduler
        .register(SourceRegistration::new(
            Arc::clone(&adapter) as Arc<dyn SourceAdapter>,
            Duration::from_secs(3600),
        ))
        .unwrap();

    scheduler.start().await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    scheduler.stop().await;

    assert_eq!(harness.detector.tracked_keys(RecordKind::ElementSet), 1);
}

#[tokio::test]
async fn test_fetches_within_a_cycle_run_concurrently() {
    let harness = TestHarness::new();
    let adapter = Arc::new(MockSourceAdapter::element_sets("celestrak"));
    adapter.set_delay(Duration::from_millis(100)).await;

    let ids: Vec<String> = (0..10).map(|i| format!("{}", 40000 + i)).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let mut scheduler = harness.scheduler(&id_refs, 1000);
    scheduler
        .register(SourceRegistration::new(
            Arc::clone(&adapter) as Arc<dyn SourceAdapter>,
            Duration::from_secs(3600),
        ))
        .unwrap();

    let started = Instant::now();
    let summary = scheduler.poll_now("celestrak").await.unwrap();
    assert_eq!(summary.requests, 10);
    assert_eq!(summary.emitted, 10);
    assert!(started.elapsed() < Duration::from_millis(800));
    assert!(adapter.max_concurrent_fetches() > 1);
}

#[tokio::test]
async fn test_failed_publish_keeps_state() {
    let harness = TestHarness::new();
    harness
        .log
        .set_persistent_error(Some(EmissionError::Unavailable("log offline".to_string())))
        .await;
    let adapter = Arc::new(MockSourceAdapter::positions("n2yo-positions"));

    let mut scheduler = harness.scheduler(&["25544"], 1000);
    scheduler
        .register(SourceRegistration::new(
            Arc::clone(&adapter) as Arc<dyn SourceAdapter>,
            Duration::from_secs(3600),
        ))
        .unwrap();

    let first = scheduler.poll_now("n2yo-positions").await.unwrap();
    assert_eq!(first.emitted, 1);

    let stats = Arc::clone(&harness.stats);
    assert!(wait_for(|| stats.snapshot().failed == 1, Duration::from_millis(500)).await);

    // The cache was updated anyway, so the same fix is not offered again
    let second = scheduler.poll_now("n2yo-positions").await.unwrap();
    assert_eq!(second.emitted, 0);
    assert_eq!(harness.log.attempts().await.len(), 1);
    assert!(harness.log.entries("satellite-position").is_empty());
}

#[tokio::test]
async fn test_adapter_errors_are_isolated_per_satellite() {
    let harness = TestHarness::new();
    let adapter = Arc::new(MockSourceAdapter::element_sets("celestrak"));
    adapter
        .fail_for("99999", SourceError::NotFound("no GP data".to_string()))
        .await;

    let mut scheduler = harness.scheduler(&["25544", "99999", "43013"], 1000);
    scheduler
        .register(SourceRegistration::new(
            Arc::clone(&adapter) as Arc<dyn SourceAdapter>,
            Duration::from_secs(3600),
        ))
        .unwrap();

    let summary = scheduler.poll_now("celestrak").await.unwrap();
    assert_eq!(summary.failures, 1);
    assert_eq!(summary.emitted, 2);

    let log = Arc::clone(&harness.log);
    assert!(wait_for(|| log.entries("satellite-tle").len() == 2, Duration::from_millis(500)).await);

    adapter.clear_failure("99999").await;
    let summary = scheduler.poll_now("celestrak").await.unwrap();
    assert_eq!(summary.failures, 0);
    assert_eq!(summary.emitted, 1);
}
