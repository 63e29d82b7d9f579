//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that builds the router in-process
//! over a real detector and emission gateway, with mock sources and a mock
//! event log injected in place of the network and the database.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use orbitwatch_core::config::{SourcesConfig, SpaceTrackConfig, TopicConfig};
use orbitwatch_core::emission::EmissionStats;
use orbitwatch_core::testing::{MockEventLog, MockSourceAdapter};
use orbitwatch_core::{
    create_emission_system, ChangeDetector, Config, EmissionSink, PollScheduler, SchedulerConfig,
    SourceRegistration,
};
use orbitwatch_server::state::AppState;

/// Re-export fixtures for test convenience
pub use orbitwatch_core::testing::fixtures;

/// Test fixture for API testing with mock dependencies.
///
/// The scheduler is built but not started, so cycles only run through
/// `POST /api/v1/sources/{name}/poll` and tests stay deterministic.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Element-set source registered as "celestrak"
    pub elements: Arc<MockSourceAdapter>,
    /// Pass source registered as "n2yo-passes"
    pub passes: Arc<MockSourceAdapter>,
    /// Event log behind the emission gateway
    pub event_log: Arc<MockEventLog>,
    pub scheduler: Arc<PollScheduler>,
    pub emission_stats: Arc<EmissionStats>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub async fn new() -> Self {
        let config = Config {
            satellites: vec![fixtures::satellite("25544"), fixtures::satellite("43013")],
            observers: vec![fixtures::observer("Ottawa", 45.0, -75.0)],
            sources: SourcesConfig {
                spacetrack: Some(SpaceTrackConfig {
                    enabled: false,
                    username: "observer@example.com".to_string(),
                    password: "hunter2".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        };

        let event_log = Arc::new(MockEventLog::new());
        let (gateway, monitor) =
            create_emission_system(event_log.clone(), TopicConfig::default(), 100);
        let emission_stats = Arc::clone(gateway.stats());
        tokio::spawn(monitor.run());

        let sink: Arc<dyn EmissionSink> = Arc::new(gateway);
        let detector = Arc::new(ChangeDetector::new(sink));

        let elements = Arc::new(MockSourceAdapter::element_sets("celestrak"));
        let passes = Arc::new(MockSourceAdapter::passes("n2yo-passes"));

        let mut scheduler = PollScheduler::new(
            SchedulerConfig::default(),
            config.satellites.clone(),
            config.observers.clone(),
            detector,
        );
        scheduler
            .register(SourceRegistration::new(
                elements.clone(),
                Duration::from_secs(3600),
            ))
            .expect("Failed to register celestrak");
        scheduler
            .register(
                SourceRegistration::new(passes.clone(), Duration::from_secs(3600))
                    .enabled(false)
                    .with_lookahead_days(2),
            )
            .expect("Failed to register n2yo-passes");
        let scheduler = Arc::new(scheduler);

        let state = Arc::new(AppState::new(
            config,
            Arc::clone(&scheduler),
            Arc::clone(&emission_stats),
            "mock",
        ));

        // Create router
        let router = orbitwatch_server::api::create_router(state);

        Self {
            router,
            elements,
            passes,
            event_log,
            scheduler,
            emission_stats,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path).await
    }

    /// Send a POST request with an empty body.
    pub async fn post(&self, path: &str) -> TestResponse {
        self.request("POST", path).await
    }

    /// Send a GET request and return the raw body text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let (status, bytes) = self.send("GET", path).await;
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Wait until the emission monitor has recorded `count` successful publishes.
    pub async fn wait_for_published(&self, count: u64) {
        for _ in 0..100 {
            if self.emission_stats.snapshot().published >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "Timed out waiting for {} publishes, have {:?}",
            count,
            self.emission_stats.snapshot()
        );
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str) -> TestResponse {
        let (status, body_bytes) = self.send(method, path).await;

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }

    async fn send(&self, method: &str, path: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        (status, body_bytes.to_vec())
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
