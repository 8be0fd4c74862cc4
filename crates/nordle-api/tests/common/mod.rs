//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use nordle_core::clock::Clock;
use nordle_core::repository::EventRepository;
use nordle_core::rng::DeterministicRng;
use nordle_event_store::memory::InMemoryEventRepository;
use nordle_oracle::dispatcher::{FulfillmentQueue, FulfillmentWorker};
use nordle_oracle::sweeper::ExpirySweeper;
use nordle_registry::domain::commands::FulfillRequest;
use nordle_registry::domain::word_bank::StaticWordBank;
use nordle_test_support::{FixedClock, SequenceRng, SequentialOracleGateway};
use tokio::sync::mpsc;
use tower::ServiceExt;

use nordle_api::build_router;
use nordle_api::state::{AppState, OracleRuntime};

/// Fixed timestamp used across all integration tests.
fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 15, 10, 0, 0).unwrap(),
    ))
}

/// A running app: the router plus the receiving end of its fulfillment
/// queue, so tests decide when queued callbacks are applied.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub repo: Arc<InMemoryEventRepository>,
    fulfillment_rx: mpsc::Receiver<FulfillRequest>,
}

impl TestApp {
    /// Applies every callback queued so far and returns how many changed
    /// state.
    pub async fn drain_fulfillments(&mut self) -> usize {
        let worker = FulfillmentWorker::new(
            self.state.clock.clone(),
            self.state.word_bank.clone(),
            self.state.rng.clone(),
            self.repo.clone(),
        );
        let mut settled = 0;
        while let Ok(command) = self.fulfillment_rx.try_recv() {
            match worker.process(&command).await {
                Ok(result) if !result.outcome.is_noop() => settled += 1,
                _ => {}
            }
        }
        settled
    }
}

/// Build the full app router over an in-memory event store, a fixed clock,
/// the built-in word bank and a gateway issuing `req-1`, `req-2`, ...
pub fn build_test_app() -> TestApp {
    build_test_app_with_rng(SequenceRng::new(vec![]))
}

/// Build the full app with a custom `SequenceRng` for tests that depend on
/// the random word drawn for a create request.
pub fn build_test_app_with_rng(rng: SequenceRng) -> TestApp {
    let clock = fixed_clock();
    let rng: Arc<Mutex<dyn DeterministicRng + Send>> = Arc::new(Mutex::new(rng));
    let repo = Arc::new(InMemoryEventRepository::new());
    let event_repository: Arc<dyn EventRepository> = repo.clone();
    let (fulfillment_queue, fulfillment_rx) = FulfillmentQueue::channel(64);
    let sweeper = Arc::new(ExpirySweeper::new(
        clock.clone(),
        event_repository.clone(),
        chrono::Duration::hours(1),
    ));
    let state = AppState::new(
        clock,
        rng,
        event_repository,
        Arc::new(StaticWordBank::builtin()),
        Arc::new(SequentialOracleGateway::new()),
        OracleRuntime {
            fulfillment_queue,
            sweeper,
            request_ttl: chrono::Duration::hours(1),
        },
    );

    TestApp {
        router: build_router(state.clone()),
        state,
        repo,
        fulfillment_rx,
    }
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: &Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Send a GET request and return the response.
pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Send a GET request and return only the status, for bodiless responses.
pub async fn get_status(app: &Router, uri: &str) -> (StatusCode, axum::body::Bytes) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, response.into_body().collect().await.unwrap().to_bytes())
}

/// Opens a collection and returns its id.
pub async fn open_collection(app: &Router) -> uuid::Uuid {
    let (status, json) = post_json(
        app,
        "/api/v1/collections",
        &serde_json::json!({ "name": "genesis" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json["collection_id"].as_str().unwrap().parse().unwrap()
}
