//! Liveness probe.

use axum::extract::State;
use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::state::AppState;

/// Body of GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `ok` while the process serves requests.
    pub status: &'static str,
    /// Crate version.
    pub version: &'static str,
    /// Words in the loaded bank.
    pub word_bank_size: usize,
    /// Free slots in the fulfillment queue.
    pub queue_headroom: usize,
    /// Collections the expiry sweeper is tracking.
    pub watched_collections: usize,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let runtime = &state.oracle_runtime;
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        word_bank_size: state.word_bank.len(),
        queue_headroom: runtime.fulfillment_queue.remaining_capacity(),
        watched_collections: runtime.sweeper.watched().len(),
    })
}

/// Routes for /health.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
