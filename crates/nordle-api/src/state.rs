//! Shared application state.

use std::sync::{Arc, Mutex};

use nordle_core::clock::Clock;
use nordle_core::oracle::OracleGateway;
use nordle_core::repository::EventRepository;
use nordle_core::rng::DeterministicRng;
use nordle_oracle::dispatcher::FulfillmentQueue;
use nordle_oracle::sweeper::ExpirySweeper;
use nordle_registry::domain::word_bank::StaticWordBank;

/// Handles to the background oracle machinery.
#[derive(Clone)]
pub struct OracleRuntime {
    /// Producer side of the fulfillment queue drained by the worker.
    pub fulfillment_queue: FulfillmentQueue,
    /// Sweeper that new collections are registered with.
    pub sweeper: Arc<ExpirySweeper>,
    /// Default age for `expire-stale` requests without an explicit age.
    pub request_ttl: chrono::Duration,
}

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Clock for timestamps.
    pub clock: Arc<dyn Clock>,
    /// RNG for random word draws.
    pub rng: Arc<Mutex<dyn DeterministicRng + Send>>,
    /// Event store.
    pub event_repository: Arc<dyn EventRepository>,
    /// Vocabulary for create requests.
    pub word_bank: Arc<StaticWordBank>,
    /// Issues oracle request ids.
    pub oracle: Arc<dyn OracleGateway>,
    /// Queue, sweeper and TTL.
    pub oracle_runtime: OracleRuntime,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        rng: Arc<Mutex<dyn DeterministicRng + Send>>,
        event_repository: Arc<dyn EventRepository>,
        word_bank: Arc<StaticWordBank>,
        oracle: Arc<dyn OracleGateway>,
        oracle_runtime: OracleRuntime,
    ) -> Self {
        Self {
            clock,
            rng,
            event_repository,
            word_bank,
            oracle,
            oracle_runtime,
        }
    }
}
