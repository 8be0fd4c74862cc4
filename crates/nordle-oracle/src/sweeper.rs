//! Periodic expiry of requests the oracle never answered.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use nordle_core::clock::Clock;
use nordle_core::error::DomainError;
use nordle_core::repository::EventRepository;
use nordle_registry::application::command_handlers::handle_expire_stale_requests;
use nordle_registry::domain::commands::ExpireStaleRequests;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Expires stale pending requests in every watched collection.
///
/// Collections are watched when they are opened or first submitted to; the
/// event store has no index of aggregates to scan.
pub struct ExpirySweeper {
    clock: Arc<dyn Clock>,
    repo: Arc<dyn EventRepository>,
    max_age: chrono::Duration,
    watched: Mutex<HashSet<Uuid>>,
}

impl ExpirySweeper {
    /// Creates a sweeper expiring requests older than `max_age`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, repo: Arc<dyn EventRepository>, max_age: chrono::Duration) -> Self {
        Self {
            clock,
            repo,
            max_age,
            watched: Mutex::new(HashSet::new()),
        }
    }

    /// Adds a collection to the sweep set.
    pub fn watch(&self, collection_id: Uuid) {
        self.lock_watched().insert(collection_id);
    }

    /// Returns the watched collections, sorted.
    #[must_use]
    pub fn watched(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.lock_watched().iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn unwatch(&self, collection_id: Uuid) {
        self.lock_watched().remove(&collection_id);
    }

    // Holds only ids, so a poisoned guard is still consistent.
    fn lock_watched(&self) -> MutexGuard<'_, HashSet<Uuid>> {
        self.watched.lock().unwrap_or_else(|poisoned| {
            error!("watched collection lock poisoned; recovering the set");
            poisoned.into_inner()
        })
    }

    /// Runs one pass over every watched collection and returns how many
    /// requests were expired. A failure in one collection does not stop the
    /// pass.
    pub async fn sweep_once(&self) -> usize {
        let mut expired = 0;
        for collection_id in self.watched() {
            let command = ExpireStaleRequests {
                correlation_id: Uuid::new_v4(),
                collection_id,
                max_age: self.max_age,
            };
            match handle_expire_stale_requests(&command, self.clock.as_ref(), self.repo.as_ref()).await {
                Ok(result) => expired += result.expired.len(),
                Err(DomainError::AggregateNotFound(_)) => {
                    warn!(%collection_id, "watched collection has no stream; dropping it");
                    self.unwatch(collection_id);
                }
                Err(e) => {
                    error!(%collection_id, error = %e, "expiry sweep failed");
                }
            }
        }
        debug!(expired, "expiry sweep finished");
        expired
    }

    /// Sweeps every `period` until the task is aborted.
    pub async fn run(self: Arc<Self>, period: Duration) {
        info!(period_secs = period.as_secs(), max_age_secs = self.max_age.num_seconds(), "expiry sweeper started");
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.sweep_once().await;
        }
    }

    /// Spawns [`ExpirySweeper::run`] on the current runtime.
    #[must_use]
    pub fn spawn(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(self.run(period))
    }
}
