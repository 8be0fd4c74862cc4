//! Event stores with scripted behavior.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use nordle_core::error::DomainError;
use nordle_core::repository::{EventRepository, StoredEvent};
use uuid::Uuid;

/// Every stream is empty and every append is discarded. Loads through it see
/// an unopened collection.
#[derive(Debug)]
pub struct EmptyEventRepository;

#[async_trait]
impl EventRepository for EmptyEventRepository {
    async fn load_events(&self, _aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(vec![])
    }

    async fn append_events(
        &self,
        _aggregate_id: Uuid,
        _expected_version: i64,
        _events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        Ok(())
    }
}

/// Fails every call as if the database were unreachable.
#[derive(Debug)]
pub struct FailingEventRepository;

#[async_trait]
impl EventRepository for FailingEventRepository {
    async fn load_events(&self, _aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn append_events(
        &self,
        _aggregate_id: Uuid,
        _expected_version: i64,
        _events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}

/// Loses the first `conflicts` append races, then forwards to `inner`.
/// Rejected batches never reach `inner`.
pub struct ConflictingEventRepository {
    inner: Arc<dyn EventRepository>,
    remaining: Mutex<u32>,
    rejected: Mutex<u32>,
}

impl ConflictingEventRepository {
    /// Creates a wrapper that rejects the next `conflicts` appends.
    #[must_use]
    pub fn new(inner: Arc<dyn EventRepository>, conflicts: u32) -> Self {
        Self {
            inner,
            remaining: Mutex::new(conflicts),
            rejected: Mutex::new(0),
        }
    }

    /// Number of appends rejected so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn rejected(&self) -> u32 {
        *self.rejected.lock().unwrap()
    }
}

impl std::fmt::Debug for ConflictingEventRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConflictingEventRepository")
            .field("remaining", &self.remaining)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EventRepository for ConflictingEventRepository {
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        self.inner.load_events(aggregate_id).await
    }

    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        {
            let mut remaining = self.remaining.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                *self.rejected.lock().unwrap() += 1;
                return Err(DomainError::ConcurrencyConflict {
                    aggregate_id,
                    expected: expected_version,
                    actual: expected_version + 1,
                });
            }
        }
        self.inner
            .append_events(aggregate_id, expected_version, events)
            .await
    }
}
