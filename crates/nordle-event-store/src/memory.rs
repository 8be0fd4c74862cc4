//! In-process implementation of the `EventRepository` trait.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use nordle_core::error::DomainError;
use nordle_core::repository::{EventRepository, StoredEvent};

/// Event repository holding every stream in memory.
///
/// The write lock is held for the whole version check and append, so a
/// batch is either stored entirely or not at all.
#[derive(Debug, Default)]
pub struct InMemoryEventRepository {
    streams: RwLock<HashMap<Uuid, Vec<StoredEvent>>>,
}

impl InMemoryEventRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events stored for `aggregate_id`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the lock is poisoned.
    pub fn stream_len(&self, aggregate_id: Uuid) -> Result<usize, DomainError> {
        let streams = self.streams.read().map_err(poisoned)?;
        Ok(streams.get(&aggregate_id).map_or(0, Vec::len))
    }
}

fn poisoned<T>(err: std::sync::PoisonError<T>) -> DomainError {
    DomainError::Infrastructure(format!("event stream lock poisoned: {err}"))
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        let streams = self.streams.read().map_err(poisoned)?;
        Ok(streams.get(&aggregate_id).cloned().unwrap_or_default())
    }

    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        let mut streams = self.streams.write().map_err(poisoned)?;
        let stream = streams.entry(aggregate_id).or_default();
        let actual = stream.last().map_or(0, |e| e.sequence_number);
        if actual != expected_version {
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual,
            });
        }
        let mut next = expected_version;
        for event in events {
            next += 1;
            if event.aggregate_id != aggregate_id || event.sequence_number != next {
                return Err(DomainError::Infrastructure(format!(
                    "event {} does not continue stream {aggregate_id} at sequence {next}",
                    event.event_id
                )));
            }
        }
        stream.extend_from_slice(events);
        tracing::trace!(%aggregate_id, appended = events.len(), "events appended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nordle_test_support::fixed_now;

    fn make_stored_event(aggregate_id: Uuid, sequence_number: i64) -> StoredEvent {
        StoredEvent {
            event_id: Uuid::new_v4(),
            aggregate_id,
            event_type: "TestEvent".to_string(),
            payload: serde_json::json!({"key": "value"}),
            sequence_number,
            correlation_id: Uuid::new_v4(),
            causation_id: Uuid::new_v4(),
            occurred_at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn test_load_events_returns_empty_vec_for_nonexistent_aggregate() {
        let repo = InMemoryEventRepository::new();

        let events = repo.load_events(Uuid::new_v4()).await.unwrap();

        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_append_multiple_events_preserves_sequence_order() {
        let repo = InMemoryEventRepository::new();
        let aggregate_id = Uuid::new_v4();
        let events = vec![
            make_stored_event(aggregate_id, 1),
            make_stored_event(aggregate_id, 2),
            make_stored_event(aggregate_id, 3),
        ];

        repo.append_events(aggregate_id, 0, &events).await.unwrap();

        let loaded = repo.load_events(aggregate_id).await.unwrap();
        assert_eq!(loaded, events);
    }

    #[tokio::test]
    async fn test_stale_expected_version_is_a_conflict_and_stores_nothing() {
        let repo = InMemoryEventRepository::new();
        let aggregate_id = Uuid::new_v4();
        repo.append_events(aggregate_id, 0, &[make_stored_event(aggregate_id, 1)])
            .await
            .unwrap();

        let result = repo
            .append_events(
                aggregate_id,
                0,
                &[
                    make_stored_event(aggregate_id, 1),
                    make_stored_event(aggregate_id, 2),
                ],
            )
            .await;

        match result {
            Err(DomainError::ConcurrencyConflict {
                expected, actual, ..
            }) => {
                assert_eq!(expected, 0);
                assert_eq!(actual, 1);
            }
            other => panic!("expected ConcurrencyConflict, got {other:?}"),
        }
        assert_eq!(repo.stream_len(aggregate_id).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_gap_in_sequence_numbers_is_rejected_atomically() {
        let repo = InMemoryEventRepository::new();
        let aggregate_id = Uuid::new_v4();

        let result = repo
            .append_events(
                aggregate_id,
                0,
                &[
                    make_stored_event(aggregate_id, 1),
                    make_stored_event(aggregate_id, 3),
                ],
            )
            .await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
        assert_eq!(repo.stream_len(aggregate_id).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_aggregate_isolation() {
        let repo = InMemoryEventRepository::new();
        let agg_a = Uuid::new_v4();
        let agg_b = Uuid::new_v4();

        repo.append_events(agg_a, 0, &[make_stored_event(agg_a, 1)])
            .await
            .unwrap();
        repo.append_events(agg_b, 0, &[make_stored_event(agg_b, 1)])
            .await
            .unwrap();

        let loaded_a = repo.load_events(agg_a).await.unwrap();
        let loaded_b = repo.load_events(agg_b).await.unwrap();
        assert_eq!(loaded_a.len(), 1);
        assert_eq!(loaded_b.len(), 1);
        assert_eq!(loaded_a[0].aggregate_id, agg_a);
        assert_eq!(loaded_b[0].aggregate_id, agg_b);
    }
}
