//! Append-only storage of collection streams.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::DomainError;
use crate::event::DomainEvent;

/// One row of a stream, as persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub aggregate_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    /// Position in the stream, starting at 1.
    pub sequence_number: i64,
    pub correlation_id: Uuid,
    pub causation_id: Uuid,
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

impl StoredEvent {
    /// Flattens a staged event into a row.
    pub fn from_event<E: DomainEvent>(event: &E) -> Self {
        let meta = event.metadata();
        Self {
            event_id: meta.event_id,
            aggregate_id: meta.aggregate_id,
            event_type: event.event_type().to_owned(),
            payload: event.to_payload(),
            sequence_number: meta.sequence_number,
            correlation_id: meta.correlation_id,
            causation_id: meta.causation_id,
            occurred_at: meta.occurred_at,
        }
    }

    /// Decodes the payload column.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` naming the event when the payload
    /// does not match `T`; a stream that fails here cannot be replayed.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, DomainError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            DomainError::Infrastructure(format!(
                "event {} ({}) failed to decode: {e}",
                self.event_id, self.event_type
            ))
        })
    }
}

/// Loads and appends collection streams.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Every event of the stream in sequence order. Empty for an unknown id.
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError>;

    /// Appends `events` if the stream still ends at `expected_version`.
    ///
    /// The batch lands whole or not at all. A stream that has moved on
    /// yields `DomainError::ConcurrencyConflict` and stores nothing.
    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError>;
}
