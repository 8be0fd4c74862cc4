//! Events recorded in a collection stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::repository::StoredEvent;

/// Envelope shared by every recorded event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    pub event_id: Uuid,
    /// Dotted name, e.g. `nordle.token_minted`.
    pub event_type: String,
    /// The collection stream.
    pub aggregate_id: Uuid,
    /// Position in the stream, starting at 1 with no gaps.
    pub sequence_number: i64,
    /// Copied from the command that produced the event.
    pub correlation_id: Uuid,
    /// The command (or earlier event) that led to this one.
    pub causation_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

impl EventMetadata {
    /// The envelope of a persisted event.
    #[must_use]
    pub fn from_stored(stored: &StoredEvent) -> Self {
        Self {
            event_id: stored.event_id,
            event_type: stored.event_type.clone(),
            aggregate_id: stored.aggregate_id,
            sequence_number: stored.sequence_number,
            correlation_id: stored.correlation_id,
            causation_id: stored.causation_id,
            occurred_at: stored.occurred_at,
        }
    }
}

/// An event an aggregate stages and later folds.
pub trait DomainEvent: Send + Sync + std::fmt::Debug {
    /// Dotted name stored alongside the payload.
    fn event_type(&self) -> &'static str;

    /// JSON body written to the `payload` column.
    fn to_payload(&self) -> serde_json::Value;

    fn metadata(&self) -> &EventMetadata;
}
