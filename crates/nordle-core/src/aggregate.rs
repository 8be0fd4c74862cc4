//! Event-sourced aggregate roots.

use uuid::Uuid;

use crate::event::DomainEvent;

/// An aggregate rebuilt by folding its event stream.
///
/// Decisions stage events without touching state; the staged batch is
/// appended at `version()` and only then applied.
pub trait AggregateRoot: Send + Sync {
    /// Events in this aggregate's stream.
    type Event: DomainEvent;

    /// Stream id.
    fn aggregate_id(&self) -> Uuid;

    /// Events applied so far. Zero for a stream that does not exist yet.
    fn version(&self) -> i64;

    /// Folds one event into state.
    fn apply(&mut self, event: &Self::Event);

    /// Events staged by the current decision.
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Drops staged events once they are stored or abandoned.
    fn clear_uncommitted_events(&mut self);

    /// Whether the current decision staged anything.
    fn has_uncommitted_events(&self) -> bool {
        !self.uncommitted_events().is_empty()
    }

    /// Sequence number for the next staged event. Streams start at 1.
    #[allow(clippy::cast_possible_wrap)]
    fn next_sequence_number(&self) -> i64 {
        self.version() + self.uncommitted_events().len() as i64 + 1
    }
}
