//! Commands accepted by the registry.

use uuid::Uuid;

/// A request to change one collection's state.
///
/// `command_type` is a stable dotted name (`nordle.request_create`) used as a
/// log field, never for dispatch.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// Stable dotted name of the command.
    fn command_type(&self) -> &'static str;

    /// Id carried onto every event the command produces.
    fn correlation_id(&self) -> Uuid;

    /// The collection the command targets.
    fn aggregate_id(&self) -> Uuid;
}
