//! Shared test mocks and utilities for the Nordle word-token registry.

mod clock;
mod oracle;
mod repository;
mod rng;

pub use clock::{FixedClock, fixed_now};
pub use oracle::{FailingOracleGateway, SequentialOracleGateway};
pub use repository::{ConflictingEventRepository, EmptyEventRepository, FailingEventRepository};
pub use rng::{MockRng, SequenceRng};
