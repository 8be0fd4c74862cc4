//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

use crate::ids::{RequestId, TokenId};

/// Top-level domain error type.
///
/// Business rejections of a fulfillment (for example a word that is already
/// live) are not errors: they are persisted outcomes. Everything here is
/// returned to the caller and leaves the aggregate untouched.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An aggregate was not found.
    #[error("aggregate not found: {0}")]
    AggregateNotFound(Uuid),

    /// Optimistic concurrency conflict.
    #[error(
        "concurrency conflict on aggregate {aggregate_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        /// The aggregate that had the conflict.
        aggregate_id: Uuid,
        /// The expected version.
        expected: i64,
        /// The actual version found.
        actual: i64,
    },

    /// Malformed submission; retrying without changing the input fails again.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A token is reserved by another pending request.
    #[error("token {token_id} is locked by pending request {request_id}")]
    TokenLocked {
        /// The reserved token.
        token_id: TokenId,
        /// The pending request holding the reservation.
        request_id: RequestId,
    },

    /// No request with this id was ever recorded.
    #[error("unknown request: {0}")]
    UnknownRequest(RequestId),

    /// The request already reached a terminal state that forbids the operation.
    #[error("request {request_id} is already {status}")]
    RequestClosed {
        /// The request identifier.
        request_id: RequestId,
        /// The terminal status, in its wire form.
        status: String,
    },

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Returns `true` for errors the caller may retry unchanged once the
    /// conflicting work has settled.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConcurrencyConflict { .. } | Self::TokenLocked { .. }
        )
    }
}
