//! Oracle boundary abstraction.
//!
//! The registry never talks to an oracle network directly. It asks a
//! gateway for a request id when a request is submitted; the answer comes
//! back later, on a separate path, keyed by that id.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::ids::{Address, RequestId, TokenId};

/// The two kinds of oracle request a collection can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Mint a token bound to a new word.
    Create,
    /// Burn two tokens and mint one bound to a derived word.
    Combine,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("create"),
            Self::Combine => f.write_str("combine"),
        }
    }
}

/// Fixed-shape request handed to the oracle integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRequest {
    /// Collection issuing the request.
    pub collection_id: Uuid,
    /// Request kind.
    pub kind: RequestKind,
    /// Input tokens (empty for `Create`).
    pub token_ids: Vec<TokenId>,
    /// Input words, in the same order as `token_ids`.
    pub words: Vec<String>,
    /// Requesting account.
    pub requester: Address,
    /// Word suggested by the requester, if any.
    pub suggested_word: Option<String>,
}

/// Issues request ids for outbound oracle requests.
#[async_trait]
pub trait OracleGateway: Send + Sync {
    /// Sends `request` to the oracle integration and returns the id its
    /// fulfillment callback will carry.
    async fn issue(&self, request: &OracleRequest) -> Result<RequestId, DomainError>;
}
