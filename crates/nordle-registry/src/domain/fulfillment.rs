//! Oracle answers and the outcomes of applying them.

use std::fmt;

use nordle_core::ids::{RequestId, TokenId};
use nordle_core::oracle::RequestKind;
use serde::{Deserialize, Serialize};

use super::ledger::RequestStatus;
use super::word::Word;

/// The decoded payload of an oracle callback.
///
/// For a create request `word` is optional (the flow falls back to the
/// suggested word, then to a random draw); for a combine request it is the
/// derived word and is required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleAnswer {
    /// Word chosen or computed by the oracle.
    #[serde(default)]
    pub word: Option<String>,
    /// Image reference produced by the off-chain service.
    #[serde(default)]
    pub image_uri: Option<String>,
}

impl OracleAnswer {
    /// An answer carrying only a word.
    #[must_use]
    pub fn word(word: impl Into<String>) -> Self {
        Self {
            word: Some(word.into()),
            image_uri: None,
        }
    }
}

/// Why a fulfillment was rejected. The request is consumed (`Failed`) and
/// no token is minted or burned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum RejectReason {
    /// The resolved word is bound to a live token.
    WordUnavailable {
        /// The contested word.
        word: Word,
        /// The live token holding it.
        holder: TokenId,
    },
    /// The oracle chose a word outside the word bank.
    UnknownWord {
        /// The word the oracle returned.
        word: Word,
    },
    /// The oracle returned a string that violates the word policy.
    InvalidWord {
        /// The raw string as received.
        raw: String,
    },
    /// No word could be resolved from the answer.
    MissingWord,
    /// A combine input is no longer live or no longer owned by the requester.
    InputUnavailable {
        /// The offending input.
        token_id: TokenId,
    },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WordUnavailable { word, holder } => {
                write!(f, "word {word} is bound to live token {holder}")
            }
            Self::UnknownWord { word } => write!(f, "word {word} is not in the word bank"),
            Self::InvalidWord { raw } => write!(f, "oracle returned invalid word {raw:?}"),
            Self::MissingWord => f.write_str("no word could be resolved"),
            Self::InputUnavailable { token_id } => {
                write!(f, "input token {token_id} is not available")
            }
        }
    }
}

/// Result of delivering an oracle answer to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FulfillmentOutcome {
    /// The request is now `Fulfilled` and a token was minted.
    Minted {
        /// The fulfilled request.
        request_id: RequestId,
        /// Kind of the fulfilled request.
        kind: RequestKind,
        /// The new token.
        token_id: TokenId,
        /// The word bound to the new token.
        word: Word,
        /// Inputs burned by a combine (empty for create).
        burned: Vec<TokenId>,
    },
    /// The request is now `Failed`; nothing was minted or burned.
    Rejected {
        /// The rejected request.
        request_id: RequestId,
        /// Why it was rejected.
        reason: RejectReason,
    },
    /// The request was already terminal; nothing changed.
    AlreadyFulfilled {
        /// The settled request.
        request_id: RequestId,
        /// Its terminal status.
        status: RequestStatus,
    },
}

impl FulfillmentOutcome {
    /// The request this outcome refers to.
    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        match self {
            Self::Minted { request_id, .. }
            | Self::Rejected { request_id, .. }
            | Self::AlreadyFulfilled { request_id, .. } => request_id,
        }
    }

    /// Returns `true` if applying the answer changed nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::AlreadyFulfilled { .. })
    }
}

/// Result of expiring a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExpireOutcome {
    /// The request moved from `Pending` to `Expired` and released its locks.
    Expired {
        /// The expired request.
        request_id: RequestId,
    },
    /// The request had already expired; nothing changed.
    AlreadyExpired {
        /// The expired request.
        request_id: RequestId,
    },
}
