//! The request ledger: every oracle request ever submitted, and the token
//! locks held by the pending ones.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use nordle_core::error::DomainError;
use nordle_core::ids::{Address, RequestId, TokenId};
use nordle_core::oracle::RequestKind;
use serde::{Deserialize, Serialize};

use super::fulfillment::RejectReason;
use super::registry::WordRegistry;
use super::word::Word;

/// Number of input tokens a combine request consumes.
pub const COMBINE_ARITY: usize = 2;

/// Lifecycle status of a request. Moves exactly once out of `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Awaiting the oracle callback.
    Pending,
    /// A token was minted.
    Fulfilled,
    /// The answer was rejected; nothing was minted or burned.
    Failed,
    /// Expired before a callback arrived.
    Expired,
}

impl RequestStatus {
    /// Returns `true` for every status except `Pending`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Wire form of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fulfilled => "fulfilled",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded oracle request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Oracle-issued identifier.
    pub id: RequestId,
    /// Create or combine.
    pub kind: RequestKind,
    /// Input tokens, ascending. Empty for create.
    pub inputs: Vec<TokenId>,
    /// Who submitted the request and receives the minted token.
    pub requester: Address,
    /// Word suggested at submission (create only).
    pub suggested_word: Option<Word>,
    /// Fee attached at submission, in the smallest currency unit.
    pub fee: u64,
    /// Submission time.
    pub submitted_at: DateTime<Utc>,
    /// Current status.
    pub status: RequestStatus,
    /// When the request left `Pending`.
    pub settled_at: Option<DateTime<Utc>>,
    /// Token minted by the fulfillment.
    pub minted: Option<TokenId>,
    /// Why the fulfillment was rejected.
    pub rejection: Option<RejectReason>,
}

impl Request {
    /// A freshly submitted, pending request.
    #[must_use]
    pub fn pending(
        id: RequestId,
        kind: RequestKind,
        inputs: Vec<TokenId>,
        requester: Address,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind,
            inputs,
            requester,
            suggested_word: None,
            fee: 0,
            submitted_at,
            status: RequestStatus::Pending,
            settled_at: None,
            minted: None,
            rejection: None,
        }
    }
}

/// Result of looking a request up for settlement.
#[derive(Debug, Clone, Copy)]
pub enum Lookup<'a> {
    /// Still awaiting its callback.
    Pending(&'a Request),
    /// Already terminal.
    Settled(&'a Request),
}

/// How a pending request is settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Settlement {
    Fulfilled(TokenId),
    Failed(RejectReason),
    Expired,
}

/// All requests, keyed by id, plus the locks of pending combines.
#[derive(Debug, Default)]
pub struct RequestLedger {
    requests: HashMap<RequestId, Request>,
    locks: HashMap<TokenId, RequestId>,
}

impl RequestLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a request by id.
    #[must_use]
    pub fn get(&self, id: &RequestId) -> Option<&Request> {
        self.requests.get(id)
    }

    /// The pending request holding a lock on `token_id`.
    #[must_use]
    pub fn lock_holder(&self, token_id: TokenId) -> Option<&RequestId> {
        self.locks.get(&token_id)
    }

    /// Number of requests ever recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Returns `true` if nothing was ever recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Pending requests, oldest first.
    #[must_use]
    pub fn pending(&self) -> Vec<&Request> {
        let mut pending: Vec<&Request> = self
            .requests
            .values()
            .filter(|r| r.status == RequestStatus::Pending)
            .collect();
        pending.sort_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        pending
    }

    /// Pending requests submitted at or before `cutoff`, oldest first.
    #[must_use]
    pub fn stale(&self, cutoff: DateTime<Utc>) -> Vec<&Request> {
        self.pending()
            .into_iter()
            .filter(|r| r.submitted_at <= cutoff)
            .collect()
    }

    /// Looks a request up for settlement.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownRequest` if no such request was recorded.
    pub fn open(&self, id: &RequestId) -> Result<Lookup<'_>, DomainError> {
        let request = self
            .requests
            .get(id)
            .ok_or_else(|| DomainError::UnknownRequest(id.clone()))?;
        if request.status.is_terminal() {
            Ok(Lookup::Settled(request))
        } else {
            Ok(Lookup::Pending(request))
        }
    }

    /// Validates a submission and returns its inputs in canonical
    /// (ascending) order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidInput` if the request id was already
    /// used, or the inputs are not exactly the right number of distinct live
    /// tokens owned by `requester`. Returns `DomainError::TokenLocked` if an
    /// input is reserved by another pending request.
    pub fn check_submission(
        &self,
        request_id: Option<&RequestId>,
        kind: RequestKind,
        inputs: &[TokenId],
        requester: &Address,
        registry: &WordRegistry,
    ) -> Result<Vec<TokenId>, DomainError> {
        if let Some(id) = request_id {
            if self.requests.contains_key(id) {
                return Err(DomainError::InvalidInput(format!(
                    "request id {id} was already used"
                )));
            }
        }

        let expected = match kind {
            RequestKind::Create => 0,
            RequestKind::Combine => COMBINE_ARITY,
        };
        if inputs.len() != expected {
            return Err(DomainError::InvalidInput(format!(
                "{kind} request takes {expected} input tokens, got {}",
                inputs.len()
            )));
        }

        let mut canonical = inputs.to_vec();
        canonical.sort_unstable();
        if canonical.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(DomainError::InvalidInput(
                "input tokens must be distinct".to_owned(),
            ));
        }

        for &token_id in &canonical {
            match registry.token(token_id) {
                None => {
                    return Err(DomainError::InvalidInput(format!(
                        "token {token_id} does not exist"
                    )));
                }
                Some(token) if !token.is_live() => {
                    return Err(DomainError::InvalidInput(format!(
                        "token {token_id} is burned"
                    )));
                }
                Some(token) if &token.owner != requester => {
                    return Err(DomainError::InvalidInput(format!(
                        "token {token_id} is not owned by {requester}"
                    )));
                }
                Some(_) => {}
            }
        }

        if let Some((token_id, holder)) = canonical
            .iter()
            .find_map(|id| self.locks.get(id).map(|holder| (*id, holder)))
        {
            return Err(DomainError::TokenLocked {
                token_id,
                request_id: holder.clone(),
            });
        }

        Ok(canonical)
    }

    /// Records a pending request and locks its inputs.
    pub(crate) fn record(&mut self, request: Request) {
        for token_id in &request.inputs {
            self.locks.insert(*token_id, request.id.clone());
        }
        self.requests.insert(request.id.clone(), request);
    }

    /// Moves a pending request to its terminal status and releases its locks.
    /// Returns `false` and changes nothing if the request is unknown or
    /// already terminal.
    pub(crate) fn settle(
        &mut self,
        id: &RequestId,
        settlement: Settlement,
        at: DateTime<Utc>,
    ) -> bool {
        let Some(request) = self.requests.get_mut(id) else {
            return false;
        };
        if request.status.is_terminal() {
            return false;
        }
        match settlement {
            Settlement::Fulfilled(token_id) => {
                request.status = RequestStatus::Fulfilled;
                request.minted = Some(token_id);
            }
            Settlement::Failed(reason) => {
                request.status = RequestStatus::Failed;
                request.rejection = Some(reason);
            }
            Settlement::Expired => request.status = RequestStatus::Expired,
        }
        request.settled_at = Some(at);
        for token_id in &request.inputs {
            if self.locks.get(token_id) == Some(id) {
                self.locks.remove(token_id);
            }
        }
        true
    }
}
