//! Query handlers for the word-token registry.
//!
//! Each query reconstitutes the collection from its stream and returns a
//! read-only view DTO.

use chrono::{DateTime, Utc};
use nordle_core::error::DomainError;
use nordle_core::ids::{Address, RequestId, TokenId};
use nordle_core::oracle::RequestKind;
use nordle_core::repository::EventRepository;
use serde::Serialize;
use uuid::Uuid;

use crate::application::command_handlers;
use crate::domain::fulfillment::RejectReason;
use crate::domain::ledger::{Request, RequestStatus};
use crate::domain::registry::Token;
use crate::domain::word::Word;

/// Read-only summary of a collection.
#[derive(Debug, Serialize)]
pub struct CollectionView {
    /// The collection identifier.
    pub collection_id: Uuid,
    /// Display name.
    pub name: Option<String>,
    /// When the collection was opened.
    pub opened_at: Option<DateTime<Utc>>,
    /// Tokens ever minted.
    pub tokens_minted: usize,
    /// Tokens currently live.
    pub live_tokens: usize,
    /// Requests ever recorded.
    pub requests: usize,
    /// Requests awaiting a callback.
    pub pending_requests: usize,
    /// Id the next minted token receives.
    pub next_token_id: TokenId,
    /// Current version (event count).
    pub version: i64,
}

/// Read-only view of a token.
#[derive(Debug, Serialize)]
pub struct TokenView {
    /// Token identifier.
    pub token_id: TokenId,
    /// Current owner.
    pub owner: Address,
    /// Bound word.
    pub word: Word,
    /// Image reference.
    pub image_uri: Option<String>,
    /// Burned inputs this token was combined from.
    pub parents: Vec<TokenId>,
    /// Request that minted it.
    pub minted_by: RequestId,
    /// Mint time.
    pub minted_at: DateTime<Utc>,
    /// Whether it is burned.
    pub burned: bool,
    /// Request that burned it.
    pub burned_by: Option<RequestId>,
    /// Pending request currently holding it.
    pub locked_by: Option<RequestId>,
}

/// Token ids held by an owner.
#[derive(Debug, Serialize)]
pub struct OwnerTokensView {
    /// The owner.
    pub owner: Address,
    /// Live tokens, ascending.
    pub live: Vec<TokenId>,
    /// Burned tokens, ascending.
    pub burned: Vec<TokenId>,
}

/// Live-binding status of a word.
#[derive(Debug, Serialize)]
pub struct WordView {
    /// The normalized word.
    pub word: Word,
    /// Whether a live token holds it.
    pub live: bool,
    /// The live token holding it.
    pub token_id: Option<TokenId>,
}

/// Read-only view of a request.
#[derive(Debug, Serialize)]
pub struct RequestView {
    /// Oracle-issued request id.
    pub request_id: RequestId,
    /// Create or combine.
    pub kind: RequestKind,
    /// Input tokens, ascending.
    pub token_ids: Vec<TokenId>,
    /// Requester.
    pub requester: Address,
    /// Suggested word (create only).
    pub suggested_word: Option<Word>,
    /// Attached fee.
    pub fee: u64,
    /// Lifecycle status.
    pub status: RequestStatus,
    /// Submission time.
    pub submitted_at: DateTime<Utc>,
    /// When the request left `Pending`.
    pub settled_at: Option<DateTime<Utc>>,
    /// Token minted by the fulfillment.
    pub minted_token_id: Option<TokenId>,
    /// Why the fulfillment was rejected.
    pub rejection: Option<RejectReason>,
}

impl From<&Request> for RequestView {
    fn from(request: &Request) -> Self {
        Self {
            request_id: request.id.clone(),
            kind: request.kind,
            token_ids: request.inputs.clone(),
            requester: request.requester.clone(),
            suggested_word: request.suggested_word.clone(),
            fee: request.fee,
            status: request.status,
            submitted_at: request.submitted_at,
            settled_at: request.settled_at,
            minted_token_id: request.minted,
            rejection: request.rejection.clone(),
        }
    }
}

impl TokenView {
    fn new(token: &Token, locked_by: Option<RequestId>) -> Self {
        Self {
            token_id: token.id,
            owner: token.owner.clone(),
            word: token.word.clone(),
            image_uri: token.image_uri.clone(),
            parents: token.parents.clone(),
            minted_by: token.minted_by.clone(),
            minted_at: token.minted_at,
            burned: !token.is_live(),
            burned_by: token.burned_by.clone(),
            locked_by,
        }
    }
}

/// Retrieves a collection summary by its aggregate ID.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no events exist for the ID.
/// Returns `DomainError::Infrastructure` if event deserialization fails.
pub async fn get_collection_by_id(
    collection_id: Uuid,
    repo: &dyn EventRepository,
) -> Result<CollectionView, DomainError> {
    let collection = command_handlers::load(collection_id, repo).await?;
    Ok(CollectionView {
        collection_id,
        name: collection.name().map(str::to_owned),
        opened_at: collection.opened_at(),
        tokens_minted: collection.registry().len(),
        live_tokens: collection.registry().live_count(),
        requests: collection.ledger().len(),
        pending_requests: collection.ledger().pending().len(),
        next_token_id: collection.registry().next_token_id(),
        version: collection.version,
    })
}

/// Retrieves one token, live or burned.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the collection does not
/// exist and `DomainError::InvalidInput` if the token does not.
pub async fn get_token(
    collection_id: Uuid,
    token_id: TokenId,
    repo: &dyn EventRepository,
) -> Result<TokenView, DomainError> {
    let collection = command_handlers::load(collection_id, repo).await?;
    let token = collection
        .registry()
        .token(token_id)
        .ok_or_else(|| DomainError::InvalidInput(format!("token {token_id} does not exist")))?;
    let locked_by = collection.ledger().lock_holder(token_id).cloned();
    Ok(TokenView::new(token, locked_by))
}

/// Lists the live and burned token ids of an owner.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no events exist for the ID.
pub async fn get_tokens_by_owner(
    collection_id: Uuid,
    owner: &Address,
    repo: &dyn EventRepository,
) -> Result<OwnerTokensView, DomainError> {
    let collection = command_handlers::load(collection_id, repo).await?;
    let owned = collection.registry().tokens_of(owner);
    Ok(OwnerTokensView {
        owner: owner.clone(),
        live: owned.live,
        burned: owned.burned,
    })
}

/// Reports whether a word is bound to a live token.
///
/// # Errors
///
/// Returns `DomainError::InvalidInput` if `raw` violates the word policy,
/// or `DomainError::AggregateNotFound` if no events exist for the ID.
pub async fn get_word(
    collection_id: Uuid,
    raw: &str,
    repo: &dyn EventRepository,
) -> Result<WordView, DomainError> {
    let word = Word::parse(raw)?;
    let collection = command_handlers::load(collection_id, repo).await?;
    let token_id = collection.registry().holder(&word);
    Ok(WordView {
        word,
        live: token_id.is_some(),
        token_id,
    })
}

/// Retrieves one request.
///
/// # Errors
///
/// Returns `DomainError::UnknownRequest` if the id was never recorded, or
/// `DomainError::AggregateNotFound` if no events exist for the ID.
pub async fn get_request(
    collection_id: Uuid,
    request_id: &RequestId,
    repo: &dyn EventRepository,
) -> Result<RequestView, DomainError> {
    let collection = command_handlers::load(collection_id, repo).await?;
    collection
        .ledger()
        .get(request_id)
        .map(RequestView::from)
        .ok_or_else(|| DomainError::UnknownRequest(request_id.clone()))
}

/// Lists pending requests, oldest first.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no events exist for the ID.
pub async fn list_pending_requests(
    collection_id: Uuid,
    repo: &dyn EventRepository,
) -> Result<Vec<RequestView>, DomainError> {
    let collection = command_handlers::load(collection_id, repo).await?;
    Ok(collection
        .ledger()
        .pending()
        .into_iter()
        .map(RequestView::from)
        .collect())
}
