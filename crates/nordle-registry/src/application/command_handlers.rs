//! Command handlers for the word-token registry.
//!
//! Every handler follows the same shape: load the collection's stream,
//! reconstitute, run one synchronous domain decision, and append the staged
//! events with the loaded version as the expected version. When the append
//! loses a race the whole decision is re-run against the fresh stream, so a
//! duplicate callback that lost turns into `AlreadyFulfilled` and a combine
//! that lost turns into `TokenLocked`.

use std::sync::Mutex;

use nordle_core::aggregate::AggregateRoot;
use nordle_core::clock::Clock;
use nordle_core::error::DomainError;
use nordle_core::event::EventMetadata;
use nordle_core::ids::{RequestId, TokenId};
use nordle_core::oracle::{OracleGateway, OracleRequest, RequestKind};
use nordle_core::repository::{EventRepository, StoredEvent};
use nordle_core::rng::DeterministicRng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::aggregates::Collection;
use crate::domain::commands::{
    ExpireRequest, ExpireStaleRequests, FulfillRequest, OpenCollection, RequestCombine,
    RequestCreate, TransferToken,
};
use crate::domain::events::{CollectionEvent, CollectionEventKind};
use crate::domain::fulfillment::{ExpireOutcome, FulfillmentOutcome};
use crate::domain::word_bank::WordBank;

/// Attempts a command makes before a persistent concurrency conflict is
/// returned to the caller.
pub const MAX_COMMAND_ATTEMPTS: u32 = 5;

/// Result of a successfully handled command.
#[derive(Debug)]
pub struct CommandResult {
    /// The aggregate ID affected by the command.
    pub aggregate_id: Uuid,
    /// The stored events produced and persisted.
    pub stored_events: Vec<StoredEvent>,
}

/// Result of a create or combine submission.
#[derive(Debug)]
pub struct SubmissionResult {
    /// The collection the request belongs to.
    pub collection_id: Uuid,
    /// Oracle-issued request id.
    pub request_id: RequestId,
    /// Create or combine.
    pub kind: RequestKind,
    /// Locked inputs, ascending (empty for create).
    pub token_ids: Vec<TokenId>,
    /// The stored events produced and persisted.
    pub stored_events: Vec<StoredEvent>,
}

/// Result of delivering an oracle answer.
#[derive(Debug)]
pub struct FulfillmentResult {
    /// The collection the request belongs to.
    pub collection_id: Uuid,
    /// What the answer did.
    pub outcome: FulfillmentOutcome,
    /// The stored events produced and persisted (empty for a no-op).
    pub stored_events: Vec<StoredEvent>,
}

/// Result of expiring one request.
#[derive(Debug)]
pub struct ExpireResult {
    /// The collection the request belongs to.
    pub collection_id: Uuid,
    /// What the expiry did.
    pub outcome: ExpireOutcome,
    /// The stored events produced and persisted.
    pub stored_events: Vec<StoredEvent>,
}

/// Result of a stale-request sweep.
#[derive(Debug)]
pub struct StaleExpiryResult {
    /// The swept collection.
    pub collection_id: Uuid,
    /// Requests moved to `Expired`, oldest first.
    pub expired: Vec<RequestId>,
    /// The stored events produced and persisted.
    pub stored_events: Vec<StoredEvent>,
}

/// Reconstitutes a `Collection` from stored events.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if event deserialization fails.
pub(crate) fn reconstitute(
    collection_id: Uuid,
    existing_events: &[StoredEvent],
) -> Result<Collection, DomainError> {
    let mut collection = Collection::new(collection_id);
    for stored in existing_events {
        let kind: CollectionEventKind = stored.decode_payload()?;
        let event = CollectionEvent {
            metadata: EventMetadata::from_stored(stored),
            kind,
        };
        collection.apply(&event);
    }
    Ok(collection)
}

/// Loads and reconstitutes an opened collection.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the stream is empty.
pub(crate) async fn load(
    collection_id: Uuid,
    repo: &dyn EventRepository,
) -> Result<Collection, DomainError> {
    let existing_events = repo.load_events(collection_id).await?;
    if existing_events.is_empty() {
        return Err(DomainError::AggregateNotFound(collection_id));
    }
    reconstitute(collection_id, &existing_events)
}

/// Runs `decide` against the current collection and appends what it staged,
/// re-running it on a concurrency conflict.
async fn execute<T, F>(
    collection_id: Uuid,
    repo: &dyn EventRepository,
    mut decide: F,
) -> Result<(T, Vec<StoredEvent>), DomainError>
where
    F: FnMut(&mut Collection) -> Result<T, DomainError> + Send,
    T: Send,
{
    let mut attempt = 1;
    loop {
        let mut collection = load(collection_id, repo).await?;
        let value = decide(&mut collection)?;
        if !collection.has_uncommitted_events() {
            return Ok((value, Vec::new()));
        }

        let stored_events: Vec<StoredEvent> = collection
            .uncommitted_events()
            .iter()
            .map(StoredEvent::from_event)
            .collect();

        match repo
            .append_events(collection_id, collection.version(), &stored_events)
            .await
        {
            Ok(()) => return Ok((value, stored_events)),
            Err(DomainError::ConcurrencyConflict { .. }) if attempt < MAX_COMMAND_ATTEMPTS => {
                debug!(%collection_id, attempt, "lost append race, re-deciding");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Handles the `OpenCollection` command: stages `CollectionOpened` on an
/// empty stream and persists it.
///
/// # Errors
///
/// Returns `DomainError::InvalidInput` if the collection already exists,
/// or `DomainError` if event loading or appending fails.
pub async fn handle_open_collection(
    command: &OpenCollection,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<CommandResult, DomainError> {
    let existing_events = repo.load_events(command.collection_id).await?;
    let mut collection = reconstitute(command.collection_id, &existing_events)?;

    collection.open(command.name.clone(), command.correlation_id, clock)?;

    let stored_events: Vec<StoredEvent> = collection
        .uncommitted_events()
        .iter()
        .map(StoredEvent::from_event)
        .collect();

    repo.append_events(command.collection_id, collection.version(), &stored_events)
        .await?;

    Ok(CommandResult {
        aggregate_id: command.collection_id,
        stored_events,
    })
}

/// Handles the `RequestCreate` command: validates the submission, obtains a
/// request id from the oracle gateway, and records the pending request.
///
/// The gateway is called once. If recording then fails, the id is abandoned
/// and its eventual callback is answered with `UnknownRequest`.
///
/// # Errors
///
/// Returns `DomainError::InvalidInput` for a rejected suggested word, or
/// `DomainError` if the gateway, event loading or appending fails.
pub async fn handle_request_create(
    command: &RequestCreate,
    clock: &dyn Clock,
    bank: &dyn WordBank,
    oracle: &dyn OracleGateway,
    repo: &dyn EventRepository,
) -> Result<SubmissionResult, DomainError> {
    load(command.collection_id, repo).await?;
    let suggested_word = Collection::check_create(command.suggested_word.as_deref(), bank)?;

    let request_id = oracle
        .issue(&OracleRequest {
            collection_id: command.collection_id,
            kind: RequestKind::Create,
            token_ids: Vec::new(),
            words: Vec::new(),
            requester: command.requester.clone(),
            suggested_word: suggested_word.map(String::from),
        })
        .await?;

    let recorded = execute(command.collection_id, repo, |collection| {
        collection.request_create(
            request_id.clone(),
            command.requester.clone(),
            command.suggested_word.as_deref(),
            command.fee,
            bank,
            command.correlation_id,
            clock,
        )
    })
    .await;
    let ((), stored_events) = recorded.inspect_err(|error| {
        warn!(collection_id = %command.collection_id, %request_id, %error, "oracle request abandoned");
    })?;

    info!(collection_id = %command.collection_id, %request_id, "create request pending");
    Ok(SubmissionResult {
        collection_id: command.collection_id,
        request_id,
        kind: RequestKind::Create,
        token_ids: Vec::new(),
        stored_events,
    })
}

/// Handles the `RequestCombine` command: validates and locks the inputs,
/// obtains a request id from the oracle gateway, and records the pending
/// request.
///
/// # Errors
///
/// Returns `DomainError::InvalidInput` or `DomainError::TokenLocked` for a
/// rejected submission, or `DomainError` if the gateway, event loading or
/// appending fails.
pub async fn handle_request_combine(
    command: &RequestCombine,
    clock: &dyn Clock,
    oracle: &dyn OracleGateway,
    repo: &dyn EventRepository,
) -> Result<SubmissionResult, DomainError> {
    let collection = load(command.collection_id, repo).await?;
    let token_ids = collection.check_combine(&command.requester, command.token_ids)?;
    let words = token_ids
        .iter()
        .filter_map(|id| collection.registry().word_of(*id))
        .map(ToString::to_string)
        .collect();

    let request_id = oracle
        .issue(&OracleRequest {
            collection_id: command.collection_id,
            kind: RequestKind::Combine,
            token_ids,
            words,
            requester: command.requester.clone(),
            suggested_word: None,
        })
        .await?;

    let recorded = execute(command.collection_id, repo, |collection| {
        collection.request_combine(
            request_id.clone(),
            command.requester.clone(),
            command.token_ids,
            command.correlation_id,
            clock,
        )
    })
    .await;
    let (token_ids, stored_events) = recorded.inspect_err(|error| {
        warn!(collection_id = %command.collection_id, %request_id, %error, "oracle request abandoned");
    })?;

    info!(collection_id = %command.collection_id, %request_id, ?token_ids, "combine request pending");
    Ok(SubmissionResult {
        collection_id: command.collection_id,
        request_id,
        kind: RequestKind::Combine,
        token_ids,
        stored_events,
    })
}

/// Handles the `FulfillRequest` command: applies an oracle answer and
/// persists the resulting batch.
///
/// The `Mutex` is locked only around the synchronous domain method call to
/// avoid holding a `MutexGuard` across await points.
///
/// # Errors
///
/// Returns `DomainError::UnknownRequest` if the request id was never
/// recorded, or `DomainError` if event loading or appending fails. The
/// request stays pending on an infrastructure failure.
pub async fn handle_fulfill_request(
    command: &FulfillRequest,
    clock: &dyn Clock,
    bank: &dyn WordBank,
    rng: &Mutex<dyn DeterministicRng + Send>,
    repo: &dyn EventRepository,
) -> Result<FulfillmentResult, DomainError> {
    let result = execute(command.collection_id, repo, |collection| {
        let mut rng_guard = rng
            .lock()
            .map_err(|e| DomainError::Infrastructure(format!("RNG mutex poisoned: {e}")))?;
        collection.fulfill(
            &command.request_id,
            &command.answer,
            bank,
            &mut *rng_guard,
            command.correlation_id,
            clock,
        )
    })
    .await;

    let collection_id = command.collection_id;
    let request_id = &command.request_id;
    let (outcome, stored_events) = result.inspect_err(|error| {
        if matches!(error, DomainError::UnknownRequest(_)) {
            warn!(%collection_id, %request_id, "callback for unknown request");
        }
    })?;

    match &outcome {
        FulfillmentOutcome::Minted { token_id, word, .. } => {
            info!(%collection_id, %request_id, %token_id, %word, "request fulfilled");
        }
        FulfillmentOutcome::Rejected { reason, .. } => {
            info!(%collection_id, %request_id, %reason, "request rejected");
        }
        FulfillmentOutcome::AlreadyFulfilled { status, .. } => {
            debug!(%collection_id, %request_id, %status, "duplicate callback ignored");
        }
    }

    Ok(FulfillmentResult {
        collection_id,
        outcome,
        stored_events,
    })
}

/// Handles the `ExpireRequest` command.
///
/// # Errors
///
/// Returns `DomainError::UnknownRequest` or `DomainError::RequestClosed`
/// from the ledger, or `DomainError` if event loading or appending fails.
pub async fn handle_expire_request(
    command: &ExpireRequest,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<ExpireResult, DomainError> {
    let (outcome, stored_events) = execute(command.collection_id, repo, |collection| {
        collection.expire(&command.request_id, command.correlation_id, clock)
    })
    .await?;

    Ok(ExpireResult {
        collection_id: command.collection_id,
        outcome,
        stored_events,
    })
}

/// Handles the `ExpireStaleRequests` command: expires, in one append, every
/// pending request older than `max_age`.
///
/// # Errors
///
/// Returns `DomainError` if event loading or appending fails.
pub async fn handle_expire_stale_requests(
    command: &ExpireStaleRequests,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<StaleExpiryResult, DomainError> {
    let (expired, stored_events) = execute(command.collection_id, repo, |collection| {
        Ok(collection.expire_stale(command.max_age, command.correlation_id, clock))
    })
    .await?;

    if !expired.is_empty() {
        info!(collection_id = %command.collection_id, count = expired.len(), "expired stale requests");
    }
    Ok(StaleExpiryResult {
        collection_id: command.collection_id,
        expired,
        stored_events,
    })
}

/// Handles the `TransferToken` command.
///
/// # Errors
///
/// Returns `DomainError::InvalidInput` or `DomainError::TokenLocked` for a
/// rejected transfer, or `DomainError` if event loading or appending fails.
pub async fn handle_transfer_token(
    command: &TransferToken,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<CommandResult, DomainError> {
    let ((), stored_events) = execute(command.collection_id, repo, |collection| {
        collection.transfer(
            command.token_id,
            &command.from,
            command.to.clone(),
            command.correlation_id,
            clock,
        )
    })
    .await?;

    Ok(CommandResult {
        aggregate_id: command.collection_id,
        stored_events,
    })
}
