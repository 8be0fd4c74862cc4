//! Routes for collections: submissions, transfers, expiry and read models.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use nordle_core::command::Command;
use nordle_core::error::DomainError;
use nordle_core::ids::{Address, RequestId, TokenId};
use nordle_core::oracle::RequestKind;
use nordle_core::repository::StoredEvent;
use nordle_registry::application::{command_handlers, query_handlers};
use nordle_registry::domain::commands;
use nordle_registry::domain::fulfillment::ExpireOutcome;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Default, Deserialize)]
pub struct OpenCollectionRequest {
    /// Identifier to open under; generated when absent.
    #[serde(default)]
    pub collection_id: Option<Uuid>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
}

/// Request body for POST /{collection_id}/create.
#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    /// Account that receives the minted token.
    pub requester: String,
    /// Word from the word bank to mint, if any.
    #[serde(default)]
    pub suggested_word: Option<String>,
    /// Fee attached to the request.
    #[serde(default)]
    pub fee: u64,
}

/// Request body for POST /{collection_id}/combine.
#[derive(Debug, Deserialize)]
pub struct CombineRequest {
    /// Owner of both inputs.
    pub requester: String,
    /// The two tokens to combine.
    pub token_ids: [TokenId; 2],
}

/// Request body for POST /{collection_id}/transfer.
#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    /// Token to move.
    pub token_id: TokenId,
    /// Current owner.
    pub from: String,
    /// New owner.
    pub to: String,
}

/// Request body for POST /{collection_id}/expire-stale.
#[derive(Debug, Default, Deserialize)]
pub struct ExpireStaleRequest {
    /// Age in seconds; the configured TTL when absent.
    #[serde(default)]
    pub max_age_secs: Option<u64>,
}

/// Response body returned after a command is successfully handled.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    /// IDs of the domain events produced and persisted.
    pub event_ids: Vec<Uuid>,
}

/// Response body for POST /.
#[derive(Debug, Serialize)]
pub struct OpenCollectionResponse {
    /// The opened collection.
    pub collection_id: Uuid,
    /// IDs of the domain events produced and persisted.
    pub event_ids: Vec<Uuid>,
}

/// Response body for create and combine submissions.
#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    /// The collection the request belongs to.
    pub collection_id: Uuid,
    /// Id the oracle callback will carry.
    pub request_id: RequestId,
    /// Create or combine.
    pub kind: RequestKind,
    /// Locked inputs, ascending.
    pub token_ids: Vec<TokenId>,
    /// IDs of the domain events produced and persisted.
    pub event_ids: Vec<Uuid>,
}

/// Response body for POST /{collection_id}/requests/{request_id}/expire.
#[derive(Debug, Serialize)]
pub struct ExpireResponse {
    /// What the expiry did.
    #[serde(flatten)]
    pub outcome: ExpireOutcome,
    /// IDs of the domain events produced and persisted.
    pub event_ids: Vec<Uuid>,
}

/// Response body for POST /{collection_id}/expire-stale.
#[derive(Debug, Serialize)]
pub struct ExpireStaleResponse {
    /// Requests moved to `expired`, oldest first.
    pub expired: Vec<RequestId>,
    /// IDs of the domain events produced and persisted.
    pub event_ids: Vec<Uuid>,
}

fn event_ids(stored_events: &[StoredEvent]) -> Vec<Uuid> {
    stored_events.iter().map(|e| e.event_id).collect()
}

/// POST /
#[instrument(skip(state, request))]
async fn open_collection(
    State(state): State<AppState>,
    Json(request): Json<OpenCollectionRequest>,
) -> Result<Json<OpenCollectionResponse>, ApiError> {
    let command = commands::OpenCollection {
        correlation_id: Uuid::new_v4(),
        collection_id: request.collection_id.unwrap_or_else(Uuid::new_v4),
        name: request.name,
    };

    info!(correlation_id = %command.correlation_id, collection_id = %command.collection_id, command_type = command.command_type(), "handling command");

    let result = command_handlers::handle_open_collection(
        &command,
        state.clock.as_ref(),
        &*state.event_repository,
    )
    .await?;
    state.oracle_runtime.sweeper.watch(command.collection_id);

    Ok(Json(OpenCollectionResponse {
        collection_id: result.aggregate_id,
        event_ids: event_ids(&result.stored_events),
    }))
}

/// POST /{collection_id}/create
#[instrument(skip(state, request), fields(collection_id = %collection_id))]
async fn request_create(
    State(state): State<AppState>,
    Path(collection_id): Path<Uuid>,
    Json(request): Json<CreateRequest>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let command = commands::RequestCreate {
        correlation_id: Uuid::new_v4(),
        collection_id,
        requester: Address::parse(&request.requester)?,
        suggested_word: request.suggested_word,
        fee: request.fee,
    };

    info!(correlation_id = %command.correlation_id, command_type = command.command_type(), "handling command");

    let result = command_handlers::handle_request_create(
        &command,
        state.clock.as_ref(),
        state.word_bank.as_ref(),
        state.oracle.as_ref(),
        &*state.event_repository,
    )
    .await?;
    state.oracle_runtime.sweeper.watch(collection_id);

    Ok(Json(SubmissionResponse {
        collection_id,
        request_id: result.request_id,
        kind: result.kind,
        token_ids: result.token_ids,
        event_ids: event_ids(&result.stored_events),
    }))
}

/// POST /{collection_id}/combine
#[instrument(skip(state, request), fields(collection_id = %collection_id))]
async fn request_combine(
    State(state): State<AppState>,
    Path(collection_id): Path<Uuid>,
    Json(request): Json<CombineRequest>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let command = commands::RequestCombine {
        correlation_id: Uuid::new_v4(),
        collection_id,
        requester: Address::parse(&request.requester)?,
        token_ids: request.token_ids,
    };

    info!(correlation_id = %command.correlation_id, command_type = command.command_type(), "handling command");

    let result = command_handlers::handle_request_combine(
        &command,
        state.clock.as_ref(),
        state.oracle.as_ref(),
        &*state.event_repository,
    )
    .await?;
    state.oracle_runtime.sweeper.watch(collection_id);

    Ok(Json(SubmissionResponse {
        collection_id,
        request_id: result.request_id,
        kind: result.kind,
        token_ids: result.token_ids,
        event_ids: event_ids(&result.stored_events),
    }))
}

/// POST /{collection_id}/transfer
#[instrument(skip(state, request), fields(collection_id = %collection_id, token_id = %request.token_id))]
async fn transfer_token(
    State(state): State<AppState>,
    Path(collection_id): Path<Uuid>,
    Json(request): Json<TransferRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::TransferToken {
        correlation_id: Uuid::new_v4(),
        collection_id,
        token_id: request.token_id,
        from: Address::parse(&request.from)?,
        to: Address::parse(&request.to)?,
    };

    info!(correlation_id = %command.correlation_id, command_type = command.command_type(), "handling command");

    let result = command_handlers::handle_transfer_token(
        &command,
        state.clock.as_ref(),
        &*state.event_repository,
    )
    .await?;

    Ok(Json(CommandResponse {
        event_ids: event_ids(&result.stored_events),
    }))
}

/// POST /{collection_id}/requests/{request_id}/expire
#[instrument(skip(state))]
async fn expire_request(
    State(state): State<AppState>,
    Path((collection_id, request_id)): Path<(Uuid, String)>,
) -> Result<Json<ExpireResponse>, ApiError> {
    let command = commands::ExpireRequest {
        correlation_id: Uuid::new_v4(),
        collection_id,
        request_id: RequestId::new(request_id),
    };

    info!(correlation_id = %command.correlation_id, command_type = command.command_type(), "handling command");

    let result = command_handlers::handle_expire_request(
        &command,
        state.clock.as_ref(),
        &*state.event_repository,
    )
    .await?;

    Ok(Json(ExpireResponse {
        outcome: result.outcome,
        event_ids: event_ids(&result.stored_events),
    }))
}

/// POST /{collection_id}/expire-stale
#[instrument(skip(state, request), fields(collection_id = %collection_id))]
async fn expire_stale(
    State(state): State<AppState>,
    Path(collection_id): Path<Uuid>,
    Json(request): Json<ExpireStaleRequest>,
) -> Result<Json<ExpireStaleResponse>, ApiError> {
    let max_age = match request.max_age_secs {
        Some(secs) => i64::try_from(secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| {
                ApiError::from(DomainError::InvalidInput(format!(
                    "max_age_secs {secs} is out of range"
                )))
            })?,
        None => state.oracle_runtime.request_ttl,
    };
    let command = commands::ExpireStaleRequests {
        correlation_id: Uuid::new_v4(),
        collection_id,
        max_age,
    };

    info!(correlation_id = %command.correlation_id, command_type = command.command_type(), "handling command");

    let result = command_handlers::handle_expire_stale_requests(
        &command,
        state.clock.as_ref(),
        &*state.event_repository,
    )
    .await?;

    Ok(Json(ExpireStaleResponse {
        expired: result.expired,
        event_ids: event_ids(&result.stored_events),
    }))
}

/// GET /{collection_id}
#[instrument(skip(state))]
async fn get_collection(
    State(state): State<AppState>,
    Path(collection_id): Path<Uuid>,
) -> Result<Json<query_handlers::CollectionView>, ApiError> {
    let view = query_handlers::get_collection_by_id(collection_id, &*state.event_repository).await?;
    Ok(Json(view))
}

/// GET /{collection_id}/requests
#[instrument(skip(state))]
async fn list_pending_requests(
    State(state): State<AppState>,
    Path(collection_id): Path<Uuid>,
) -> Result<Json<Vec<query_handlers::RequestView>>, ApiError> {
    let views = query_handlers::list_pending_requests(collection_id, &*state.event_repository).await?;
    Ok(Json(views))
}

/// GET /{collection_id}/requests/{request_id}
#[instrument(skip(state))]
async fn get_request(
    State(state): State<AppState>,
    Path((collection_id, request_id)): Path<(Uuid, String)>,
) -> Result<Json<query_handlers::RequestView>, ApiError> {
    let view = query_handlers::get_request(
        collection_id,
        &RequestId::new(request_id),
        &*state.event_repository,
    )
    .await?;
    Ok(Json(view))
}

/// GET /{collection_id}/tokens/{token_id}
#[instrument(skip(state))]
async fn get_token(
    State(state): State<AppState>,
    Path((collection_id, token_id)): Path<(Uuid, u64)>,
) -> Result<Json<query_handlers::TokenView>, ApiError> {
    let view =
        query_handlers::get_token(collection_id, TokenId(token_id), &*state.event_repository)
            .await?;
    Ok(Json(view))
}

/// GET /{collection_id}/owners/{address}/tokens
#[instrument(skip(state))]
async fn get_tokens_by_owner(
    State(state): State<AppState>,
    Path((collection_id, address)): Path<(Uuid, String)>,
) -> Result<Json<query_handlers::OwnerTokensView>, ApiError> {
    let owner = Address::parse(&address)?;
    let view =
        query_handlers::get_tokens_by_owner(collection_id, &owner, &*state.event_repository)
            .await?;
    Ok(Json(view))
}

/// GET /{collection_id}/words/{word}
#[instrument(skip(state))]
async fn get_word(
    State(state): State<AppState>,
    Path((collection_id, word)): Path<(Uuid, String)>,
) -> Result<Json<query_handlers::WordView>, ApiError> {
    let view = query_handlers::get_word(collection_id, &word, &*state.event_repository).await?;
    Ok(Json(view))
}

/// Returns the router for collections.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(open_collection))
        .route("/{collection_id}", get(get_collection))
        .route("/{collection_id}/create", post(request_create))
        .route("/{collection_id}/combine", post(request_combine))
        .route("/{collection_id}/transfer", post(transfer_token))
        .route("/{collection_id}/expire-stale", post(expire_stale))
        .route("/{collection_id}/requests", get(list_pending_requests))
        .route("/{collection_id}/requests/{request_id}", get(get_request))
        .route(
            "/{collection_id}/requests/{request_id}/expire",
            post(expire_request),
        )
        .route("/{collection_id}/tokens/{token_id}", get(get_token))
        .route(
            "/{collection_id}/owners/{address}/tokens",
            get(get_tokens_by_owner),
        )
        .route("/{collection_id}/words/{word}", get(get_word))
}
