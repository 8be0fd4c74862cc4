//! Oracle callback routes.
//!
//! `/callback` is the at-least-once delivery path: it only decodes and
//! enqueues, and the fulfillment worker applies the answer. `/fulfill`
//! applies the answer inline and reports the outcome.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use nordle_core::command::Command;
use nordle_core::error::DomainError;
use nordle_core::ids::RequestId;
use nordle_oracle::codec;
use nordle_registry::application::command_handlers;
use nordle_registry::domain::commands::FulfillRequest;
use nordle_registry::domain::fulfillment::{FulfillmentOutcome, OracleAnswer};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /callback and POST /fulfill.
///
/// The answer is either `response`, the hex-encoded bytes produced by the
/// image service, or the structured `word` and `image_uri` fields.
#[derive(Debug, Deserialize)]
pub struct CallbackRequest {
    /// The collection that issued the request.
    pub collection_id: Uuid,
    /// The id returned at submission.
    pub request_id: String,
    /// Hex-encoded answer bytes.
    #[serde(default)]
    pub response: Option<String>,
    /// Word chosen or computed by the oracle.
    #[serde(default)]
    pub word: Option<String>,
    /// Image reference.
    #[serde(default)]
    pub image_uri: Option<String>,
}

impl CallbackRequest {
    fn into_command(self) -> Result<FulfillRequest, DomainError> {
        let answer = match self.response {
            Some(hex) => codec::decode_answer_hex(&hex)
                .map_err(|e| DomainError::InvalidInput(format!("oracle response: {e}")))?,
            None => OracleAnswer {
                word: self.word,
                image_uri: self.image_uri,
            },
        };
        Ok(FulfillRequest {
            correlation_id: Uuid::new_v4(),
            collection_id: self.collection_id,
            request_id: RequestId::new(self.request_id),
            answer,
        })
    }
}

/// Response body for POST /callback.
#[derive(Debug, Serialize)]
pub struct CallbackAccepted {
    /// The queued request.
    pub request_id: RequestId,
    /// Correlation id the worker logs under.
    pub correlation_id: Uuid,
}

/// Response body for POST /fulfill.
#[derive(Debug, Serialize)]
pub struct FulfillmentResponse {
    /// What the answer did.
    #[serde(flatten)]
    pub outcome: FulfillmentOutcome,
    /// IDs of the domain events produced and persisted.
    pub event_ids: Vec<Uuid>,
}

/// POST /callback
#[instrument(skip(state, request), fields(collection_id = %request.collection_id, request_id = %request.request_id))]
async fn callback(
    State(state): State<AppState>,
    Json(request): Json<CallbackRequest>,
) -> Result<(StatusCode, Json<CallbackAccepted>), ApiError> {
    let command = request.into_command()?;
    let accepted = CallbackAccepted {
        request_id: command.request_id.clone(),
        correlation_id: command.correlation_id,
    };

    state.oracle_runtime.fulfillment_queue.enqueue(command)?;
    info!(correlation_id = %accepted.correlation_id, "oracle callback queued");

    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

/// POST /fulfill
#[instrument(skip(state, request), fields(collection_id = %request.collection_id, request_id = %request.request_id))]
async fn fulfill(
    State(state): State<AppState>,
    Json(request): Json<CallbackRequest>,
) -> Result<Json<FulfillmentResponse>, ApiError> {
    let command = request.into_command()?;

    info!(correlation_id = %command.correlation_id, command_type = command.command_type(), "handling command");

    let result = command_handlers::handle_fulfill_request(
        &command,
        state.clock.as_ref(),
        state.word_bank.as_ref(),
        &state.rng,
        &*state.event_repository,
    )
    .await?;

    Ok(Json(FulfillmentResponse {
        outcome: result.outcome,
        event_ids: result.stored_events.iter().map(|e| e.event_id).collect(),
    }))
}

/// Returns the router for oracle callbacks.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/callback", post(callback))
        .route("/fulfill", post(fulfill))
}
