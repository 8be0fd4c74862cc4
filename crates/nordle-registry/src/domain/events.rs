//! Domain events for the word-token registry.

use nordle_core::event::{DomainEvent, EventMetadata};
use nordle_core::ids::{Address, RequestId, TokenId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::fulfillment::RejectReason;
use super::word::Word;

/// Event type identifier for [`CollectionOpened`].
pub const COLLECTION_OPENED_EVENT_TYPE: &str = "nordle.collection_opened";
/// Event type identifier for [`CreateRequested`].
pub const CREATE_REQUESTED_EVENT_TYPE: &str = "nordle.create_requested";
/// Event type identifier for [`CombineRequested`].
pub const COMBINE_REQUESTED_EVENT_TYPE: &str = "nordle.combine_requested";
/// Event type identifier for [`TokenMinted`].
pub const TOKEN_MINTED_EVENT_TYPE: &str = "nordle.token_minted";
/// Event type identifier for [`TokenBurned`].
pub const TOKEN_BURNED_EVENT_TYPE: &str = "nordle.token_burned";
/// Event type identifier for [`RequestFulfilled`].
pub const REQUEST_FULFILLED_EVENT_TYPE: &str = "nordle.request_fulfilled";
/// Event type identifier for [`RequestRejected`].
pub const REQUEST_REJECTED_EVENT_TYPE: &str = "nordle.request_rejected";
/// Event type identifier for [`RequestExpired`].
pub const REQUEST_EXPIRED_EVENT_TYPE: &str = "nordle.request_expired";
/// Event type identifier for [`TokenTransferred`].
pub const TOKEN_TRANSFERRED_EVENT_TYPE: &str = "nordle.token_transferred";

/// Emitted once, when a collection is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionOpened {
    /// The collection identifier.
    pub collection_id: Uuid,
    /// Display name.
    pub name: Option<String>,
}

/// Emitted when a create request is recorded as pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequested {
    /// The collection identifier.
    pub collection_id: Uuid,
    /// Oracle-issued request id.
    pub request_id: RequestId,
    /// The requester.
    pub requester: Address,
    /// Word suggested by the requester.
    pub suggested_word: Option<Word>,
    /// Attached fee, smallest currency unit.
    pub fee: u64,
}

/// Emitted when a combine request is recorded as pending and its inputs
/// are locked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombineRequested {
    /// The collection identifier.
    pub collection_id: Uuid,
    /// Oracle-issued request id.
    pub request_id: RequestId,
    /// The requester.
    pub requester: Address,
    /// Input tokens, ascending.
    pub token_ids: Vec<TokenId>,
}

/// Emitted when a fulfillment mints a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMinted {
    /// The collection identifier.
    pub collection_id: Uuid,
    /// The request being fulfilled.
    pub request_id: RequestId,
    /// The new token.
    pub token_id: TokenId,
    /// Its owner.
    pub owner: Address,
    /// The word it binds.
    pub word: Word,
    /// Image reference supplied by the oracle.
    pub image_uri: Option<String>,
    /// Burned inputs (combine only).
    pub parents: Vec<TokenId>,
}

/// Emitted when a combine fulfillment burns an input token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBurned {
    /// The collection identifier.
    pub collection_id: Uuid,
    /// The combine request being fulfilled.
    pub request_id: RequestId,
    /// The burned token.
    pub token_id: TokenId,
    /// The word it released.
    pub word: Word,
}

/// Emitted as the last event of a successful fulfillment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFulfilled {
    /// The collection identifier.
    pub collection_id: Uuid,
    /// The fulfilled request.
    pub request_id: RequestId,
    /// The token it minted.
    pub token_id: TokenId,
}

/// Emitted when a fulfillment is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRejected {
    /// The collection identifier.
    pub collection_id: Uuid,
    /// The rejected request.
    pub request_id: RequestId,
    /// Why it was rejected.
    pub reason: RejectReason,
}

/// Emitted when a pending request expires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestExpired {
    /// The collection identifier.
    pub collection_id: Uuid,
    /// The expired request.
    pub request_id: RequestId,
}

/// Emitted when a live token changes owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTransferred {
    /// The collection identifier.
    pub collection_id: Uuid,
    /// The transferred token.
    pub token_id: TokenId,
    /// Previous owner.
    pub from: Address,
    /// New owner.
    pub to: Address,
}

/// Event payload variants for the word-token registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionEventKind {
    /// A collection was opened.
    CollectionOpened(CollectionOpened),
    /// A create request is pending.
    CreateRequested(CreateRequested),
    /// A combine request is pending.
    CombineRequested(CombineRequested),
    /// A token was minted.
    TokenMinted(TokenMinted),
    /// A token was burned.
    TokenBurned(TokenBurned),
    /// A request was fulfilled.
    RequestFulfilled(RequestFulfilled),
    /// A request was rejected.
    RequestRejected(RequestRejected),
    /// A request expired.
    RequestExpired(RequestExpired),
    /// A token changed owner.
    TokenTransferred(TokenTransferred),
}

/// Domain event envelope for the word-token registry.
#[derive(Debug, Clone)]
pub struct CollectionEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: CollectionEventKind,
}

impl CollectionEventKind {
    /// Event type identifier of this payload.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::CollectionOpened(_) => COLLECTION_OPENED_EVENT_TYPE,
            Self::CreateRequested(_) => CREATE_REQUESTED_EVENT_TYPE,
            Self::CombineRequested(_) => COMBINE_REQUESTED_EVENT_TYPE,
            Self::TokenMinted(_) => TOKEN_MINTED_EVENT_TYPE,
            Self::TokenBurned(_) => TOKEN_BURNED_EVENT_TYPE,
            Self::RequestFulfilled(_) => REQUEST_FULFILLED_EVENT_TYPE,
            Self::RequestRejected(_) => REQUEST_REJECTED_EVENT_TYPE,
            Self::RequestExpired(_) => REQUEST_EXPIRED_EVENT_TYPE,
            Self::TokenTransferred(_) => TOKEN_TRANSFERRED_EVENT_TYPE,
        }
    }
}

impl DomainEvent for CollectionEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> serde_json::Value {
        // Every field serializes to a JSON string, number, array or null.
        serde_json::to_value(&self.kind).expect("CollectionEventKind serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_round_trips_through_json() {
        let kind = CollectionEventKind::TokenMinted(TokenMinted {
            collection_id: Uuid::nil(),
            request_id: RequestId::new("req-1"),
            token_id: TokenId(2),
            owner: Address::parse("0xa11ce").unwrap(),
            word: Word::parse("unicornrainbow").unwrap(),
            image_uri: Some("ipfs://image".to_owned()),
            parents: vec![TokenId(0), TokenId(1)],
        });

        let value = serde_json::to_value(&kind).unwrap();
        let back: CollectionEventKind = serde_json::from_value(value.clone()).unwrap();

        assert_eq!(back, kind);
        assert_eq!(value["TokenMinted"]["word"], "unicornrainbow");
        assert_eq!(value["TokenMinted"]["parents"], serde_json::json!([0, 1]));
    }
}
