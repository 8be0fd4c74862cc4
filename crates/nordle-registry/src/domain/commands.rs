//! Commands accepted by a collection.
//!
//! Every command carries the correlation id stamped on the events it
//! produces and the id of the collection it targets.

use nordle_core::command::Command;
use nordle_core::ids::{Address, RequestId, TokenId};
use uuid::Uuid;

use super::fulfillment::OracleAnswer;

macro_rules! collection_command {
    ($ty:ident, $name:literal) => {
        impl Command for $ty {
            fn command_type(&self) -> &'static str {
                $name
            }

            fn correlation_id(&self) -> Uuid {
                self.correlation_id
            }

            fn aggregate_id(&self) -> Uuid {
                self.collection_id
            }
        }
    };
}

/// Starts an empty collection stream.
#[derive(Debug, Clone)]
pub struct OpenCollection {
    pub correlation_id: Uuid,
    pub collection_id: Uuid,
    /// Display name.
    pub name: Option<String>,
}

/// Asks the oracle for a new word token.
#[derive(Debug, Clone)]
pub struct RequestCreate {
    pub correlation_id: Uuid,
    pub collection_id: Uuid,
    /// Receives the minted token.
    pub requester: Address,
    /// Word the requester would like; the oracle may override it.
    pub suggested_word: Option<String>,
    /// Attached fee, smallest currency unit.
    pub fee: u64,
}

/// Locks two live tokens and asks the oracle to fuse their words.
#[derive(Debug, Clone)]
pub struct RequestCombine {
    pub correlation_id: Uuid,
    pub collection_id: Uuid,
    /// Must own both inputs. Receives the minted token.
    pub requester: Address,
    /// The two inputs, in any order.
    pub token_ids: [TokenId; 2],
}

/// Delivers an oracle answer.
#[derive(Debug, Clone)]
pub struct FulfillRequest {
    pub correlation_id: Uuid,
    pub collection_id: Uuid,
    pub request_id: RequestId,
    pub answer: OracleAnswer,
}

/// Closes one pending request without a mint.
#[derive(Debug, Clone)]
pub struct ExpireRequest {
    pub correlation_id: Uuid,
    pub collection_id: Uuid,
    pub request_id: RequestId,
}

/// Closes every pending request submitted at least `max_age` ago.
#[derive(Debug, Clone)]
pub struct ExpireStaleRequests {
    pub correlation_id: Uuid,
    pub collection_id: Uuid,
    pub max_age: chrono::Duration,
}

/// Moves a live, unlocked token to a new owner.
#[derive(Debug, Clone)]
pub struct TransferToken {
    pub correlation_id: Uuid,
    pub collection_id: Uuid,
    pub token_id: TokenId,
    /// Must be the current owner.
    pub from: Address,
    pub to: Address,
}

collection_command!(OpenCollection, "nordle.open_collection");
collection_command!(RequestCreate, "nordle.request_create");
collection_command!(RequestCombine, "nordle.request_combine");
collection_command!(FulfillRequest, "nordle.fulfill_request");
collection_command!(ExpireRequest, "nordle.expire_request");
collection_command!(ExpireStaleRequests, "nordle.expire_stale_requests");
collection_command!(TransferToken, "nordle.transfer_token");
