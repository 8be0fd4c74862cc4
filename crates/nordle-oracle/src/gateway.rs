//! In-process oracle gateway.
//!
//! Issues request ids and fans every issued request out to subscribers, which
//! stand in for the off-site image and word services. Their answers come back
//! through the fulfillment queue or the HTTP callback.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use nordle_core::error::DomainError;
use nordle_core::ids::RequestId;
use nordle_core::oracle::{OracleGateway, OracleRequest};
use sha2::{Digest, Sha256};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// Default number of issued requests buffered per subscriber.
pub const DEFAULT_ISSUE_CAPACITY: usize = 1024;

/// A request handed to the oracle integration together with its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedRequest {
    /// Id the fulfillment must carry.
    pub request_id: RequestId,
    /// The request body.
    pub request: OracleRequest,
}

/// Gateway that derives ids locally and broadcasts issued requests.
///
/// Ids are the hex SHA-256 of a per-instance UUIDv7, the collection id and
/// a nonce. The instance id changes on every start, so ids never repeat
/// across restarts over a persistent store.
pub struct LocalOracleGateway {
    instance: Uuid,
    nonce: AtomicU64,
    tx: broadcast::Sender<IssuedRequest>,
}

impl LocalOracleGateway {
    /// Creates a gateway buffering up to `capacity` issued requests per
    /// subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            instance: Uuid::now_v7(),
            nonce: AtomicU64::new(0),
            tx,
        }
    }

    /// Subscribes to requests issued from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<IssuedRequest> {
        self.tx.subscribe()
    }

    fn next_id(&self, request: &OracleRequest) -> RequestId {
        let nonce = self.nonce.fetch_add(1, Ordering::Relaxed);
        let mut hasher = Sha256::new();
        hasher.update(self.instance.as_bytes());
        hasher.update(request.collection_id.as_bytes());
        hasher.update(nonce.to_be_bytes());
        RequestId::new(format!("0x{}", hex::encode(hasher.finalize())))
    }
}

impl Default for LocalOracleGateway {
    fn default() -> Self {
        Self::new(DEFAULT_ISSUE_CAPACITY)
    }
}

#[async_trait]
impl OracleGateway for LocalOracleGateway {
    async fn issue(&self, request: &OracleRequest) -> Result<RequestId, DomainError> {
        let request_id = self.next_id(request);
        let issued = IssuedRequest {
            request_id: request_id.clone(),
            request: request.clone(),
        };
        // No subscribers is fine; the callback path still works.
        if self.tx.send(issued).is_err() {
            debug!(%request_id, "issued request has no subscribers");
        }
        Ok(request_id)
    }
}
