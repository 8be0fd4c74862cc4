//! The `Collection` aggregate root.
//!
//! One collection is one deployment of the word-token registry: its tokens,
//! its word bindings and its oracle request ledger. Command methods decide
//! against the current state and stage events; state only changes in
//! [`AggregateRoot::apply`], so a command that returns an error stages
//! nothing and a fulfillment either stages its whole batch or nothing.

use chrono::{DateTime, Utc};
use nordle_core::aggregate::AggregateRoot;
use nordle_core::clock::Clock;
use nordle_core::error::DomainError;
use nordle_core::event::EventMetadata;
use nordle_core::ids::{Address, RequestId, TokenId};
use nordle_core::oracle::RequestKind;
use nordle_core::rng::DeterministicRng;
use uuid::Uuid;

use super::events::{
    CollectionEvent, CollectionEventKind, CollectionOpened, RequestExpired, RequestFulfilled,
    RequestRejected, TokenBurned, TokenMinted, TokenTransferred,
};
use super::fulfillment::{ExpireOutcome, FulfillmentOutcome, OracleAnswer, RejectReason};
use super::ledger::{Lookup, Request, RequestLedger, RequestStatus, Settlement};
use super::registry::{StagedEffect, Token, WordRegistry};
use super::word::Word;
use super::word_bank::WordBank;

/// The aggregate root for a word-token collection.
#[derive(Debug)]
pub struct Collection {
    /// Aggregate identifier.
    pub id: Uuid,
    /// Current version (event count).
    pub(crate) version: i64,
    /// Display name given when the collection was opened.
    pub(crate) name: Option<String>,
    /// When the collection was opened; `None` until `CollectionOpened`.
    pub(crate) opened_at: Option<DateTime<Utc>>,
    /// Tokens and live word bindings.
    pub(crate) registry: WordRegistry,
    /// Oracle requests and token locks.
    pub(crate) ledger: RequestLedger,
    /// Uncommitted events pending persistence.
    uncommitted_events: Vec<CollectionEvent>,
}

impl Collection {
    /// Creates an empty, unopened collection.
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            version: 0,
            name: None,
            opened_at: None,
            registry: WordRegistry::new(),
            ledger: RequestLedger::new(),
            uncommitted_events: Vec::new(),
        }
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// When the collection was opened.
    #[must_use]
    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        self.opened_at
    }

    /// The word registry.
    #[must_use]
    pub fn registry(&self) -> &WordRegistry {
        &self.registry
    }

    /// The request ledger.
    #[must_use]
    pub fn ledger(&self) -> &RequestLedger {
        &self.ledger
    }

    pub(crate) fn stage(
        &mut self,
        kind: CollectionEventKind,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) {
        let event = CollectionEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: kind.event_type().to_owned(),
                aggregate_id: self.id,
                sequence_number: self.next_sequence_number(),
                correlation_id,
                causation_id: correlation_id,
                occurred_at: clock.now(),
            },
            kind,
        };
        self.uncommitted_events.push(event);
    }

    /// Opens the collection, producing a `CollectionOpened` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidInput` if the collection is already open.
    pub fn open(
        &mut self,
        name: Option<String>,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.opened_at.is_some() {
            return Err(DomainError::InvalidInput(format!(
                "collection {} is already open",
                self.id
            )));
        }
        let name = name
            .map(|n| n.trim().to_owned())
            .filter(|n| !n.is_empty());
        self.stage(
            CollectionEventKind::CollectionOpened(CollectionOpened {
                collection_id: self.id,
                name,
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Moves a live token from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidInput` if the token does not exist, is
    /// burned, or is not owned by `from`, and `DomainError::TokenLocked` if a
    /// pending request holds it.
    pub fn transfer(
        &mut self,
        token_id: TokenId,
        from: &Address,
        to: Address,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let token = self
            .registry
            .token(token_id)
            .ok_or_else(|| DomainError::InvalidInput(format!("token {token_id} does not exist")))?;
        if !token.is_live() {
            return Err(DomainError::InvalidInput(format!(
                "token {token_id} is burned"
            )));
        }
        if &token.owner != from {
            return Err(DomainError::InvalidInput(format!(
                "token {token_id} is not owned by {from}"
            )));
        }
        if let Some(holder) = self.ledger.lock_holder(token_id) {
            return Err(DomainError::TokenLocked {
                token_id,
                request_id: holder.clone(),
            });
        }
        self.stage(
            CollectionEventKind::TokenTransferred(TokenTransferred {
                collection_id: self.id,
                token_id,
                from: from.clone(),
                to,
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Applies an oracle answer to a request.
    ///
    /// A pending request is settled: the owning flow either mints (and for a
    /// combine, burns) or rejects, in one staged batch. A request that is
    /// already terminal yields `AlreadyFulfilled` and stages nothing.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownRequest` if the id was never recorded.
    pub fn fulfill(
        &mut self,
        request_id: &RequestId,
        answer: &OracleAnswer,
        bank: &dyn WordBank,
        rng: &mut dyn DeterministicRng,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<FulfillmentOutcome, DomainError> {
        let request = match self.ledger.open(request_id)? {
            Lookup::Settled(request) => {
                return Ok(FulfillmentOutcome::AlreadyFulfilled {
                    request_id: request.id.clone(),
                    status: request.status,
                });
            }
            Lookup::Pending(request) => request.clone(),
        };
        let outcome = match request.kind {
            RequestKind::Create => {
                self.fulfill_create(&request, answer, bank, rng, correlation_id, clock)
            }
            RequestKind::Combine => self.fulfill_combine(&request, answer, correlation_id, clock),
        };
        Ok(outcome)
    }

    /// Expires a pending request and releases its locks.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownRequest` for an unknown id and
    /// `DomainError::RequestClosed` if the request was fulfilled or failed.
    pub fn expire(
        &mut self,
        request_id: &RequestId,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<ExpireOutcome, DomainError> {
        match self.ledger.open(request_id)? {
            Lookup::Settled(request) if request.status == RequestStatus::Expired => {
                Ok(ExpireOutcome::AlreadyExpired {
                    request_id: request.id.clone(),
                })
            }
            Lookup::Settled(request) => Err(DomainError::RequestClosed {
                request_id: request.id.clone(),
                status: request.status.to_string(),
            }),
            Lookup::Pending(request) => {
                let request_id = request.id.clone();
                self.stage_expired(request_id.clone(), correlation_id, clock);
                Ok(ExpireOutcome::Expired { request_id })
            }
        }
    }

    /// Expires every pending request submitted at or before
    /// `now - max_age`, returning their ids oldest first.
    pub fn expire_stale(
        &mut self,
        max_age: chrono::Duration,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Vec<RequestId> {
        let cutoff = clock.cutoff(max_age);
        let stale: Vec<RequestId> = self
            .ledger
            .stale(cutoff)
            .into_iter()
            .map(|r| r.id.clone())
            .collect();
        for request_id in &stale {
            self.stage_expired(request_id.clone(), correlation_id, clock);
        }
        stale
    }

    fn stage_expired(&mut self, request_id: RequestId, correlation_id: Uuid, clock: &dyn Clock) {
        self.stage(
            CollectionEventKind::RequestExpired(RequestExpired {
                collection_id: self.id,
                request_id,
            }),
            correlation_id,
            clock,
        );
    }

    /// Stages the terminal rejection of a pending request.
    pub(crate) fn reject(
        &mut self,
        request: &Request,
        reason: RejectReason,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> FulfillmentOutcome {
        self.stage(
            CollectionEventKind::RequestRejected(RequestRejected {
                collection_id: self.id,
                request_id: request.id.clone(),
                reason: reason.clone(),
            }),
            correlation_id,
            clock,
        );
        FulfillmentOutcome::Rejected {
            request_id: request.id.clone(),
            reason,
        }
    }

    /// Stages a committed set of registry effects followed by the request's
    /// `RequestFulfilled` event. `effects` must contain the mint of
    /// `token_id`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn settle_minted(
        &mut self,
        request: &Request,
        token_id: TokenId,
        word: Word,
        effects: Vec<StagedEffect>,
        image_uri: Option<&str>,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> FulfillmentOutcome {
        let mut burned = Vec::new();
        for effect in effects {
            let kind = match effect {
                StagedEffect::Burn { token_id, word } => {
                    burned.push(token_id);
                    CollectionEventKind::TokenBurned(TokenBurned {
                        collection_id: self.id,
                        request_id: request.id.clone(),
                        token_id,
                        word,
                    })
                }
                StagedEffect::Mint {
                    token_id,
                    word,
                    owner,
                } => CollectionEventKind::TokenMinted(TokenMinted {
                    collection_id: self.id,
                    request_id: request.id.clone(),
                    token_id,
                    owner,
                    word,
                    image_uri: image_uri.map(str::to_owned),
                    parents: request.inputs.clone(),
                }),
            };
            self.stage(kind, correlation_id, clock);
        }

        self.stage(
            CollectionEventKind::RequestFulfilled(RequestFulfilled {
                collection_id: self.id,
                request_id: request.id.clone(),
                token_id,
            }),
            correlation_id,
            clock,
        );
        FulfillmentOutcome::Minted {
            request_id: request.id.clone(),
            kind: request.kind,
            token_id,
            word,
            burned,
        }
    }
}

impl AggregateRoot for Collection {
    type Event = CollectionEvent;

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) {
        let at = event.metadata.occurred_at;
        match &event.kind {
            CollectionEventKind::CollectionOpened(payload) => {
                self.name.clone_from(&payload.name);
                self.opened_at = Some(at);
            }
            CollectionEventKind::CreateRequested(payload) => {
                let mut request = Request::pending(
                    payload.request_id.clone(),
                    RequestKind::Create,
                    Vec::new(),
                    payload.requester.clone(),
                    at,
                );
                request.suggested_word.clone_from(&payload.suggested_word);
                request.fee = payload.fee;
                self.ledger.record(request);
            }
            CollectionEventKind::CombineRequested(payload) => {
                self.ledger.record(Request::pending(
                    payload.request_id.clone(),
                    RequestKind::Combine,
                    payload.token_ids.clone(),
                    payload.requester.clone(),
                    at,
                ));
            }
            CollectionEventKind::TokenMinted(payload) => {
                let token = Token {
                    id: payload.token_id,
                    owner: payload.owner.clone(),
                    word: payload.word.clone(),
                    image_uri: payload.image_uri.clone(),
                    parents: payload.parents.clone(),
                    minted_by: payload.request_id.clone(),
                    minted_at: at,
                    burned_by: None,
                };
                if payload.token_id != self.registry.next_token_id() {
                    tracing::error!(
                        collection_id = %self.id,
                        token_id = %payload.token_id,
                        expected = %self.registry.next_token_id(),
                        "minted token id out of sequence"
                    );
                }
                if let Err(reason) = self.registry.mint(token) {
                    tracing::error!(
                        collection_id = %self.id,
                        token_id = %payload.token_id,
                        %reason,
                        "replayed mint violates the live-word invariant"
                    );
                }
            }
            CollectionEventKind::TokenBurned(payload) => {
                self.registry.burn(payload.token_id, &payload.request_id);
            }
            CollectionEventKind::RequestFulfilled(payload) => {
                self.ledger.settle(
                    &payload.request_id,
                    Settlement::Fulfilled(payload.token_id),
                    at,
                );
            }
            CollectionEventKind::RequestRejected(payload) => {
                self.ledger.settle(
                    &payload.request_id,
                    Settlement::Failed(payload.reason.clone()),
                    at,
                );
            }
            CollectionEventKind::RequestExpired(payload) => {
                self.ledger
                    .settle(&payload.request_id, Settlement::Expired, at);
            }
            CollectionEventKind::TokenTransferred(payload) => {
                self.registry.transfer(payload.token_id, payload.to.clone());
            }
        }
        self.version += 1;
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn clear_uncommitted_events(&mut self) {
        self.uncommitted_events.clear();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::events::{
        COLLECTION_OPENED_EVENT_TYPE, REQUEST_EXPIRED_EVENT_TYPE, TOKEN_TRANSFERRED_EVENT_TYPE,
    };
    use crate::domain::word_bank::StaticWordBank;
    use nordle_core::event::DomainEvent;
    use nordle_test_support::{FixedClock, MockRng, fixed_now};

    pub(crate) fn alice() -> Address {
        Address::parse("0xa11ce").unwrap()
    }

    pub(crate) fn bob() -> Address {
        Address::parse("0xb0b").unwrap()
    }

    pub(crate) fn bank() -> StaticWordBank {
        StaticWordBank::builtin()
    }

    /// Applies and clears the staged events, as a persist-and-reload would.
    pub(crate) fn commit(collection: &mut Collection) {
        for event in collection.uncommitted_events().to_vec() {
            collection.apply(&event);
        }
        collection.clear_uncommitted_events();
    }

    pub(crate) fn opened() -> Collection {
        let mut collection = Collection::new(Uuid::new_v4());
        collection
            .open(Some("genesis".into()), Uuid::new_v4(), &FixedClock(fixed_now()))
            .unwrap();
        commit(&mut collection);
        collection
    }

    /// Creates and fulfills one token per word, all owned by `owner`.
    pub(crate) fn with_tokens(words: &[&str], owner: &Address) -> Collection {
        let clock = FixedClock(fixed_now());
        let mut collection = opened();
        for (i, raw) in words.iter().enumerate() {
            let request_id = RequestId::new(format!("seed-{i}"));
            collection
                .request_create(
                    request_id.clone(),
                    owner.clone(),
                    None,
                    0,
                    &bank(),
                    Uuid::new_v4(),
                    &clock,
                )
                .unwrap();
            commit(&mut collection);
            collection
                .fulfill(
                    &request_id,
                    &OracleAnswer::word(*raw),
                    &bank(),
                    &mut MockRng,
                    Uuid::new_v4(),
                    &clock,
                )
                .unwrap();
            commit(&mut collection);
        }
        collection
    }

    #[test]
    fn test_open_produces_collection_opened_event() {
        // Arrange
        let collection_id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();
        let clock = FixedClock(fixed_now());
        let mut collection = Collection::new(collection_id);

        // Act
        collection
            .open(Some("  genesis ".into()), correlation_id, &clock)
            .unwrap();

        // Assert
        let events = collection.uncommitted_events();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.event_type(), COLLECTION_OPENED_EVENT_TYPE);
        assert_eq!(event.metadata().event_type, COLLECTION_OPENED_EVENT_TYPE);
        let meta = event.metadata();
        assert_eq!(meta.aggregate_id, collection_id);
        assert_eq!(meta.sequence_number, 1);
        assert_eq!(meta.correlation_id, correlation_id);
        assert_eq!(meta.occurred_at, fixed_now());
        match &event.kind {
            CollectionEventKind::CollectionOpened(payload) => {
                assert_eq!(payload.name.as_deref(), Some("genesis"));
            }
            other => panic!("expected CollectionOpened, got {other:?}"),
        }
    }

    #[test]
    fn test_open_twice_is_rejected() {
        let mut collection = opened();

        let result = collection.open(None, Uuid::new_v4(), &FixedClock(fixed_now()));

        assert!(matches!(result, Err(DomainError::InvalidInput(_))));
        assert!(collection.uncommitted_events().is_empty());
    }

    #[test]
    fn test_fulfill_unknown_request_is_an_error() {
        let mut collection = opened();

        let result = collection.fulfill(
            &RequestId::new("never-issued"),
            &OracleAnswer::word("unicorn"),
            &bank(),
            &mut MockRng,
            Uuid::new_v4(),
            &FixedClock(fixed_now()),
        );

        assert!(matches!(result, Err(DomainError::UnknownRequest(_))));
        assert!(collection.uncommitted_events().is_empty());
    }

    #[test]
    fn test_second_fulfill_is_side_effect_free() {
        // Arrange
        let mut collection = with_tokens(&["unicorn"], &alice());
        let version = collection.version();

        // Act
        let outcome = collection
            .fulfill(
                &RequestId::new("seed-0"),
                &OracleAnswer::word("rainbow"),
                &bank(),
                &mut MockRng,
                Uuid::new_v4(),
                &FixedClock(fixed_now()),
            )
            .unwrap();

        // Assert
        assert_eq!(
            outcome,
            FulfillmentOutcome::AlreadyFulfilled {
                request_id: RequestId::new("seed-0"),
                status: RequestStatus::Fulfilled,
            }
        );
        assert!(collection.uncommitted_events().is_empty());
        assert_eq!(collection.version(), version);
        assert_eq!(collection.registry().len(), 1);
    }

    #[test]
    fn test_expire_pending_request_releases_locks() {
        // Arrange
        let clock = FixedClock(fixed_now());
        let mut collection = with_tokens(&["unicorn", "rainbow"], &alice());
        collection
            .request_combine(
                RequestId::new("req-c"),
                alice(),
                [TokenId(0), TokenId(1)],
                Uuid::new_v4(),
                &clock,
            )
            .unwrap();
        commit(&mut collection);
        assert!(collection.ledger().lock_holder(TokenId(0)).is_some());

        // Act
        let outcome = collection
            .expire(&RequestId::new("req-c"), Uuid::new_v4(), &clock)
            .unwrap();
        let staged = collection.uncommitted_events()[0].event_type();
        commit(&mut collection);

        // Assert
        assert_eq!(
            outcome,
            ExpireOutcome::Expired {
                request_id: RequestId::new("req-c")
            }
        );
        assert_eq!(staged, REQUEST_EXPIRED_EVENT_TYPE);
        assert!(collection.ledger().lock_holder(TokenId(0)).is_none());
        assert!(collection.ledger().lock_holder(TokenId(1)).is_none());
        let request = collection.ledger().get(&RequestId::new("req-c")).unwrap();
        assert_eq!(request.status, RequestStatus::Expired);
    }

    #[test]
    fn test_expire_is_noop_on_expired_and_closed_on_fulfilled() {
        let clock = FixedClock(fixed_now());
        let mut collection = with_tokens(&["unicorn"], &alice());
        collection
            .request_create(
                RequestId::new("req-x"),
                alice(),
                None,
                0,
                &bank(),
                Uuid::new_v4(),
                &clock,
            )
            .unwrap();
        commit(&mut collection);
        collection
            .expire(&RequestId::new("req-x"), Uuid::new_v4(), &clock)
            .unwrap();
        commit(&mut collection);

        let again = collection
            .expire(&RequestId::new("req-x"), Uuid::new_v4(), &clock)
            .unwrap();
        let closed = collection.expire(&RequestId::new("seed-0"), Uuid::new_v4(), &clock);

        assert_eq!(
            again,
            ExpireOutcome::AlreadyExpired {
                request_id: RequestId::new("req-x")
            }
        );
        match closed {
            Err(DomainError::RequestClosed { status, .. }) => assert_eq!(status, "fulfilled"),
            other => panic!("expected RequestClosed, got {other:?}"),
        }
        assert!(collection.uncommitted_events().is_empty());
    }

    #[test]
    fn test_late_callback_on_expired_request_reports_expired() {
        let clock = FixedClock(fixed_now());
        let mut collection = opened();
        collection
            .request_create(
                RequestId::new("req-1"),
                alice(),
                None,
                0,
                &bank(),
                Uuid::new_v4(),
                &clock,
            )
            .unwrap();
        commit(&mut collection);
        collection
            .expire(&RequestId::new("req-1"), Uuid::new_v4(), &clock)
            .unwrap();
        commit(&mut collection);

        let outcome = collection
            .fulfill(
                &RequestId::new("req-1"),
                &OracleAnswer::word("unicorn"),
                &bank(),
                &mut MockRng,
                Uuid::new_v4(),
                &clock,
            )
            .unwrap();

        assert_eq!(
            outcome,
            FulfillmentOutcome::AlreadyFulfilled {
                request_id: RequestId::new("req-1"),
                status: RequestStatus::Expired,
            }
        );
        assert!(collection.registry().is_empty());
    }

    #[test]
    fn test_expire_stale_expires_only_old_pending_requests() {
        // Arrange
        let mut collection = opened();
        let old_clock = FixedClock(fixed_now() - chrono::Duration::hours(2));
        let clock = FixedClock(fixed_now());
        for (id, at) in [("req-old", &old_clock), ("req-new", &clock)] {
            collection
                .request_create(
                    RequestId::new(id),
                    alice(),
                    None,
                    0,
                    &bank(),
                    Uuid::new_v4(),
                    at,
                )
                .unwrap();
            commit(&mut collection);
        }

        // Act
        let expired = collection.expire_stale(chrono::Duration::hours(1), Uuid::new_v4(), &clock);
        commit(&mut collection);

        // Assert
        assert_eq!(expired, vec![RequestId::new("req-old")]);
        let ledger = collection.ledger();
        assert_eq!(
            ledger.get(&RequestId::new("req-old")).unwrap().status,
            RequestStatus::Expired
        );
        assert_eq!(
            ledger.get(&RequestId::new("req-new")).unwrap().status,
            RequestStatus::Pending
        );
    }

    #[test]
    fn test_transfer_moves_ownership() {
        let mut collection = with_tokens(&["unicorn"], &alice());

        collection
            .transfer(
                TokenId(0),
                &alice(),
                bob(),
                Uuid::new_v4(),
                &FixedClock(fixed_now()),
            )
            .unwrap();
        assert_eq!(
            collection.uncommitted_events()[0].event_type(),
            TOKEN_TRANSFERRED_EVENT_TYPE
        );
        commit(&mut collection);

        assert_eq!(collection.registry().owner_of(TokenId(0)), Some(&bob()));
        assert_eq!(
            collection.registry().word_of(TokenId(0)),
            Some(&Word::parse("unicorn").unwrap())
        );
    }

    #[test]
    fn test_transfer_of_locked_token_is_rejected() {
        let clock = FixedClock(fixed_now());
        let mut collection = with_tokens(&["unicorn", "rainbow"], &alice());
        collection
            .request_combine(
                RequestId::new("req-c"),
                alice(),
                [TokenId(0), TokenId(1)],
                Uuid::new_v4(),
                &clock,
            )
            .unwrap();
        commit(&mut collection);

        let result = collection.transfer(TokenId(1), &alice(), bob(), Uuid::new_v4(), &clock);

        assert!(matches!(
            result,
            Err(DomainError::TokenLocked { token_id: TokenId(1), .. })
        ));
    }

    #[test]
    fn test_transfer_requires_current_owner() {
        let mut collection = with_tokens(&["unicorn"], &alice());

        let result = collection.transfer(
            TokenId(0),
            &bob(),
            alice(),
            Uuid::new_v4(),
            &FixedClock(fixed_now()),
        );

        assert!(matches!(result, Err(DomainError::InvalidInput(_))));
    }
}
