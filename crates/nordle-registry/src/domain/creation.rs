//! The creation flow: mint one token bound to a word from the word bank.

use nordle_core::clock::Clock;
use nordle_core::error::DomainError;
use nordle_core::ids::{Address, RequestId};
use nordle_core::oracle::RequestKind;
use nordle_core::rng::DeterministicRng;
use uuid::Uuid;

use super::aggregates::Collection;
use super::events::{CollectionEventKind, CreateRequested};
use super::fulfillment::{FulfillmentOutcome, OracleAnswer, RejectReason};
use super::ledger::Request;
use super::word::Word;
use super::word_bank::WordBank;

impl Collection {
    /// Validates a create submission and returns the normalized suggested
    /// word.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidInput` if the suggested word violates the
    /// word policy or is not in the word bank.
    pub fn check_create(
        suggested_word: Option<&str>,
        bank: &dyn WordBank,
    ) -> Result<Option<Word>, DomainError> {
        let Some(raw) = suggested_word else {
            return Ok(None);
        };
        let word = Word::parse(raw)?;
        if !bank.exists(&word) {
            return Err(DomainError::InvalidInput(format!(
                "suggested word {word} is not in the word bank"
            )));
        }
        Ok(Some(word))
    }

    /// Records a pending create request under an oracle-issued id,
    /// producing a `CreateRequested` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidInput` if the id was already used or the
    /// suggested word is rejected by [`Collection::check_create`].
    #[allow(clippy::too_many_arguments)]
    pub fn request_create(
        &mut self,
        request_id: RequestId,
        requester: Address,
        suggested_word: Option<&str>,
        fee: u64,
        bank: &dyn WordBank,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let suggested_word = Self::check_create(suggested_word, bank)?;
        self.ledger.check_submission(
            Some(&request_id),
            RequestKind::Create,
            &[],
            &requester,
            &self.registry,
        )?;
        self.stage(
            CollectionEventKind::CreateRequested(CreateRequested {
                collection_id: self.id,
                request_id,
                requester,
                suggested_word,
                fee,
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Settles a pending create request: mints one token bound to the
    /// resolved word, or rejects.
    pub(crate) fn fulfill_create(
        &mut self,
        request: &Request,
        answer: &OracleAnswer,
        bank: &dyn WordBank,
        rng: &mut dyn DeterministicRng,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> FulfillmentOutcome {
        let staged = resolve_word(request, answer, bank, rng).and_then(|word| {
            let mut stage = self.registry.stage();
            let token_id = stage.mint(word.clone(), request.requester.clone())?;
            Ok((token_id, word, stage.commit()))
        });
        match staged {
            Ok((token_id, word, effects)) => self.settle_minted(
                request,
                token_id,
                word,
                effects,
                answer.image_uri.as_deref(),
                correlation_id,
                clock,
            ),
            Err(reason) => self.reject(request, reason, correlation_id, clock),
        }
    }
}

/// Picks the word for a create fulfillment: the oracle's word if it sent a
/// non-blank one, else the suggested word, else a draw from the bank.
fn resolve_word(
    request: &Request,
    answer: &OracleAnswer,
    bank: &dyn WordBank,
    rng: &mut dyn DeterministicRng,
) -> Result<Word, RejectReason> {
    if let Some(raw) = answer.word.as_deref().filter(|w| !w.trim().is_empty()) {
        let word = Word::parse(raw).map_err(|_| RejectReason::InvalidWord {
            raw: raw.to_owned(),
        })?;
        if !bank.exists(&word) {
            return Err(RejectReason::UnknownWord { word });
        }
        return Ok(word);
    }
    if let Some(word) = &request.suggested_word {
        return Ok(word.clone());
    }
    bank.random_word(rng).ok_or(RejectReason::MissingWord)
}

#[cfg(test)]
mod tests {
    use nordle_core::aggregate::AggregateRoot;
    use nordle_core::error::DomainError;
    use nordle_core::ids::{RequestId, TokenId};
    use nordle_test_support::{FixedClock, MockRng, SequenceRng, fixed_now};
    use uuid::Uuid;

    use crate::domain::aggregates::Collection;
    use crate::domain::aggregates::tests::{alice, bank, commit, opened, with_tokens};
    use crate::domain::events::CollectionEventKind;
    use crate::domain::fulfillment::{FulfillmentOutcome, OracleAnswer, RejectReason};
    use crate::domain::ledger::RequestStatus;
    use crate::domain::word::Word;
    use crate::domain::word_bank::StaticWordBank;

    fn word(raw: &str) -> Word {
        Word::parse(raw).unwrap()
    }

    fn pending_create(collection: &mut Collection, id: &str, suggested: Option<&str>) {
        collection
            .request_create(
                RequestId::new(id),
                alice(),
                suggested,
                250,
                &bank(),
                Uuid::new_v4(),
                &FixedClock(fixed_now()),
            )
            .unwrap();
        commit(collection);
    }

    fn fulfill(collection: &mut Collection, id: &str, answer: &OracleAnswer) -> FulfillmentOutcome {
        let outcome = collection
            .fulfill(
                &RequestId::new(id),
                answer,
                &bank(),
                &mut MockRng,
                Uuid::new_v4(),
                &FixedClock(fixed_now()),
            )
            .unwrap();
        commit(collection);
        outcome
    }

    #[test]
    fn test_request_create_records_pending_request_with_fee() {
        // Arrange
        let mut collection = opened();

        // Act
        collection
            .request_create(
                RequestId::new("req-1"),
                alice(),
                Some(" Rainbow "),
                250,
                &bank(),
                Uuid::new_v4(),
                &FixedClock(fixed_now()),
            )
            .unwrap();

        // Assert
        match &collection.uncommitted_events()[0].kind {
            CollectionEventKind::CreateRequested(payload) => {
                assert_eq!(payload.request_id, RequestId::new("req-1"));
                assert_eq!(payload.suggested_word, Some(word("rainbow")));
                assert_eq!(payload.fee, 250);
            }
            other => panic!("expected CreateRequested, got {other:?}"),
        }
        commit(&mut collection);
        let request = collection.ledger().get(&RequestId::new("req-1")).unwrap();
        assert_eq!(request.status, RequestStatus::Pending);
        assert!(request.inputs.is_empty());
        assert_eq!(request.submitted_at, fixed_now());
    }

    #[test]
    fn test_request_create_rejects_word_outside_bank() {
        let unknown = Collection::check_create(Some("zebra"), &bank());
        let malformed = Collection::check_create(Some("two words"), &bank());

        assert!(matches!(unknown, Err(DomainError::InvalidInput(_))));
        assert!(matches!(malformed, Err(DomainError::InvalidInput(_))));
    }

    #[test]
    fn test_create_fulfilled_with_unicorn_mints_token_zero() {
        // Arrange
        let mut collection = opened();
        pending_create(&mut collection, "req-1", None);

        // Act
        let outcome = fulfill(
            &mut collection,
            "req-1",
            &OracleAnswer {
                word: Some("unicorn".into()),
                image_uri: Some("ipfs://unicorn.jpg".into()),
            },
        );

        // Assert
        assert_eq!(
            outcome,
            FulfillmentOutcome::Minted {
                request_id: RequestId::new("req-1"),
                kind: nordle_core::oracle::RequestKind::Create,
                token_id: TokenId(0),
                word: word("unicorn"),
                burned: Vec::new(),
            }
        );
        let registry = collection.registry();
        assert!(registry.is_live(&word("unicorn")));
        let token = registry.token(TokenId(0)).unwrap();
        assert_eq!(token.owner, alice());
        assert_eq!(token.image_uri.as_deref(), Some("ipfs://unicorn.jpg"));
        let request = collection.ledger().get(&RequestId::new("req-1")).unwrap();
        assert_eq!(request.status, RequestStatus::Fulfilled);
        assert_eq!(request.minted, Some(TokenId(0)));
    }

    #[test]
    fn test_create_with_live_word_fails_and_mints_nothing() {
        // Arrange
        let mut collection = with_tokens(&["unicorn"], &alice());
        pending_create(&mut collection, "req-1", None);
        let before = collection.registry().len();

        // Act
        let outcome = fulfill(&mut collection, "req-1", &OracleAnswer::word("unicorn"));

        // Assert
        assert_eq!(
            outcome,
            FulfillmentOutcome::Rejected {
                request_id: RequestId::new("req-1"),
                reason: RejectReason::WordUnavailable {
                    word: word("unicorn"),
                    holder: TokenId(0),
                },
            }
        );
        assert_eq!(collection.registry().len(), before);
        let request = collection.ledger().get(&RequestId::new("req-1")).unwrap();
        assert_eq!(request.status, RequestStatus::Failed);
        assert!(request.minted.is_none());
        assert_eq!(request.fee, 250);
    }

    #[test]
    fn test_create_falls_back_to_suggested_word() {
        let mut collection = opened();
        pending_create(&mut collection, "req-1", Some("dragon"));

        let outcome = fulfill(&mut collection, "req-1", &OracleAnswer::default());

        assert!(matches!(
            outcome,
            FulfillmentOutcome::Minted { word: w, .. } if w == word("dragon")
        ));
    }

    #[test]
    fn test_create_falls_back_to_random_word() {
        // Arrange
        let mut collection = opened();
        pending_create(&mut collection, "req-1", None);
        let bank = StaticWordBank::parse_list(["unicorn", "rainbow", "flying"]).unwrap();
        let mut rng = SequenceRng::new(vec![2]);

        // Act
        let outcome = collection
            .fulfill(
                &RequestId::new("req-1"),
                &OracleAnswer::word("   "),
                &bank,
                &mut rng,
                Uuid::new_v4(),
                &FixedClock(fixed_now()),
            )
            .unwrap();

        // Assert
        assert!(matches!(
            outcome,
            FulfillmentOutcome::Minted { word: w, .. } if w == word("flying")
        ));
    }

    #[test]
    fn test_create_rejects_invalid_unknown_and_missing_words() {
        let mut collection = opened();
        for id in ["req-1", "req-2", "req-3"] {
            pending_create(&mut collection, id, None);
        }
        let empty_bank = StaticWordBank::default();

        let invalid = fulfill(&mut collection, "req-1", &OracleAnswer::word("r2d2"));
        let unknown = fulfill(&mut collection, "req-2", &OracleAnswer::word("zebra"));
        let missing = collection
            .fulfill(
                &RequestId::new("req-3"),
                &OracleAnswer::default(),
                &empty_bank,
                &mut MockRng,
                Uuid::new_v4(),
                &FixedClock(fixed_now()),
            )
            .unwrap();

        assert!(matches!(
            invalid,
            FulfillmentOutcome::Rejected { reason: RejectReason::InvalidWord { ref raw }, .. } if raw == "r2d2"
        ));
        assert!(matches!(
            unknown,
            FulfillmentOutcome::Rejected { reason: RejectReason::UnknownWord { .. }, .. }
        ));
        assert!(matches!(
            missing,
            FulfillmentOutcome::Rejected { reason: RejectReason::MissingWord, .. }
        ));
        assert!(collection.registry().is_empty());
    }

    #[test]
    fn test_reused_request_id_is_rejected() {
        let mut collection = opened();
        pending_create(&mut collection, "req-1", None);

        let result = collection.request_create(
            RequestId::new("req-1"),
            alice(),
            None,
            0,
            &bank(),
            Uuid::new_v4(),
            &FixedClock(fixed_now()),
        );

        assert!(matches!(result, Err(DomainError::InvalidInput(_))));
    }
}
