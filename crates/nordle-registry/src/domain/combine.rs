//! The combine flow: burn two tokens and mint one bound to a derived word.

use nordle_core::clock::Clock;
use nordle_core::error::DomainError;
use nordle_core::ids::{Address, RequestId, TokenId};
use nordle_core::oracle::RequestKind;
use uuid::Uuid;

use super::aggregates::Collection;
use super::events::{CollectionEventKind, CombineRequested};
use super::fulfillment::{FulfillmentOutcome, OracleAnswer, RejectReason};
use super::ledger::Request;
use super::registry::{StagedEffect, WordRegistry};
use super::word::Word;

impl Collection {
    /// Validates a combine submission and returns the inputs ascending.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidInput` unless both tokens are distinct,
    /// live and owned by `requester`, and `DomainError::TokenLocked` if one
    /// is reserved by another pending request.
    pub fn check_combine(
        &self,
        requester: &Address,
        token_ids: [TokenId; 2],
    ) -> Result<Vec<TokenId>, DomainError> {
        self.ledger.check_submission(
            None,
            RequestKind::Combine,
            &token_ids,
            requester,
            &self.registry,
        )
    }

    /// Records a pending combine request under an oracle-issued id and locks
    /// its inputs, producing a `CombineRequested` event.
    ///
    /// # Errors
    ///
    /// Same as [`Collection::check_combine`], plus `InvalidInput` if the
    /// request id was already used.
    pub fn request_combine(
        &mut self,
        request_id: RequestId,
        requester: Address,
        token_ids: [TokenId; 2],
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<Vec<TokenId>, DomainError> {
        let inputs = self.ledger.check_submission(
            Some(&request_id),
            RequestKind::Combine,
            &token_ids,
            &requester,
            &self.registry,
        )?;
        self.stage(
            CollectionEventKind::CombineRequested(CombineRequested {
                collection_id: self.id,
                request_id,
                requester,
                token_ids: inputs.clone(),
            }),
            correlation_id,
            clock,
        );
        Ok(inputs)
    }

    /// Settles a pending combine request. Either both inputs are burned and
    /// one token is minted, or nothing but the rejection is staged.
    pub(crate) fn fulfill_combine(
        &mut self,
        request: &Request,
        answer: &OracleAnswer,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> FulfillmentOutcome {
        match stage_combine(&self.registry, request, answer) {
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

fn stage_combine(
    registry: &WordRegistry,
    request: &Request,
    answer: &OracleAnswer,
) -> Result<(TokenId, Word, Vec<StagedEffect>), RejectReason> {
    let raw = answer
        .word
        .as_deref()
        .filter(|w| !w.trim().is_empty())
        .ok_or(RejectReason::MissingWord)?;
    let word = Word::parse(raw).map_err(|_| RejectReason::InvalidWord {
        raw: raw.to_owned(),
    })?;

    let mut stage = registry.stage();
    for &token_id in &request.inputs {
        stage.burn(token_id, &request.requester)?;
    }
    // Checked with the inputs' words already released.
    let token_id = stage.mint(word.clone(), request.requester.clone())?;
    Ok((token_id, word, stage.commit()))
}
