//! The word registry: tokens, their owners, and live word bindings.
//!
//! This is the only place token state lives. Tokens are indexed by id
//! (`tokens[id]`) and live words by value (`live_words[word] -> id`); the
//! request ledger refers to tokens by id only.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use nordle_core::ids::{Address, RequestId, TokenId};

use super::fulfillment::RejectReason;
use super::word::Word;

/// A minted word-token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Token identifier.
    pub id: TokenId,
    /// Current owner.
    pub owner: Address,
    /// The word bound at mint time.
    pub word: Word,
    /// Image reference supplied by the oracle.
    pub image_uri: Option<String>,
    /// Tokens burned to produce this one (combine only).
    pub parents: Vec<TokenId>,
    /// The request whose fulfillment minted this token.
    pub minted_by: RequestId,
    /// Mint time.
    pub minted_at: DateTime<Utc>,
    /// The combine request that burned this token, if any.
    pub burned_by: Option<RequestId>,
}

impl Token {
    /// Returns `true` until the token is burned.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.burned_by.is_none()
    }
}

/// Token ids held by one owner, split by liveness.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnedTokens {
    /// Live tokens, ascending.
    pub live: Vec<TokenId>,
    /// Burned tokens, ascending.
    pub burned: Vec<TokenId>,
}

/// Authoritative token and word-binding state.
#[derive(Debug, Default)]
pub struct WordRegistry {
    tokens: Vec<Token>,
    live_words: HashMap<Word, TokenId>,
}

impl WordRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `word` is bound to a live token.
    #[must_use]
    pub fn is_live(&self, word: &Word) -> bool {
        self.live_words.contains_key(word)
    }

    /// The live token bound to `word`.
    #[must_use]
    pub fn holder(&self, word: &Word) -> Option<TokenId> {
        self.live_words.get(word).copied()
    }

    /// Looks up a token, live or burned.
    #[must_use]
    pub fn token(&self, id: TokenId) -> Option<&Token> {
        usize::try_from(id.0).ok().and_then(|i| self.tokens.get(i))
    }

    /// Current owner of a token.
    #[must_use]
    pub fn owner_of(&self, id: TokenId) -> Option<&Address> {
        self.token(id).map(|t| &t.owner)
    }

    /// Word bound to a token.
    #[must_use]
    pub fn word_of(&self, id: TokenId) -> Option<&Word> {
        self.token(id).map(|t| &t.word)
    }

    /// The id the next minted token receives.
    #[must_use]
    pub fn next_token_id(&self) -> TokenId {
        TokenId(self.tokens.len() as u64)
    }

    /// Number of tokens ever minted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns `true` if nothing was ever minted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Number of live tokens.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live_words.len()
    }

    /// Tokens currently owned by `owner`.
    #[must_use]
    pub fn tokens_of(&self, owner: &Address) -> OwnedTokens {
        let mut owned = OwnedTokens::default();
        for token in self.tokens.iter().filter(|t| &t.owner == owner) {
            if token.is_live() {
                owned.live.push(token.id);
            } else {
                owned.burned.push(token.id);
            }
        }
        owned
    }

    /// Opens a staging area for a batch of burns and mints.
    #[must_use]
    pub fn stage(&self) -> RegistryStage<'_> {
        RegistryStage {
            registry: self,
            burns: Vec::new(),
            released: HashSet::new(),
            mints: Vec::new(),
        }
    }

    /// Binds `word` to `token_id`.
    ///
    /// # Errors
    ///
    /// Returns `RejectReason::WordUnavailable` if another live token holds
    /// the word.
    pub(crate) fn bind(&mut self, word: Word, token_id: TokenId) -> Result<(), RejectReason> {
        match self.live_words.get(&word) {
            Some(holder) if *holder != token_id => Err(RejectReason::WordUnavailable {
                word,
                holder: *holder,
            }),
            _ => {
                self.live_words.insert(word, token_id);
                Ok(())
            }
        }
    }

    /// Releases a word binding. Only burning a token calls this.
    pub(crate) fn unbind(&mut self, word: &Word) -> Option<TokenId> {
        self.live_words.remove(word)
    }

    /// Records a newly minted token and binds its word.
    pub(crate) fn mint(&mut self, token: Token) -> Result<(), RejectReason> {
        self.bind(token.word.clone(), token.id)?;
        self.tokens.push(token);
        Ok(())
    }

    /// Marks a token burned and releases its word.
    pub(crate) fn burn(&mut self, id: TokenId, request_id: &RequestId) {
        let Some(index) = usize::try_from(id.0).ok() else {
            return;
        };
        let word = match self.tokens.get_mut(index) {
            Some(token) if token.is_live() => {
                token.burned_by = Some(request_id.clone());
                token.word.clone()
            }
            _ => return,
        };
        if self.live_words.get(&word) == Some(&id) {
            self.unbind(&word);
        }
    }

    /// Moves a token to a new owner.
    pub(crate) fn transfer(&mut self, id: TokenId, to: Address) {
        if let Some(token) = usize::try_from(id.0).ok().and_then(|i| self.tokens.get_mut(i)) {
            token.owner = to;
        }
    }
}

/// A registry mutation accepted by a [`RegistryStage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedEffect {
    /// Burn a live token and release its word.
    Burn {
        /// The token to burn.
        token_id: TokenId,
        /// Its word.
        word: Word,
    },
    /// Mint a token bound to a word.
    Mint {
        /// The id the token receives.
        token_id: TokenId,
        /// The word it binds.
        word: Word,
        /// Its owner.
        owner: Address,
    },
}

/// Staged burns and mints checked against the registry as if the staged
/// burns had already happened.
///
/// Nothing touches the registry. [`RegistryStage::commit`] returns the
/// accepted effects for the caller to persist as one batch; dropping the
/// stage discards them.
#[derive(Debug)]
pub struct RegistryStage<'a> {
    registry: &'a WordRegistry,
    burns: Vec<(TokenId, Word)>,
    released: HashSet<TokenId>,
    mints: Vec<(TokenId, Word, Address)>,
}

impl RegistryStage<'_> {
    /// Stages a burn of `token_id`, which must be live and owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns `RejectReason::InputUnavailable` otherwise, or if the token is
    /// already staged for burning.
    pub fn burn(&mut self, token_id: TokenId, owner: &Address) -> Result<(), RejectReason> {
        let unavailable = RejectReason::InputUnavailable { token_id };
        let token = self.registry.token(token_id).ok_or_else(|| unavailable.clone())?;
        if !token.is_live() || &token.owner != owner || self.released.contains(&token_id) {
            return Err(unavailable);
        }
        self.released.insert(token_id);
        self.burns.push((token_id, token.word.clone()));
        Ok(())
    }

    /// Stages a mint of `word` for `owner` and returns the new token's id.
    ///
    /// # Errors
    ///
    /// Returns `RejectReason::WordUnavailable` if the word is held by a live
    /// token that is not staged for burning, or by a mint already staged.
    pub fn mint(&mut self, word: Word, owner: Address) -> Result<TokenId, RejectReason> {
        if let Some(holder) = self.registry.holder(&word) {
            if !self.released.contains(&holder) {
                return Err(RejectReason::WordUnavailable { word, holder });
            }
        }
        if let Some((holder, _, _)) = self.mints.iter().find(|(_, w, _)| *w == word) {
            return Err(RejectReason::WordUnavailable {
                word,
                holder: *holder,
            });
        }
        let token_id = TokenId(self.registry.next_token_id().0 + self.mints.len() as u64);
        self.mints.push((token_id, word, owner));
        Ok(token_id)
    }

    /// Accepts the stage: burns first, then mints.
    #[must_use]
    pub fn commit(self) -> Vec<StagedEffect> {
        let burns = self
            .burns
            .into_iter()
            .map(|(token_id, word)| StagedEffect::Burn { token_id, word });
        let mints = self
            .mints
            .into_iter()
            .map(|(token_id, word, owner)| StagedEffect::Mint {
                token_id,
                word,
                owner,
            });
        burns.chain(mints).collect()
    }
}
