//! The `Word` value type and its normalization policy.

use std::fmt;

use nordle_core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Longest accepted word, in characters.
pub const MAX_WORD_LEN: usize = 64;

/// A normalized word: trimmed, ASCII-lowercased, 1 to [`MAX_WORD_LEN`]
/// characters from `a-z`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Word(String);

impl Word {
    /// Normalizes `raw` and checks it against the word policy.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidInput` if the normalized word is empty,
    /// too long, or contains anything other than `a-z`.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let normalized = raw.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(DomainError::InvalidInput("word must not be empty".to_owned()));
        }
        if normalized.len() > MAX_WORD_LEN {
            return Err(DomainError::InvalidInput(format!(
                "word must be at most {MAX_WORD_LEN} characters, got {}",
                normalized.len()
            )));
        }
        if let Some(bad) = normalized.chars().find(|c| !c.is_ascii_lowercase()) {
            return Err(DomainError::InvalidInput(format!(
                "word {normalized:?} contains disallowed character {bad:?}"
            )));
        }
        Ok(Self(normalized))
    }

    /// Returns the word as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Word {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Word> for String {
    fn from(value: Word) -> Self {
        value.0
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
