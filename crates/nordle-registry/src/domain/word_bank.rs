//! The word bank: the fixed vocabulary new tokens are drawn from.

use std::collections::HashMap;

use nordle_core::error::DomainError;
use nordle_core::rng::DeterministicRng;
use serde::Deserialize;

use super::word::Word;

/// Read-only vocabulary consulted by the creation flow.
pub trait WordBank: Send + Sync {
    /// Returns `true` if `word` is part of the vocabulary.
    fn exists(&self, word: &Word) -> bool;

    /// Draws a word uniformly from the vocabulary, or `None` if it is empty.
    fn random_word(&self, rng: &mut dyn DeterministicRng) -> Option<Word>;
}

/// Vocabulary shipped with the service when no word bank file is configured.
const BUILTIN_WORDS: &[&str] = &[
    "unicorn", "rainbow", "flying", "dragon", "castle", "ocean", "forest", "robot", "galaxy",
    "pirate", "wizard", "candy", "thunder", "crystal", "mountain", "banana", "penguin",
    "volcano", "garden", "rocket", "shadow", "golden", "dancing", "island", "lantern",
];

#[derive(Deserialize)]
#[serde(untagged)]
enum WordBankFile {
    List(Vec<String>),
    Document { words: Vec<String> },
}

/// In-memory, ordered, de-duplicated vocabulary.
#[derive(Debug, Clone, Default)]
pub struct StaticWordBank {
    words: Vec<Word>,
    index: HashMap<Word, usize>,
}

impl StaticWordBank {
    /// Builds a bank from already-normalized words, keeping the first
    /// occurrence of each.
    #[must_use]
    pub fn new(words: impl IntoIterator<Item = Word>) -> Self {
        let mut bank = Self::default();
        for word in words {
            if !bank.index.contains_key(&word) {
                bank.index.insert(word.clone(), bank.words.len());
                bank.words.push(word);
            }
        }
        bank
    }

    /// Builds a bank from raw strings, normalizing each.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidInput` naming the first entry that does
    /// not satisfy the word policy.
    pub fn parse_list<I, S>(raw: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = raw
            .into_iter()
            .map(|entry| Word::parse(entry.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(words))
    }

    /// Loads a bank from YAML: either a plain list of words or a mapping
    /// with a `words` list.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidInput` if the document does not parse or
    /// contains an invalid word.
    pub fn from_yaml(source: &str) -> Result<Self, DomainError> {
        let file: WordBankFile = serde_yaml::from_str(source)
            .map_err(|e| DomainError::InvalidInput(format!("word bank YAML: {e}")))?;
        match file {
            WordBankFile::List(words) | WordBankFile::Document { words } => {
                Self::parse_list(words)
            }
        }
    }

    /// The built-in vocabulary.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(BUILTIN_WORDS.iter().filter_map(|w| Word::parse(w).ok()))
    }

    /// All words, in bank order.
    #[must_use]
    pub fn words(&self) -> &[Word] {
        &self.words
    }

    /// Position of `word` in the bank.
    #[must_use]
    pub fn index_of(&self, word: &Word) -> Option<usize> {
        self.index.get(word).copied()
    }

    /// Number of words in the bank.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Returns `true` if the bank holds no words.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl WordBank for StaticWordBank {
    fn exists(&self, word: &Word) -> bool {
        self.index.contains_key(word)
    }

    fn random_word(&self, rng: &mut dyn DeterministicRng) -> Option<Word> {
        if self.words.is_empty() {
            return None;
        }
        let drawn = rng.next_index(self.words.len());
        self.words.get(drawn % self.words.len()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nordle_test_support::SequenceRng;

    fn word(raw: &str) -> Word {
        Word::parse(raw).unwrap()
    }

    #[test]
    fn test_new_deduplicates_and_keeps_order() {
        let bank = StaticWordBank::new([word("flying"), word("unicorn"), word("flying")]);

        assert_eq!(bank.len(), 2);
        assert_eq!(bank.index_of(&word("flying")), Some(0));
        assert_eq!(bank.index_of(&word("unicorn")), Some(1));
        assert!(bank.exists(&word("unicorn")));
        assert!(!bank.exists(&word("rainbow")));
    }

    #[test]
    fn test_from_yaml_accepts_list_and_document_forms() {
        let list = StaticWordBank::from_yaml("- Unicorn\n- rainbow\n").unwrap();
        let document = StaticWordBank::from_yaml("words:\n  - unicorn\n  - rainbow\n").unwrap();

        assert_eq!(list.words(), document.words());
        assert_eq!(list.words()[0].as_str(), "unicorn");
    }

    #[test]
    fn test_from_yaml_rejects_invalid_word() {
        match StaticWordBank::from_yaml("- unicorn\n- two words\n") {
            Err(DomainError::InvalidInput(msg)) => assert!(msg.contains("two words")),
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_random_word_uses_rng_index() {
        let bank = StaticWordBank::parse_list(["unicorn", "rainbow", "dragon"]).unwrap();
        let mut rng = SequenceRng::new(vec![2, 0]);

        assert_eq!(bank.random_word(&mut rng), Some(word("dragon")));
        assert_eq!(bank.random_word(&mut rng), Some(word("unicorn")));
    }

    #[test]
    fn test_random_word_wraps_out_of_range_draws() {
        let bank = StaticWordBank::parse_list(["unicorn", "rainbow"]).unwrap();
        let mut rng = SequenceRng::new(vec![5]);

        assert_eq!(bank.random_word(&mut rng), Some(word("rainbow")));
    }

    #[test]
    fn test_random_word_on_empty_bank_is_none() {
        let bank = StaticWordBank::default();
        let mut rng = SequenceRng::new(vec![]);

        assert!(bank.random_word(&mut rng).is_none());
    }

    #[test]
    fn test_builtin_bank_is_valid() {
        let bank = StaticWordBank::builtin();
        assert_eq!(bank.len(), BUILTIN_WORDS.len());
    }
}
