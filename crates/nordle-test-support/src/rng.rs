//! Scripted word-bank draws.

use nordle_core::rng::DeterministicRng;

/// Always draws the first word.
#[derive(Debug)]
pub struct MockRng;

impl DeterministicRng for MockRng {
    fn next_index(&mut self, _len: usize) -> usize {
        0
    }
}

/// Replays a fixed list of draws in order. Panics once the list runs out,
/// which flags a test that drew more words than it scripted.
#[derive(Debug)]
pub struct SequenceRng {
    draws: std::vec::IntoIter<usize>,
}

impl SequenceRng {
    /// Scripts the given draws.
    #[must_use]
    pub fn new(draws: Vec<usize>) -> Self {
        Self {
            draws: draws.into_iter(),
        }
    }
}

impl DeterministicRng for SequenceRng {
    fn next_index(&mut self, len: usize) -> usize {
        match self.draws.next() {
            Some(draw) => draw,
            None => panic!("SequenceRng exhausted drawing from a bank of {len}"),
        }
    }
}
