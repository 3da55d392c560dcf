//! Fixed-point interpolation of unigram and bigram probabilities.
//!
//! ```text
//! score = round((λ·P(token | prev) + (1 − λ)·P(token)) × 256³)
//! ```
//!
//! Both probabilities are at most 1, so scores stay within `0..=256³`.

use crate::candidate::Candidate;
use crate::phrase_index::PhraseIndex;
use crate::single_gram::SingleGram;
use crate::token::{Token, NULL_TOKEN};

/// Default interpolation weight of the bigram probability.
pub const DEFAULT_LAMBDA: f64 = 0.588792;

/// Fixed-point scale, `256³`.
pub const SCORE_SCALE: u32 = 256 * 256 * 256;

/// Inputs shared by every candidate scored for one window.
#[derive(Debug, Clone, Copy)]
pub struct Scorer<'a> {
    pub phrase_index: &'a PhraseIndex,
    pub previous: Token,
    pub bigram: Option<&'a SingleGram>,
    pub dynamic_adjust: bool,
    pub lambda: f64,
}

impl Scorer<'_> {
    pub fn bigram_probability(&self, token: Token) -> f64 {
        if !self.dynamic_adjust || self.previous == NULL_TOKEN {
            return 0.0;
        }
        self.bigram.map_or(0.0, |g| g.probability(token))
    }

    pub fn unigram_probability(&self, token: Token) -> f64 {
        let total = self.phrase_index.total_freq();
        if total == 0 {
            return 0.0;
        }
        let freq = self
            .phrase_index
            .get_phrase_item(token)
            .map_or(0, |item| item.unigram_freq());
        freq as f64 / total as f64
    }

    pub fn score(&self, token: Token) -> u32 {
        let p = self.lambda * self.bigram_probability(token)
            + (1.0 - self.lambda) * self.unigram_probability(token);
        (p * SCORE_SCALE as f64).round().clamp(0.0, SCORE_SCALE as f64) as u32
    }

    /// Score `items` and order them by descending score.
    ///
    /// The sort is stable, so equal scores keep the incoming order.
    pub fn rank(&self, items: &mut [Candidate]) {
        for c in items.iter_mut() {
            c.score = self.score(c.token);
        }
        items.sort_by(|a, b| b.score.cmp(&a.score));
    }
}
