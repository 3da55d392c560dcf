//! Reinforcement of the user model from an accepted sentence.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bigram::BigramModel;
use crate::error::Result;
use crate::phrase_index::PhraseIndex;
use crate::token::{Token, NULL_TOKEN, SENTENCE_START};

/// Increments applied per trained token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Added to the user bigram count of `(previous, token)`.
    pub bigram_increment: u32,
    /// The token's unigram frequency grows by `bigram_increment * unigram_factor`.
    pub unigram_factor: u32,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            bigram_increment: 23 * 3,
            unigram_factor: 7,
        }
    }
}

/// Train on `results`, the per-key match results of a decoded sentence.
///
/// Every non-null token is reinforced after the nearest non-null token
/// before it, or after `SENTENCE_START` for the first one. Returns the
/// number of tokens trained.
pub fn train_results(
    bigram: &mut BigramModel,
    phrase_index: &mut PhraseIndex,
    config: &TrainingConfig,
    results: &[Token],
) -> Result<usize> {
    let unigram_delta = config.bigram_increment.saturating_mul(config.unigram_factor);
    let mut previous = SENTENCE_START;
    let mut trained = 0;

    for &token in results.iter().filter(|t| **t != NULL_TOKEN) {
        bigram.reinforce(previous, token, config.bigram_increment)?;
        if !phrase_index.add_unigram_frequency(token, unigram_delta) {
            debug!(token, "trained token has no phrase entry");
        }
        previous = token;
        trained += 1;
    }
    Ok(trained)
}
