//! Candidate expansion of a key window.
//!
//! Windows are searched from the longest remaining length down to one key.
//! Each matching length contributes its distinct tokens ranked by score, so
//! the result is grouped by non-increasing window length with non-increasing
//! scores inside a group. Descent stops at the first matching length whose
//! spelling no longer prefixes anything longer in the index.

use tracing::trace;

use crate::candidate::Candidate;
use crate::context::Context;
use crate::error::{DecoderError, Result};
use crate::key::{KeySpan, PhoneticKey};
use crate::scorer::Scorer;
use crate::token::{Token, MAX_PHRASE_LENGTH};

/// Expand `keys[offset..]` into ranked candidates.
///
/// `previous` is the context token used for bigram scoring; `NULL_TOKEN`
/// disables the bigram term. An offset at or past the end yields an empty
/// list. Two-key windows have no divided or resplit reading: with either
/// table enabled, reaching one is an error.
pub fn expand(
    ctx: &Context,
    keys: &[PhoneticKey],
    spans: &[KeySpan],
    offset: usize,
    previous: Token,
) -> Result<Vec<Candidate>> {
    if offset >= keys.len() {
        return Ok(Vec::new());
    }
    let config = ctx.config();

    let merged = if config.dynamic_adjust {
        ctx.bigram().context_model(previous)?
    } else {
        None
    };
    let scorer = Scorer {
        phrase_index: ctx.phrase_index(),
        previous,
        bigram: merged.as_ref(),
        dynamic_adjust: config.dynamic_adjust,
        lambda: config.lambda,
    };

    let remaining = (keys.len() - offset).min(MAX_PHRASE_LENGTH);
    let mut candidates = Vec::new();

    if remaining == 1 && config.use_divided_table {
        let span = spans.get(offset).copied().unwrap_or_default();
        candidates.extend(expand_divided(ctx, &keys[offset], span, offset, &scorer));
    }

    for len in (1..=remaining).rev() {
        if len == 2 && config.use_resplit_table {
            return Err(DecoderError::UnsupportedConfiguration("resplit table"));
        }
        if len == 2 && config.use_divided_table {
            return Err(DecoderError::UnsupportedConfiguration("divided table"));
        }

        let outcome = ctx
            .phonetic_index()
            .search(&keys[offset..offset + len], config.use_tone);
        if !outcome.is_match() {
            continue;
        }

        let items = outcome
            .tokens
            .into_iter()
            .map(|token| Candidate::new(token, offset..offset + len))
            .collect();
        let mut items = dedup_by_token(items);
        scorer.rank(&mut items);
        trace!(offset, len, count = items.len(), "window matched");
        candidates.extend(items);

        if !outcome.continued {
            break;
        }
    }

    Ok(candidates)
}

/// Read a single run-together key as two syllables.
///
/// The key's tone moves to the second half; the caller's keys are not
/// modified.
fn expand_divided(
    ctx: &Context,
    key: &PhoneticKey,
    orig_span: KeySpan,
    offset: usize,
    scorer: &Scorer<'_>,
) -> Vec<Candidate> {
    let use_tone = ctx.config().use_tone;
    let tone = if use_tone { key.tone() } else { 0 };

    let Some((first, second)) = ctx.divided_table().divide(key.spelling()) else {
        return Vec::new();
    };
    let (Some(first_key), Some(second_key)) =
        (PhoneticKey::parse(first), PhoneticKey::parse(second))
    else {
        return Vec::new();
    };
    let divided = [first_key.without_tone(), second_key.with_tone(tone)];

    let mut spelling = format!("{first}'{second}");
    if tone != 0 {
        spelling.push_str(&tone.to_string());
    }

    let outcome = ctx.phonetic_index().search(&divided, use_tone);
    if !outcome.is_match() {
        return Vec::new();
    }

    let items = outcome
        .tokens
        .into_iter()
        .map(|token| Candidate::divided(token, offset, orig_span, spelling.clone()))
        .collect();
    let mut items = dedup_by_token(items);
    scorer.rank(&mut items);
    items
}

/// Sort by token and keep the first candidate of each token.
pub(crate) fn dedup_by_token(mut items: Vec<Candidate>) -> Vec<Candidate> {
    items.sort_by_key(|c| c.token);
    let mut out: Vec<Candidate> = Vec::with_capacity(items.len());
    for c in items {
        if out.last().map_or(true, |last| last.token != c.token) {
            out.push(c);
        }
    }
    out
}
