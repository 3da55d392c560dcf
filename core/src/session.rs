//! Decoding session: keys, constraint lattice and match results of one
//! input in progress.

use tracing::debug;

use crate::candidate::Candidate;
use crate::constraints::{Constraint, ConstraintLattice};
use crate::context::Context;
use crate::error::Result;
use crate::expand;
use crate::key::{KeySpan, PhoneticKey};
use crate::search::BestPathSearch;
use crate::token::{Token, MAX_PHRASE_LENGTH, NULL_TOKEN, SENTENCE_START};
use crate::utils;

#[derive(Debug, Clone, Default)]
pub struct Session {
    raw: String,
    keys: Vec<PhoneticKey>,
    spans: Vec<KeySpan>,
    constraints: ConstraintLattice,
    /// One slot per key; the token of the phrase starting there.
    match_results: Vec<Token>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn keys(&self) -> &[PhoneticKey] {
        &self.keys
    }

    pub fn spans(&self) -> &[KeySpan] {
        &self.spans
    }

    pub fn constraints(&self) -> &[Constraint] {
        self.constraints.slots()
    }

    pub fn match_results(&self) -> &[Token] {
        &self.match_results
    }

    /// Replace the key sequence with fresh parser output.
    ///
    /// Missing spans default to empty; the lattice is resized and
    /// revalidated and previous match results are cleared.
    pub fn set_keys(
        &mut self,
        ctx: &Context,
        keys: Vec<PhoneticKey>,
        mut spans: Vec<KeySpan>,
        raw: &str,
    ) {
        spans.resize(keys.len(), KeySpan::default());
        self.raw = raw.to_string();
        self.keys = keys;
        self.spans = spans;
        self.match_results = vec![NULL_TOKEN; self.keys.len()];
        self.constraints.resize(self.keys.len());
        self.update_constraints(ctx);
    }

    fn update_constraints(&mut self, ctx: &Context) {
        self.constraints
            .revalidate(ctx.phrase_index(), &self.keys, ctx.config().use_tone);
    }

    /// Context token for candidates at `offset`.
    ///
    /// `SENTENCE_START` at the beginning. Elsewhere, when a phrase of the
    /// current match results starts at `offset`, the nearest phrase before
    /// it; otherwise no context. Always no context without dynamic adjust.
    pub fn previous_token(&self, ctx: &Context, offset: usize) -> Token {
        if !ctx.config().dynamic_adjust {
            return NULL_TOKEN;
        }
        if offset == 0 {
            return SENTENCE_START;
        }
        match self.match_results.get(offset) {
            Some(&current) if current != NULL_TOKEN => self.match_results[..offset]
                .iter()
                .rev()
                .copied()
                .find(|t| *t != NULL_TOKEN)
                .unwrap_or(NULL_TOKEN),
            _ => NULL_TOKEN,
        }
    }

    /// Ranked candidates for the keys from `offset` on.
    pub fn expand_candidates(&self, ctx: &Context, offset: usize) -> Result<Vec<Candidate>> {
        let previous = self.previous_token(ctx, offset);
        expand::expand(ctx, &self.keys, &self.spans, offset, previous)
    }

    /// Pin `token` at `offset` and return the offset after it.
    ///
    /// A token that does not fit at `offset` leaves the constraints
    /// unchanged and returns `offset`.
    pub fn pin(&mut self, ctx: &Context, offset: usize, token: Token) -> usize {
        match self.try_pin(ctx, offset, token) {
            Ok(next) => next,
            Err(e) => {
                debug!(error = %e, "pin rejected");
                offset
            }
        }
    }

    pub fn try_pin(&mut self, ctx: &Context, offset: usize, token: Token) -> Result<usize> {
        self.constraints.pin(
            ctx.phrase_index(),
            &self.keys,
            offset,
            token,
            ctx.config().use_tone,
        )
    }

    pub fn clear_pin(&mut self, offset: usize) {
        self.constraints.clear(offset);
    }

    pub fn clear_all_pins(&mut self) {
        self.constraints.clear_all();
    }

    /// Decode the whole key sequence into match results.
    pub fn guess_sentence<S: BestPathSearch + ?Sized>(
        &mut self,
        ctx: &Context,
        search: &S,
    ) -> Result<()> {
        self.run_search(ctx, search, vec![SENTENCE_START])
    }

    /// Decode with the text before the input as extra context.
    ///
    /// Every phrase matching a suffix of `prefix` (up to the longest phrase
    /// length) is offered to the search as a prefix token.
    pub fn guess_sentence_with_prefix<S: BestPathSearch + ?Sized>(
        &mut self,
        ctx: &Context,
        search: &S,
        prefix: &str,
    ) -> Result<()> {
        let mut prefixes = vec![SENTENCE_START];
        let chars: Vec<char> = utils::normalize(prefix).chars().collect();
        for len in 1..=chars.len().min(MAX_PHRASE_LENGTH) {
            let tail: String = chars[chars.len() - len..].iter().collect();
            if let Some(token) = ctx.search_phrase(&tail) {
                prefixes.push(token);
            }
        }
        self.run_search(ctx, search, prefixes)
    }

    fn run_search<S: BestPathSearch + ?Sized>(
        &mut self,
        ctx: &Context,
        search: &S,
        prefixes: Vec<Token>,
    ) -> Result<()> {
        self.update_constraints(ctx);
        let mut results =
            search.best_match(ctx, &prefixes, &self.keys, self.constraints.slots())?;
        results.resize(self.keys.len(), NULL_TOKEN);
        self.match_results = results;
        Ok(())
    }

    /// Text of the current match results.
    pub fn sentence(&self, ctx: &Context) -> Option<String> {
        let mut out = String::new();
        let mut any = false;
        for &token in self.match_results.iter().filter(|t| **t != NULL_TOKEN) {
            out.push_str(&ctx.translate_token(token)?);
            any = true;
        }
        any.then_some(out)
    }

    /// Reinforce the user model with the current match results.
    ///
    /// Returns false when there is no user directory to persist to.
    pub fn train(&self, ctx: &mut Context) -> bool {
        match self.try_train(ctx) {
            Ok(n) => {
                debug!(tokens = n, "trained");
                true
            }
            Err(e) => {
                debug!(error = %e, "training skipped");
                false
            }
        }
    }

    /// Like [`Session::train`], returning the number of trained tokens.
    pub fn try_train(&self, ctx: &mut Context) -> Result<usize> {
        ctx.train_results(&self.match_results)
    }

    /// Drop keys, constraints and match results.
    pub fn reset(&mut self) {
        self.raw.clear();
        self.keys.clear();
        self.spans.clear();
        self.constraints = ConstraintLattice::new();
        self.match_results.clear();
    }
}
