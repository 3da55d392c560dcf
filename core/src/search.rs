//! Best-path search seam.
//!
//! Sentence decoding over the token lattice is supplied by the caller. The
//! session hands it the context, the prefix tokens seeding the sentence, the
//! current keys and the constraint lattice.

use crate::constraints::Constraint;
use crate::context::Context;
use crate::error::Result;
use crate::key::PhoneticKey;
use crate::token::Token;

pub trait BestPathSearch {
    /// Best token sequence for `keys`.
    ///
    /// The result has one slot per key: the token of the phrase starting at
    /// that key, or `NULL_TOKEN` inside a phrase. Pinned constraints must be
    /// honoured. `prefixes` always starts with `SENTENCE_START`.
    fn best_match(
        &self,
        ctx: &Context,
        prefixes: &[Token],
        keys: &[PhoneticKey],
        constraints: &[Constraint],
    ) -> Result<Vec<Token>>;
}

impl<T: BestPathSearch + ?Sized> BestPathSearch for &T {
    fn best_match(
        &self,
        ctx: &Context,
        prefixes: &[Token],
        keys: &[PhoneticKey],
        constraints: &[Constraint],
    ) -> Result<Vec<Token>> {
        (**self).best_match(ctx, prefixes, keys, constraints)
    }
}
