//! Per-session constraint lattice.
//!
//! One slot per key position. A pin occupies its first slot and marks the
//! rest of its span as covered, so pins never overlap. Every mutation of the
//! key sequence must be followed by [`ConstraintLattice::revalidate`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DecoderError, Result};
use crate::key::PhoneticKey;
use crate::phrase_index::PhraseIndex;
use crate::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Constraint {
    #[default]
    Unconstrained,
    /// Keys `[offset, offset + length)` are fixed to `token`.
    Pinned { token: Token, length: usize },
    /// Inside the span of the pin starting at `by`.
    Covered { by: usize },
}

impl Constraint {
    pub fn is_unconstrained(&self) -> bool {
        matches!(self, Constraint::Unconstrained)
    }
}

/// Number of keys `token` covers at `offset`, if any.
///
/// A token covers as many keys as its phrase has characters, provided one of
/// its pronunciations matches the keys there.
pub fn covered_length(
    index: &PhraseIndex,
    keys: &[PhoneticKey],
    offset: usize,
    token: Token,
    use_tone: bool,
) -> Option<usize> {
    let item = index.get_phrase_item(token)?;
    let len = item.len();
    if len == 0 || offset + len > keys.len() {
        return None;
    }
    item.matches_keys(&keys[offset..offset + len], use_tone)
        .then_some(len)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintLattice {
    slots: Vec<Constraint>,
}

impl ConstraintLattice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Constraint] {
        &self.slots
    }

    pub fn get(&self, offset: usize) -> Option<Constraint> {
        self.slots.get(offset).copied()
    }

    /// `(offset, token, length)` of every pin, left to right.
    pub fn pins(&self) -> impl Iterator<Item = (usize, Token, usize)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, c)| match *c {
            Constraint::Pinned { token, length } => Some((i, token, length)),
            _ => None,
        })
    }

    /// Track a key sequence of `len` keys. New slots are unconstrained;
    /// pins cut by shrinking are dropped on the next revalidation.
    pub fn resize(&mut self, len: usize) {
        self.slots.resize(len, Constraint::Unconstrained);
    }

    /// Re-derive every pin against `keys`, dropping pins that no longer
    /// match or that collide with an earlier pin.
    pub fn revalidate(&mut self, index: &PhraseIndex, keys: &[PhoneticKey], use_tone: bool) {
        let mut next = vec![Constraint::Unconstrained; keys.len()];
        let mut free_from = 0;
        for (offset, token, _) in self.pins() {
            if offset < free_from {
                continue;
            }
            match covered_length(index, keys, offset, token, use_tone) {
                Some(length) => {
                    next[offset] = Constraint::Pinned { token, length };
                    for slot in &mut next[offset + 1..offset + length] {
                        *slot = Constraint::Covered { by: offset };
                    }
                    free_from = offset + length;
                }
                None => debug!(offset, token, "dropping stale pin"),
            }
        }
        self.slots = next;
    }

    /// Pin `token` at `offset`, replacing overlapping pins.
    ///
    /// Returns the offset right after the pin so pins can be chained left to
    /// right. An invalid request leaves the lattice untouched.
    pub fn pin(
        &mut self,
        index: &PhraseIndex,
        keys: &[PhoneticKey],
        offset: usize,
        token: Token,
        use_tone: bool,
    ) -> Result<usize> {
        if offset >= self.slots.len() {
            return Err(DecoderError::InvalidConstraint { offset, token });
        }
        let length = covered_length(index, keys, offset, token, use_tone)
            .ok_or(DecoderError::InvalidConstraint { offset, token })?;
        if offset + length > self.slots.len() {
            return Err(DecoderError::InvalidConstraint { offset, token });
        }

        for i in offset..offset + length {
            self.clear(i);
        }
        self.slots[offset] = Constraint::Pinned { token, length };
        for slot in &mut self.slots[offset + 1..offset + length] {
            *slot = Constraint::Covered { by: offset };
        }

        self.revalidate(index, keys, use_tone);
        Ok(offset + length)
    }

    /// Remove the pin occupying `offset`, if any. Out of range is a no-op.
    pub fn clear(&mut self, offset: usize) {
        let start = match self.slots.get(offset) {
            Some(Constraint::Pinned { .. }) => offset,
            Some(Constraint::Covered { by }) => *by,
            _ => return,
        };
        let Some(Constraint::Pinned { length, .. }) = self.slots.get(start).copied() else {
            self.slots[offset] = Constraint::Unconstrained;
            return;
        };
        let end = (start + length).min(self.slots.len());
        for slot in &mut self.slots[start..end] {
            *slot = Constraint::Unconstrained;
        }
    }

    pub fn clear_all(&mut self) {
        self.slots.fill(Constraint::Unconstrained);
    }
}
