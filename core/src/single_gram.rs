/*!
SingleGram: the following-token -> count table of one context token.

A gram stores a cached total count and a list of `(token, count)` pairs kept
sorted by token, so lookups are binary searches and merges are a single
linear pass. System and user grams for the same context are combined with
[`SingleGram::merge`], which never touches either source.
*/

use serde::{Deserialize, Serialize};

use crate::token::Token;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleGram {
    total_freq: u32,
    /// Sorted by token ascending, tokens unique.
    items: Vec<(Token, u32)>,
}

impl SingleGram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_freq(&self) -> u32 {
        self.total_freq
    }

    pub fn set_total_freq(&mut self, total: u32) {
        self.total_freq = total;
    }

    /// Number of distinct following tokens.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Insert a token with the given count.
    ///
    /// Returns false and leaves the gram unchanged if the token is present.
    pub fn insert_freq(&mut self, token: Token, freq: u32) -> bool {
        match self.items.binary_search_by(|(t, _)| t.cmp(&token)) {
            Ok(_) => false,
            Err(idx) => {
                self.items.insert(idx, (token, freq));
                true
            }
        }
    }

    /// Overwrite an existing token's count. Returns false if absent.
    pub fn set_freq(&mut self, token: Token, freq: u32) -> bool {
        match self.items.binary_search_by(|(t, _)| t.cmp(&token)) {
            Ok(idx) => {
                self.items[idx].1 = freq;
                true
            }
            Err(_) => false,
        }
    }

    pub fn get_freq(&self, token: Token) -> Option<u32> {
        self.items
            .binary_search_by(|(t, _)| t.cmp(&token))
            .ok()
            .map(|idx| self.items[idx].1)
    }

    /// Add `delta` to both the token's count and the total, inserting the
    /// token if needed. Saturates instead of wrapping.
    pub fn increase_freq(&mut self, token: Token, delta: u32) {
        match self.items.binary_search_by(|(t, _)| t.cmp(&token)) {
            Ok(idx) => self.items[idx].1 = self.items[idx].1.saturating_add(delta),
            Err(idx) => self.items.insert(idx, (token, delta)),
        }
        self.total_freq = self.total_freq.saturating_add(delta);
    }

    /// `count(token) / total`, or 0 when the token is absent or the total is 0.
    pub fn probability(&self, token: Token) -> f64 {
        if self.total_freq == 0 {
            return 0.0;
        }
        self.get_freq(token).unwrap_or(0) as f64 / self.total_freq as f64
    }

    /// All `(token, count)` pairs in ascending token order.
    pub fn items(&self) -> &[(Token, u32)] {
        &self.items
    }

    /// Count-wise merge of a system and a user gram.
    ///
    /// Totals are summed, counts of shared tokens are summed, and the result
    /// stays sorted. A missing side contributes nothing; both missing yields
    /// an empty gram.
    pub fn merge(system: Option<&SingleGram>, user: Option<&SingleGram>) -> SingleGram {
        let (s, u) = match (system, user) {
            (None, None) => return SingleGram::new(),
            (Some(s), None) => return s.clone(),
            (None, Some(u)) => return u.clone(),
            (Some(s), Some(u)) => (s, u),
        };

        let mut items = Vec::with_capacity(s.items.len() + u.items.len());
        let (mut i, mut j) = (0usize, 0usize);
        while i < s.items.len() && j < u.items.len() {
            let (st, sf) = s.items[i];
            let (ut, uf) = u.items[j];
            if st < ut {
                items.push((st, sf));
                i += 1;
            } else if st > ut {
                items.push((ut, uf));
                j += 1;
            } else {
                items.push((st, sf.saturating_add(uf)));
                i += 1;
                j += 1;
            }
        }
        items.extend_from_slice(&s.items[i..]);
        items.extend_from_slice(&u.items[j..]);

        SingleGram {
            total_freq: s.total_freq.saturating_add(u.total_freq),
            items,
        }
    }
}
