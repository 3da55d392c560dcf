//! Phonetic index: exact and prefix lookup of key sequences.
//!
//! Joined spellings (`"ni'hao"`) are stored in an FST mapping each key to a
//! payload slot; a payload lists the tokens pronounced that way with the
//! tone of each syllable. The index is derived from the loaded phrase index
//! and rebuilt after overlay edits.

use std::collections::BTreeMap;

use fst::{IntoStreamer, Map, MapBuilder, Streamer};

use crate::error::Result;
use crate::key::{joined_spelling, PhoneticKey};
use crate::phrase_index::PhraseIndex;
use crate::token::Token;

#[derive(Debug, Clone, PartialEq, Eq)]
struct IndexEntry {
    token: Token,
    tones: Vec<u8>,
}

/// Result of looking up one key window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOutcome {
    /// Tokens pronounced exactly like the window, in index order. May
    /// repeat a token that has several matching pronunciations.
    pub tokens: Vec<Token>,
    /// Some longer indexed sequence starts with this window.
    pub continued: bool,
}

impl SearchOutcome {
    /// At least one token matched.
    pub fn is_match(&self) -> bool {
        !self.tokens.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct PhoneticIndex {
    map: Map<Vec<u8>>,
    payloads: Vec<Vec<IndexEntry>>,
}

impl Default for PhoneticIndex {
    fn default() -> Self {
        Self {
            map: Map::default(),
            payloads: Vec::new(),
        }
    }
}

impl PhoneticIndex {
    /// Index every pronunciation of every loaded phrase.
    pub fn build(index: &PhraseIndex) -> Result<Self> {
        let mut grouped: BTreeMap<String, Vec<IndexEntry>> = BTreeMap::new();
        for (token, item) in index.iter() {
            for pron in item.pronunciations() {
                if pron.keys.is_empty() {
                    continue;
                }
                grouped
                    .entry(joined_spelling(&pron.keys))
                    .or_default()
                    .push(IndexEntry {
                        token,
                        tones: pron.keys.iter().map(|k| k.tone()).collect(),
                    });
            }
        }

        let mut builder = MapBuilder::memory();
        let mut payloads = Vec::with_capacity(grouped.len());
        for (slot, (key, entries)) in grouped.into_iter().enumerate() {
            builder.insert(key, slot as u64)?;
            payloads.push(entries);
        }

        Ok(Self {
            map: builder.into_map(),
            payloads,
        })
    }

    /// Number of distinct indexed spellings.
    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    /// Look up the exact key window `keys`.
    pub fn search(&self, keys: &[PhoneticKey], use_tone: bool) -> SearchOutcome {
        if keys.is_empty() {
            return SearchOutcome::default();
        }
        let joined = joined_spelling(keys);

        let tokens = self
            .map
            .get(&joined)
            .and_then(|slot| self.payloads.get(slot as usize))
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| {
                        !use_tone
                            || keys
                                .iter()
                                .zip(&e.tones)
                                .all(|(k, tone)| k.tone_matches(*tone))
                    })
                    .map(|e| e.token)
                    .collect()
            })
            .unwrap_or_default();

        // '(' is the byte after '\'', so this range holds exactly the keys
        // that extend the window by at least one syllable.
        let lower = format!("{joined}'");
        let upper = format!("{joined}(");
        let mut longer = self.map.range().ge(&lower).lt(&upper).into_stream();
        let continued = longer.next().is_some();

        SearchOutcome { tokens, continued }
    }
}
