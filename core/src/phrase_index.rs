//! Phrase index: dictionary entries grouped into partitions.
//!
//! Each partition starts from an immutable system chunk. User edits are
//! applied to the in-memory partition and persisted as a log of differences
//! against that chunk, never by rewriting it:
//!
//! - [`SubPhraseIndex::diff`] computes the minimal [`PhraseIndexLog`] between
//!   the current state and an original system chunk;
//! - [`SubPhraseIndex::merge`] replays a log on top of a base.
//!
//! Both walk tokens in ascending order, so logs are byte-stable and
//! `merge(base, diff(base, state)) == state`.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::chunk;
use crate::error::{DecoderError, Result};
use crate::key::PhoneticKey;
use crate::token::{make_token, partition_of, PartitionId, Token, MAX_PARTITIONS, PHRASE_MASK};

const PARTITION_MAGIC: &[u8; 4] = b"LCPI";
const LOG_MAGIC: &[u8; 4] = b"LCPL";

/// One way of pronouncing a phrase, with its own observed frequency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pronunciation {
    pub keys: Vec<PhoneticKey>,
    pub freq: u32,
}

/// A dictionary entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseItem {
    text: String,
    unigram_freq: u32,
    pronunciations: Vec<Pronunciation>,
}

impl PhraseItem {
    pub fn new<T: Into<String>>(text: T, unigram_freq: u32) -> Self {
        Self {
            text: text.into(),
            unigram_freq,
            pronunciations: Vec::new(),
        }
    }

    /// Builder-style helper adding one pronunciation.
    pub fn with_pronunciation(mut self, keys: Vec<PhoneticKey>, freq: u32) -> Self {
        self.add_pronunciation(keys, freq);
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Phrase length in characters.
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn unigram_freq(&self) -> u32 {
        self.unigram_freq
    }

    pub fn pronunciations(&self) -> &[Pronunciation] {
        &self.pronunciations
    }

    /// Add a pronunciation, or bump the frequency of an identical one.
    pub fn add_pronunciation(&mut self, keys: Vec<PhoneticKey>, freq: u32) {
        match self.pronunciations.iter_mut().find(|p| p.keys == keys) {
            Some(p) => p.freq = p.freq.saturating_add(freq),
            None => self.pronunciations.push(Pronunciation { keys, freq }),
        }
    }

    /// Check that every pronunciation has one key per character.
    pub fn check(&self) -> std::result::Result<(), &'static str> {
        let len = self.len();
        for p in &self.pronunciations {
            if p.keys.is_empty() {
                return Err("empty pronunciation");
            }
            if p.keys.len() != len {
                return Err("pronunciation length differs from phrase length");
            }
        }
        Ok(())
    }

    /// Whether some pronunciation matches `keys` exactly (tones per
    /// [`PhoneticKey::tone_matches`] when `use_tone`, ignored otherwise).
    pub fn matches_keys(&self, keys: &[PhoneticKey], use_tone: bool) -> bool {
        self.pronunciations.iter().any(|p| {
            p.keys.len() == keys.len()
                && p.keys.iter().zip(keys).all(|(indexed, query)| {
                    indexed.spelling() == query.spelling()
                        && (!use_tone || query.tone_matches(indexed.tone()))
                })
        })
    }
}

/// On-disk body of a system partition chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionChunk {
    pub partition: PartitionId,
    pub items: BTreeMap<Token, PhraseItem>,
}

impl PartitionChunk {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        chunk::load(PARTITION_MAGIC, path.as_ref())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        chunk::encode(PARTITION_MAGIC, self)
    }

    /// Write the chunk atomically. Used to build system directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        chunk::write_atomic(path.as_ref(), &self.to_bytes()?)
    }
}

/// One difference between a partition and its system chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogRecord {
    /// Entry added by the user, or changed from the system version.
    Upsert { token: Token, item: PhraseItem },
    /// System entry removed by the user.
    Remove { token: Token },
}

/// Ordered difference log of one partition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseIndexLog {
    pub partition: PartitionId,
    pub records: Vec<LogRecord>,
}

impl PhraseIndexLog {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Load a user log; an absent file is an empty log.
    pub fn load<P: AsRef<Path>>(partition: PartitionId, path: P) -> Result<Self> {
        Ok(chunk::load_optional(LOG_MAGIC, path.as_ref())?.unwrap_or(PhraseIndexLog {
            partition,
            records: Vec::new(),
        }))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        chunk::encode(LOG_MAGIC, self)
    }
}

/// One loaded partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubPhraseIndex {
    partition: PartitionId,
    items: BTreeMap<Token, PhraseItem>,
    total_freq: u64,
}

impl SubPhraseIndex {
    pub fn new(partition: PartitionId) -> Self {
        Self {
            partition,
            items: BTreeMap::new(),
            total_freq: 0,
        }
    }

    pub fn from_chunk(chunk: PartitionChunk) -> Self {
        let total_freq = chunk.items.values().map(|i| i.unigram_freq as u64).sum();
        Self {
            partition: chunk.partition,
            items: chunk.items,
            total_freq,
        }
    }

    pub fn to_chunk(&self) -> PartitionChunk {
        PartitionChunk {
            partition: self.partition,
            items: self.items.clone(),
        }
    }

    pub fn partition(&self) -> PartitionId {
        self.partition
    }

    pub fn total_freq(&self) -> u64 {
        self.total_freq
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, token: Token) -> Option<&PhraseItem> {
        self.items.get(&token)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Token, &PhraseItem)> {
        self.items.iter().map(|(t, i)| (*t, i))
    }

    /// Insert or replace an entry, keeping the running total in step.
    pub fn insert(&mut self, token: Token, item: PhraseItem) -> Option<PhraseItem> {
        self.total_freq += item.unigram_freq as u64;
        let old = self.items.insert(token, item);
        if let Some(ref o) = old {
            self.total_freq -= o.unigram_freq as u64;
        }
        old
    }

    pub fn remove(&mut self, token: Token) -> Option<PhraseItem> {
        let old = self.items.remove(&token)?;
        self.total_freq -= old.unigram_freq as u64;
        Some(old)
    }

    /// Add to an entry's unigram frequency. Returns false if absent.
    pub fn add_unigram_frequency(&mut self, token: Token, delta: u32) -> bool {
        match self.items.get_mut(&token) {
            Some(item) => {
                let before = item.unigram_freq;
                item.unigram_freq = before.saturating_add(delta);
                self.total_freq += (item.unigram_freq - before) as u64;
                true
            }
            None => false,
        }
    }

    /// Lowest unused token above every existing entry.
    pub fn next_token(&self) -> Token {
        // Offsets 0 and 1 of partition 0 are NULL_TOKEN and SENTENCE_START.
        let first = make_token(self.partition, 2);
        match self.items.keys().next_back() {
            Some(&last) if last >= first => last + 1,
            _ => first,
        }
    }

    /// Minimal log turning `original` into this partition.
    pub fn diff(&self, original: &PartitionChunk) -> PhraseIndexLog {
        let mut records = Vec::new();
        let mut ours = self.items.iter().peekable();
        let mut theirs = original.items.iter().peekable();

        loop {
            let order = match (ours.peek(), theirs.peek()) {
                (None, None) => break,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some((a, _)), Some((b, _))) => a.cmp(b),
            };
            match order {
                Ordering::Less => {
                    if let Some((token, item)) = ours.next() {
                        records.push(LogRecord::Upsert {
                            token: *token,
                            item: item.clone(),
                        });
                    }
                }
                Ordering::Greater => {
                    if let Some((token, _)) = theirs.next() {
                        records.push(LogRecord::Remove { token: *token });
                    }
                }
                Ordering::Equal => {
                    if let (Some((token, item)), Some((_, base))) = (ours.next(), theirs.next()) {
                        if item != base {
                            records.push(LogRecord::Upsert {
                                token: *token,
                                item: item.clone(),
                            });
                        }
                    }
                }
            }
        }

        PhraseIndexLog {
            partition: self.partition,
            records,
        }
    }

    /// Replay a log on top of this partition.
    ///
    /// The whole log is checked first; a record naming a token of another
    /// partition or carrying a malformed entry rejects it unapplied.
    pub fn merge(&mut self, log: &PhraseIndexLog) -> Result<()> {
        for record in &log.records {
            let (token, item) = match record {
                LogRecord::Upsert { token, item } => (*token, Some(item)),
                LogRecord::Remove { token } => (*token, None),
            };
            if partition_of(token) != self.partition {
                return Err(DecoderError::InvalidRecord {
                    token,
                    reason: "token outside partition",
                });
            }
            if let Some(reason) = item.and_then(|i| i.check().err()) {
                return Err(DecoderError::InvalidRecord { token, reason });
            }
        }

        for record in &log.records {
            match record {
                LogRecord::Upsert { token, item } => {
                    self.insert(*token, item.clone());
                }
                LogRecord::Remove { token } => {
                    self.remove(*token);
                }
            }
        }
        Ok(())
    }
}

/// All loaded partitions, iterated in ascending partition id.
#[derive(Debug, Clone, Default)]
pub struct PhraseIndex {
    partitions: BTreeMap<PartitionId, SubPhraseIndex>,
}

impl PhraseIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a partition from its system chunk, replacing any previous one.
    pub fn load(&mut self, chunk: PartitionChunk) -> Result<()> {
        let id = chunk.partition;
        if id as usize >= MAX_PARTITIONS {
            return Err(DecoderError::UnknownPartition(id));
        }
        if let Some(bad) = chunk.items.keys().find(|t| partition_of(**t) != id) {
            return Err(DecoderError::UnknownPartition(partition_of(*bad)));
        }
        for (token, item) in &chunk.items {
            item.check()
                .map_err(|reason| DecoderError::InvalidRecord { token: *token, reason })?;
        }
        self.partitions.insert(id, SubPhraseIndex::from_chunk(chunk));
        Ok(())
    }

    pub fn merge(&mut self, log: &PhraseIndexLog) -> Result<()> {
        self.partition_mut(log.partition)?.merge(log)
    }

    pub fn diff(&self, original: &PartitionChunk) -> Result<PhraseIndexLog> {
        self.partitions
            .get(&original.partition)
            .map(|p| p.diff(original))
            .ok_or(DecoderError::UnknownPartition(original.partition))
    }

    pub fn partition(&self, id: PartitionId) -> Option<&SubPhraseIndex> {
        self.partitions.get(&id)
    }

    fn partition_mut(&mut self, id: PartitionId) -> Result<&mut SubPhraseIndex> {
        self.partitions
            .get_mut(&id)
            .ok_or(DecoderError::UnknownPartition(id))
    }

    pub fn partition_ids(&self) -> impl Iterator<Item = PartitionId> + '_ {
        self.partitions.keys().copied()
    }

    pub fn get_phrase_item(&self, token: Token) -> Option<&PhraseItem> {
        self.partitions.get(&partition_of(token))?.get(token)
    }

    pub fn contains(&self, token: Token) -> bool {
        self.get_phrase_item(token).is_some()
    }

    /// Sum of unigram frequencies over every loaded partition.
    pub fn total_freq(&self) -> u64 {
        self.partitions.values().map(|p| p.total_freq()).sum()
    }

    /// Every entry, by ascending partition then token.
    pub fn iter(&self) -> impl Iterator<Item = (Token, &PhraseItem)> {
        self.partitions.values().flat_map(|p| p.iter())
    }

    pub fn add_phrase_item(&mut self, token: Token, item: PhraseItem) -> Result<Option<PhraseItem>> {
        Ok(self.partition_mut(partition_of(token))?.insert(token, item))
    }

    pub fn remove_phrase_item(&mut self, token: Token) -> Option<PhraseItem> {
        self.partitions.get_mut(&partition_of(token))?.remove(token)
    }

    pub fn add_unigram_frequency(&mut self, token: Token, delta: u32) -> bool {
        self.partitions
            .get_mut(&partition_of(token))
            .map(|p| p.add_unigram_frequency(token, delta))
            .unwrap_or(false)
    }

    pub fn next_token(&self, partition: PartitionId) -> Result<Token> {
        let p = self
            .partitions
            .get(&partition)
            .ok_or(DecoderError::UnknownPartition(partition))?;
        let next = p.next_token();
        if next & PHRASE_MASK == 0 {
            // offset wrapped into the next partition
            return Err(DecoderError::UnknownPartition(partition));
        }
        Ok(next)
    }
}

/// Reverse lookup from phrase text to tokens.
#[derive(Debug, Clone, Default)]
pub struct PhraseTable {
    by_text: HashMap<String, Vec<Token>>,
}

impl PhraseTable {
    pub fn build(index: &PhraseIndex) -> Self {
        let mut by_text: HashMap<String, Vec<Token>> = HashMap::new();
        for (token, item) in index.iter() {
            by_text.entry(item.text().to_string()).or_default().push(token);
        }
        Self { by_text }
    }

    /// Lowest token whose text is exactly `text`.
    pub fn search(&self, text: &str) -> Option<Token> {
        self.by_text.get(text).and_then(|v| v.first().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(s: &str) -> Vec<PhoneticKey> {
        s.split('\'').filter_map(PhoneticKey::parse).collect()
    }

    fn base_chunk() -> PartitionChunk {
        let mut items = BTreeMap::new();
        items.insert(
            make_token(1, 2),
            PhraseItem::new("你", 500).with_pronunciation(keys("ni3"), 10),
        );
        items.insert(
            make_token(1, 3),
            PhraseItem::new("好", 300).with_pronunciation(keys("hao3"), 10),
        );
        items.insert(
            make_token(1, 4),
            PhraseItem::new("你好", 80).with_pronunciation(keys("ni'hao"), 10),
        );
        PartitionChunk {
            partition: 1,
            items,
        }
    }

    #[test]
    fn totals_track_mutations() {
        let mut p = SubPhraseIndex::from_chunk(base_chunk());
        assert_eq!(p.total_freq(), 880);
        assert!(p.add_unigram_frequency(make_token(1, 2), 20));
        assert_eq!(p.total_freq(), 900);
        p.remove(make_token(1, 4));
        assert_eq!(p.total_freq(), 820);
        p.insert(make_token(1, 3), PhraseItem::new("好", 100));
        assert_eq!(p.total_freq(), 620);
    }

    #[test]
    fn diff_of_unchanged_partition_is_empty() {
        let chunk = base_chunk();
        let p = SubPhraseIndex::from_chunk(chunk.clone());
        assert!(p.diff(&chunk).is_empty());
    }

    #[test]
    fn diff_records_upserts_and_removals_in_token_order() {
        let chunk = base_chunk();
        let mut p = SubPhraseIndex::from_chunk(chunk.clone());
        p.add_unigram_frequency(make_token(1, 3), 7);
        p.remove(make_token(1, 2));
        let added = p.next_token();
        p.insert(added, PhraseItem::new("拟好", 1));

        let log = p.diff(&chunk);
        assert_eq!(
            log.records
                .iter()
                .map(|r| match r {
                    LogRecord::Upsert { token, .. } => (*token, true),
                    LogRecord::Remove { token } => (*token, false),
                })
                .collect::<Vec<_>>(),
            vec![
                (make_token(1, 2), false),
                (make_token(1, 3), true),
                (added, true),
            ]
        );

        let mut rebuilt = SubPhraseIndex::from_chunk(chunk);
        rebuilt.merge(&log).unwrap();
        assert_eq!(rebuilt, p);
    }

    #[test]
    fn repeated_diffs_are_byte_identical() {
        let chunk = base_chunk();
        let mut p = SubPhraseIndex::from_chunk(chunk.clone());
        p.add_unigram_frequency(make_token(1, 4), 3);
        let a = p.diff(&chunk).to_bytes().unwrap();
        let b = p.diff(&chunk).to_bytes().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn facade_rejects_tokens_of_foreign_partitions() {
        let mut chunk = base_chunk();
        chunk.items.insert(make_token(2, 9), PhraseItem::new("x", 1));
        let mut index = PhraseIndex::new();
        assert!(matches!(
            index.load(chunk),
            Err(DecoderError::UnknownPartition(2))
        ));
    }

    #[test]
    fn malformed_entries_are_rejected_at_load() {
        let mut chunk = base_chunk();
        chunk.items.insert(
            make_token(1, 5),
            PhraseItem::new("你好", 1).with_pronunciation(keys("ni3"), 1),
        );
        let mut index = PhraseIndex::new();
        assert!(matches!(
            index.load(chunk),
            Err(DecoderError::InvalidRecord { token, .. }) if token == make_token(1, 5)
        ));

        let mut chunk = base_chunk();
        chunk
            .items
            .insert(make_token(1, 6), PhraseItem::new("好", 1).with_pronunciation(Vec::new(), 1));
        assert!(PhraseIndex::new().load(chunk).is_err());
    }

    #[test]
    fn merge_rejects_logs_touching_other_partitions() {
        let chunk = base_chunk();
        let mut p = SubPhraseIndex::from_chunk(chunk);
        let before = p.clone();
        let log = PhraseIndexLog {
            partition: 1,
            records: vec![
                LogRecord::Remove { token: make_token(1, 2) },
                LogRecord::Upsert {
                    token: make_token(2, 7),
                    item: PhraseItem::new("外", 9),
                },
            ],
        };
        assert!(matches!(
            p.merge(&log),
            Err(DecoderError::InvalidRecord { reason: "token outside partition", .. })
        ));
        assert_eq!(p, before);
        assert_eq!(p.total_freq(), 880);
    }

    #[test]
    fn next_token_skips_reserved_offsets() {
        let p = SubPhraseIndex::new(0);
        assert_eq!(p.next_token(), 2);
        let p = SubPhraseIndex::from_chunk(base_chunk());
        assert_eq!(p.next_token(), make_token(1, 5));
    }

    #[test]
    fn pronunciation_matching_respects_tone_option() {
        let item = PhraseItem::new("你", 1).with_pronunciation(keys("ni3"), 1);
        assert!(item.matches_keys(&keys("ni"), true));
        assert!(item.matches_keys(&keys("ni3"), true));
        assert!(!item.matches_keys(&keys("ni2"), true));
        assert!(item.matches_keys(&keys("ni2"), false));
        assert!(!item.matches_keys(&keys("ni'hao"), false));
    }

    #[test]
    fn phrase_table_finds_lowest_token() {
        let mut index = PhraseIndex::new();
        index.load(base_chunk()).unwrap();
        let table = PhraseTable::build(&index);
        assert_eq!(table.search("你好"), Some(make_token(1, 4)));
        assert_eq!(table.search("他"), None);
    }
}
