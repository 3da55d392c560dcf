//! Fixtures shared by the integration tests: on-disk system directories,
//! key helpers and a greedy best-path search.
#![allow(dead_code)]

use std::path::Path;

use libchinese_decoder::{
    AttachFlags, Bigram, BestPathSearch, Constraint, Context, DecoderConfig, KeySpan,
    PartitionChunk, PartitionConfig, PhoneticKey, PhraseItem, SingleGram, Token, NULL_TOKEN,
};
use tempfile::TempDir;

/// Parse `"ni3'hao3"` into keys.
pub fn keys(s: &str) -> Vec<PhoneticKey> {
    s.split('\'')
        .map(|k| PhoneticKey::parse(k).expect("valid key"))
        .collect()
}

/// Spans of keys typed back to back without separators.
pub fn spans(keys: &[PhoneticKey]) -> Vec<KeySpan> {
    let mut at = 0u16;
    keys.iter()
        .map(|k| {
            let len = k.to_string().len() as u16;
            let span = KeySpan::new(at, at + len);
            at += len;
            span
        })
        .collect()
}

/// Single partition 0 named `base`.
pub fn config() -> DecoderConfig {
    DecoderConfig {
        partitions: vec![PartitionConfig {
            id: 0,
            name: "base".into(),
        }],
        ..Default::default()
    }
}

/// `(token, text, pronunciation, unigram frequency)`
pub type Entry<'a> = (Token, &'a str, &'a str, u32);

/// ni/hao entries, longer phrases over them and a few xi/an entries.
/// Repeated tokens add a pronunciation.
pub const BASE: &[Entry<'static>] = &[
    (10, "你", "ni3", 500),
    (11, "好", "hao3", 300),
    (12, "号", "hao4", 100),
    (13, "泥", "ni2", 50),
    (13, "泥", "ni4", 50),
    (14, "你好", "ni3'hao3", 80),
    (15, "你好吗", "ni3'hao3'ma", 40),
    (20, "西", "xi1", 200),
    (21, "安", "an1", 150),
    (22, "先", "xian1", 400),
    (23, "西安", "xi1'an1", 90),
    (24, "现", "xian4", 350),
];

pub fn write_system(dir: &Path, entries: &[Entry<'_>]) {
    let mut chunk = PartitionChunk::default();
    for &(token, text, pron, freq) in entries {
        chunk
            .items
            .entry(token)
            .and_modify(|item: &mut PhraseItem| item.add_pronunciation(keys(pron), 1))
            .or_insert_with(|| PhraseItem::new(text, freq).with_pronunciation(keys(pron), 1));
    }
    chunk.save(dir.join("base.bin")).expect("write system chunk");
}

pub fn write_system_bigram(dir: &Path, grams: &[(Token, Token, u32)]) {
    let mut store = Bigram::attach(
        dir.join("bigram.db"),
        AttachFlags::READ_WRITE.with_create(),
    )
    .expect("create bigram store");
    let mut contexts: std::collections::BTreeMap<Token, SingleGram> = Default::default();
    for &(prev, next, count) in grams {
        contexts.entry(prev).or_default().increase_freq(next, count);
    }
    for (prev, gram) in contexts {
        store.store(prev, gram).expect("store gram");
    }
}

pub struct Dirs {
    pub system: TempDir,
    pub user: TempDir,
}

impl Dirs {
    pub fn new(entries: &[Entry<'_>]) -> Self {
        let system = tempfile::tempdir().expect("tempdir");
        write_system(system.path(), entries);
        Self {
            system,
            user: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn open(&self, config: DecoderConfig) -> Context {
        Context::init(self.system.path(), Some(self.user.path()), config).expect("init")
    }
}

/// Left-to-right search: pins are taken as given, elsewhere the longest
/// matching window wins and within it the most frequent phrase.
/// Records the prefixes it was called with.
#[derive(Default)]
pub struct GreedySearch {
    pub prefixes: std::cell::RefCell<Vec<Token>>,
}

impl BestPathSearch for GreedySearch {
    fn best_match(
        &self,
        ctx: &Context,
        prefixes: &[Token],
        keys: &[PhoneticKey],
        constraints: &[Constraint],
    ) -> libchinese_decoder::Result<Vec<Token>> {
        *self.prefixes.borrow_mut() = prefixes.to_vec();
        let mut results = vec![NULL_TOKEN; keys.len()];
        let mut i = 0;
        while i < keys.len() {
            if let Some(Constraint::Pinned { token, length }) = constraints.get(i) {
                results[i] = *token;
                i += length;
                continue;
            }
            // windows stop short of the next pin
            let limit = (i + 1..keys.len())
                .find(|j| matches!(constraints.get(*j), Some(Constraint::Pinned { .. })))
                .unwrap_or(keys.len());
            let mut step = 1;
            for len in (1..=limit - i).rev() {
                let found = ctx
                    .phonetic_index()
                    .search(&keys[i..i + len], ctx.config().use_tone);
                let best = found.tokens.iter().copied().max_by_key(|t| {
                    ctx.phrase_index()
                        .get_phrase_item(*t)
                        .map_or(0, |item| item.unigram_freq())
                });
                if let Some(token) = best {
                    results[i] = token;
                    step = len;
                    break;
                }
            }
            i += step;
        }
        Ok(results)
    }
}
