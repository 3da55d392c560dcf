//! libchinese-decoder
//!
//! Decoding core of a phonetic input method: candidate expansion over a
//! phonetic index, unigram/bigram interpolated scoring, a per-session
//! constraint lattice, user model training, and incremental persistence of
//! the user's dictionary overlay on top of a read-only system dictionary.
//!
//! Syllable parsing and best-path sentence search are supplied by the
//! caller: keys come in through [`Session::set_keys`], sentence search
//! through the [`BestPathSearch`] trait.
//!
//! Public API:
//! - `Context` - shared dictionary, indexes and bigram model; init/save
//! - `Session` - keys, pins and match results of one input
//! - `Candidate` - scored dictionary entry for a key window
//! - `DecoderConfig` - options, training increments and partitions
use serde::{Deserialize, Serialize};

pub mod bigram;
pub use bigram::{AttachFlags, Bigram, BigramModel};

pub mod candidate;
pub use candidate::{Candidate, CandidateType};

pub mod chunk;

pub mod constraints;
pub use constraints::{Constraint, ConstraintLattice};

pub mod context;
pub use context::Context;

pub mod divided;
pub use divided::{DividedTable, PinyinDividedTable};

pub mod error;
pub use error::{DecoderError, Result};

pub mod expand;

pub mod key;
pub use key::{KeySpan, PhoneticKey};

pub mod overlay;
pub use overlay::OverlayStore;

pub mod phonetic_index;
pub use phonetic_index::{PhoneticIndex, SearchOutcome};

pub mod phrase_index;
pub use phrase_index::{
    LogRecord, PartitionChunk, PhraseIndex, PhraseIndexLog, PhraseItem, PhraseTable,
    Pronunciation,
};

pub mod scorer;
pub use scorer::{Scorer, DEFAULT_LAMBDA, SCORE_SCALE};

pub mod search;
pub use search::BestPathSearch;

pub mod session;
pub use session::Session;

pub mod single_gram;
pub use single_gram::SingleGram;

pub mod token;
pub use token::{PartitionId, Token, NULL_TOKEN, SENTENCE_START};

pub mod training;
pub use training::TrainingConfig;

/// A dictionary partition: its id and the file stem of its chunks
/// (`<name>.bin` in the system directory, `<name>.dbin` in the user one).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PartitionConfig {
    pub id: PartitionId,
    pub name: String,
}

/// Decoder options.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Match key tones against indexed tones (zero is a wildcard).
    pub use_tone: bool,
    /// Let bigram statistics of the previous phrase influence ranking.
    pub dynamic_adjust: bool,
    /// Read a single run-together syllable as two (`xian` as `xi'an`).
    /// Only a lone remaining key is divided; expansion fails when it
    /// reaches a two-key window.
    pub use_divided_table: bool,
    /// Resplit ambiguous two-syllable windows. Not supported; expansion
    /// fails when it reaches such a window.
    pub use_resplit_table: bool,

    /// Weight of the bigram probability, in (0, 1).
    pub lambda: f64,

    /// Capacity of the cache of merged bigram context models
    pub context_cache_size: usize,

    pub training: TrainingConfig,

    /// Loaded partitions, ids unique.
    pub partitions: Vec<PartitionConfig>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            use_tone: true,
            dynamic_adjust: false,
            use_divided_table: false,
            use_resplit_table: false,
            lambda: DEFAULT_LAMBDA,
            context_cache_size: 256,
            training: TrainingConfig::default(),
            partitions: vec![
                PartitionConfig {
                    id: 1,
                    name: "gb_char".into(),
                },
                PartitionConfig {
                    id: 2,
                    name: "gbk_char".into(),
                },
            ],
        }
    }
}

impl DecoderConfig {
    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| DecoderError::io(path, e))?;
        let config = Self::from_toml_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = self
            .to_toml_string()
            .map_err(|e| DecoderError::InvalidConfig(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| DecoderError::io(path, e))
    }

    /// Load configuration from TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize configuration to TOML string.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.lambda > 0.0 && self.lambda < 1.0) {
            return Err(DecoderError::InvalidConfig(format!(
                "lambda {} outside (0, 1)",
                self.lambda
            )));
        }
        for (i, p) in self.partitions.iter().enumerate() {
            if p.id as usize >= token::MAX_PARTITIONS {
                return Err(DecoderError::UnknownPartition(p.id));
            }
            if p.name.is_empty() {
                return Err(DecoderError::InvalidConfig(format!(
                    "partition {} has no name",
                    p.id
                )));
            }
            if let Some(dup) = self.partitions[..i]
                .iter()
                .find(|q| q.id == p.id || q.name == p.name)
            {
                return Err(DecoderError::InvalidConfig(format!(
                    "partitions {} and {} collide",
                    dup.id, p.id
                )));
            }
        }
        Ok(())
    }
}

/// Utility helpers.
pub mod utils {
    /// Normalize input strings (NFC) and trim whitespace.
    pub fn normalize(s: &str) -> String {
        use unicode_normalization::UnicodeNormalization;
        s.nfc().collect::<String>().trim().to_string()
    }
}
