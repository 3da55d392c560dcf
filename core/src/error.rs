//! Error type shared by the dictionary overlay store, bigram stores and sessions.

use std::io;
use std::path::PathBuf;

use crate::token::{PartitionId, Token};

/// Errors surfaced by the decoder.
///
/// Dictionary lookup misses are not errors; an empty candidate list is a
/// valid result.
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("storage error: {0}")]
    Storage(#[from] redb::Error),

    #[error("phonetic index error: {0}")]
    Index(#[from] fst::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] bincode::Error),

    #[error("invalid chunk {}: {reason}", path.display())]
    InvalidChunk { path: PathBuf, reason: &'static str },

    #[error("user overlay format version mismatch")]
    FormatVersionMismatch,

    #[error("no user directory configured")]
    NoUserDirectory,

    #[error("invalid dictionary record {token}: {reason}")]
    InvalidRecord { token: Token, reason: &'static str },

    #[error("pronunciation of {text:?} has {keys} keys, expected one per character")]
    InvalidPronunciation { text: String, keys: usize },

    #[error("token {token} does not cover any keys at offset {offset}")]
    InvalidConstraint { offset: usize, token: Token },

    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(&'static str),

    #[error("read-only and read-write attach flags are mutually exclusive")]
    InvalidAttachFlags,

    #[error("bigram store is attached read-only")]
    ReadOnlyStore,

    #[error("unknown dictionary partition {0}")]
    UnknownPartition(PartitionId),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),
}

impl DecoderError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        DecoderError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = DecoderError> = std::result::Result<T, E>;
