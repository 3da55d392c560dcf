//! Candidates produced by window expansion.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::key::KeySpan;
use crate::token::Token;

/// How a candidate's phonetic window was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandidateType {
    /// Direct match of the key window.
    Normal,
    /// A single run-together key read as two syllables (`xian` as `xi'an`).
    Divided,
}

/// A scored dictionary entry for one key window.
///
/// Candidates are transient: they are rebuilt on every expansion and never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub token: Token,
    pub candidate_type: CandidateType,
    /// Key positions covered, as a half-open range into the session keys.
    pub phonetic_span: Range<usize>,
    /// Raw-input span of the original key for divided candidates.
    pub orig_span: Option<KeySpan>,
    /// Spelling the divided reading stands for, e.g. `"xi'an1"`.
    pub alternate_spelling: Option<String>,
    /// Fixed-point score, higher is better.
    pub score: u32,
}

impl Candidate {
    pub fn new(token: Token, phonetic_span: Range<usize>) -> Self {
        Self {
            token,
            candidate_type: CandidateType::Normal,
            phonetic_span,
            orig_span: None,
            alternate_spelling: None,
            score: 0,
        }
    }

    /// A candidate for a divided reading of the key at `offset`.
    pub fn divided(token: Token, offset: usize, orig_span: KeySpan, spelling: String) -> Self {
        Self {
            token,
            candidate_type: CandidateType::Divided,
            phonetic_span: offset..offset + 1,
            orig_span: Some(orig_span),
            alternate_spelling: Some(spelling),
            score: 0,
        }
    }

    /// Number of keys this candidate was looked up with.
    ///
    /// Divided candidates report 2: they were matched against two synthetic
    /// keys even though they cover a single input key.
    pub fn window_len(&self) -> usize {
        match self.candidate_type {
            CandidateType::Normal => self.phonetic_span.len(),
            CandidateType::Divided => 2,
        }
    }

    pub fn is_divided(&self) -> bool {
        self.candidate_type == CandidateType::Divided
    }
}
