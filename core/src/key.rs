//! Phonetic keys as produced by the external syllable parser.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Tone value meaning "unspecified".
pub const ZERO_TONE: u8 = 0;

/// Highest tone value (neutral tone).
pub const MAX_TONE: u8 = 5;

/// Canonical form of one syllable: toneless spelling plus an optional tone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PhoneticKey {
    spelling: String,
    tone: u8,
}

impl PhoneticKey {
    pub fn new<S: Into<String>>(spelling: S, tone: u8) -> Self {
        Self {
            spelling: spelling.into(),
            tone: tone.min(MAX_TONE),
        }
    }

    /// Parse a single syllable such as `"xian"` or `"xian1"`.
    ///
    /// A trailing digit in `1..=5` is taken as the tone. Returns `None` for
    /// empty input or anything other than lowercase ASCII letters (`v` and
    /// `ü` allowed for the u-umlaut).
    pub fn parse(text: &str) -> Option<Self> {
        let (body, tone) = match text.chars().last() {
            Some(c @ '1'..='5') => (&text[..text.len() - 1], c as u8 - b'0'),
            _ => (text, ZERO_TONE),
        };
        if body.is_empty() || !body.chars().all(|c| c.is_ascii_lowercase() || c == 'ü') {
            return None;
        }
        Some(Self::new(body, tone))
    }

    pub fn spelling(&self) -> &str {
        &self.spelling
    }

    pub fn tone(&self) -> u8 {
        self.tone
    }

    pub fn has_tone(&self) -> bool {
        self.tone != ZERO_TONE
    }

    /// Copy of this key with the given tone.
    pub fn with_tone(&self, tone: u8) -> Self {
        Self::new(self.spelling.clone(), tone)
    }

    /// Copy of this key with the tone cleared.
    pub fn without_tone(&self) -> Self {
        self.with_tone(ZERO_TONE)
    }

    /// Whether this query key accepts an indexed tone.
    ///
    /// A zero tone on either side is a wildcard.
    pub fn tone_matches(&self, indexed: u8) -> bool {
        self.tone == ZERO_TONE || indexed == ZERO_TONE || self.tone == indexed
    }
}

impl fmt::Display for PhoneticKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_tone() {
            write!(f, "{}{}", self.spelling, self.tone)
        } else {
            f.write_str(&self.spelling)
        }
    }
}

/// Byte range in the raw input a key was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeySpan {
    pub raw_begin: u16,
    pub raw_end: u16,
}

impl KeySpan {
    pub fn new(raw_begin: u16, raw_end: u16) -> Self {
        Self { raw_begin, raw_end }
    }

    pub fn len(&self) -> usize {
        self.raw_end.saturating_sub(self.raw_begin) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Join the toneless spellings of `keys` with apostrophes (`"ni'hao"`).
pub fn joined_spelling(keys: &[PhoneticKey]) -> String {
    keys.iter()
        .map(|k| k.spelling())
        .collect::<Vec<&str>>()
        .join("'")
}
