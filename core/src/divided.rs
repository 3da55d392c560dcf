//! Run-together syllables that can be read as two shorter syllables.
//!
//! `xian` is a legal syllable on its own but is also what a user types for
//! `xi'an` without the separator. The table maps such spellings (toneless)
//! to the two halves.

use phf::phf_map;

/// Lookup of divided readings by toneless spelling.
pub trait DividedTable {
    /// The two halves `spelling` may be divided into, if any.
    fn divide(&self, spelling: &str) -> Option<(&str, &str)>;
}

static PINYIN_DIVIDED: phf::Map<&'static str, (&'static str, &'static str)> = phf_map! {
    "bian" => ("bi", "an"),
    "dian" => ("di", "an"),
    "jian" => ("ji", "an"),
    "jiang" => ("ji", "ang"),
    "jiao" => ("ji", "ao"),
    "lian" => ("li", "an"),
    "liang" => ("li", "ang"),
    "liao" => ("li", "ao"),
    "mian" => ("mi", "an"),
    "nian" => ("ni", "an"),
    "niang" => ("ni", "ang"),
    "pian" => ("pi", "an"),
    "qian" => ("qi", "an"),
    "qiang" => ("qi", "ang"),
    "qiao" => ("qi", "ao"),
    "tian" => ("ti", "an"),
    "xian" => ("xi", "an"),
    "xiang" => ("xi", "ang"),
    "xiao" => ("xi", "ao"),
    "yuan" => ("yu", "an"),
};

/// Built-in full-pinyin table.
#[derive(Debug, Clone, Copy, Default)]
pub struct PinyinDividedTable;

impl DividedTable for PinyinDividedTable {
    fn divide(&self, spelling: &str) -> Option<(&str, &str)> {
        PINYIN_DIVIDED.get(spelling).copied()
    }
}
