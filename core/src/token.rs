//! Phrase tokens and dictionary partitions.
//!
//! A token packs the partition id into bits 24..28 and the entry offset into
//! the low 24 bits, so tokens of one partition form a contiguous range.

/// Opaque id of one dictionary entry.
pub type Token = u32;

/// Small integer naming an independently loadable dictionary shard.
pub type PartitionId = u8;

/// "No entry".
pub const NULL_TOKEN: Token = 0;

/// Synthetic token seeding sentence-initial context.
pub const SENTENCE_START: Token = 1;

/// Low bits holding the offset inside a partition.
pub const PHRASE_MASK: Token = 0x00FF_FFFF;

/// Bits holding the partition id.
pub const PARTITION_MASK: Token = 0x0F00_0000;

/// Number of addressable partitions.
pub const MAX_PARTITIONS: usize = 16;

/// Longest phrase, in characters and in phonetic keys.
pub const MAX_PHRASE_LENGTH: usize = 16;

/// Partition the token belongs to.
pub fn partition_of(token: Token) -> PartitionId {
    ((token & PARTITION_MASK) >> 24) as PartitionId
}

/// Build a token from a partition id and an offset inside that partition.
pub fn make_token(partition: PartitionId, offset: u32) -> Token {
    debug_assert!((partition as usize) < MAX_PARTITIONS);
    (((partition as Token) << 24) & PARTITION_MASK) | (offset & PHRASE_MASK)
}
