//! Track where blocks sit in the compressed bitstream and in the decoded output.
//!
//! Every block header, data or end-of-stream, gets one entry mapping its
//! starting bit offset to the number of bytes decoded before it. The map is
//! append-only while decoding and becomes immutable once the final
//! end-of-stream block has been seen; from then on it can be exported, handed
//! to another reader, and used for random access without decoding anything.

use std::collections::BTreeMap;

use crate::errors::{Error, Result};

/// Ordered map from compressed bit offset of a block start to the cumulative
/// count of decoded bytes before that block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockOffsets {
    map: BTreeMap<u64, u64>,
    complete: bool,
}

impl BlockOffsets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a map from exported `(bit_offset, decoded_byte_offset)` pairs.
    ///
    /// Requires at least one data block entry plus the end-of-stream entry,
    /// strictly increasing bit offsets, and non-decreasing decoded offsets (an
    /// end-of-stream block and the next stream's first data block legitimately
    /// share one). The result is marked complete and usable for random access.
    pub fn from_pairs(pairs: &[(u64, u64)]) -> Result<Self> {
        if pairs.len() < 2 {
            return Err(Error::InvalidOffsetMap("need at least a data block and the final block"));
        }
        let mut map = BTreeMap::new();
        let mut last: Option<(u64, u64)> = None;
        for &(bit, decoded) in pairs {
            if let Some((prev_bit, prev_decoded)) = last {
                if bit <= prev_bit {
                    return Err(Error::InvalidOffsetMap("bit offsets must be strictly increasing"));
                }
                if decoded < prev_decoded {
                    return Err(Error::InvalidOffsetMap("decoded offsets must not decrease"));
                }
            }
            map.insert(bit, decoded);
            last = Some((bit, decoded));
        }
        Ok(Self { map, complete: true })
    }

    /// Export as pairs sorted by bit offset (the decoded axis sorts identically).
    pub fn to_pairs(&self) -> Vec<(u64, u64)> {
        self.map.iter().map(|(&k, &v)| (k, v)).collect()
    }

    pub(crate) fn record(&mut self, bit_offset: u64, decoded_offset: u64) {
        debug_assert!(!self.complete);
        self.map.insert(bit_offset, decoded_offset);
    }

    pub(crate) fn mark_complete(&mut self) {
        self.complete = true;
    }

    /// True once the final end-of-stream block has been observed (or an
    /// exported map was installed).
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Total decoded size. Only meaningful on a complete map, where the last
    /// entry is the end-of-stream block.
    pub fn total_size(&self) -> Option<u64> {
        if self.complete {
            self.map.values().next_back().copied()
        } else {
            None
        }
    }

    /// Find the block whose decoded range contains `target`: the last entry,
    /// in bit-offset order, whose decoded offset does not exceed it.
    ///
    /// An end-of-stream entry can never win for `target < total_size()`: an
    /// intermediate one is always followed by the next stream's first data
    /// block at the same decoded offset, and the final one sits at the total
    /// size itself.
    pub(crate) fn block_for(&self, target: u64) -> Option<(u64, u64)> {
        self.map
            .iter()
            .rev()
            .find(|&(_, &decoded)| decoded <= target)
            .map(|(&bit, &decoded)| (bit, decoded))
    }
}
