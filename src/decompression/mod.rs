//! The decompression module is the heart of the crate.
//!
//! Decoding a bzip2 data block runs through four stages:
//! - Huffman decoding, switching tables every 50 symbols per the selector list.
//! - RLE2: expand RUNA/RUNB pairs into runs of the move-to-front zero symbol.
//! - MTF: map move-to-front indices back to byte values.
//! - BWT reversal plus RLE1: walk the successor chain in original order and
//!   expand runs of four-plus identical bytes by their trailing repeat count.
//!
//! The first three stages happen while a block is parsed; the last is resumable
//! and produces bytes on demand, which is what makes bounded reads and seeking
//! possible. [`reader::Bz2Reader`] drives the stages across blocks and streams
//! and keeps the map of block boundaries as it goes.

pub mod block;
pub mod offsets;
pub mod reader;

pub use offsets::BlockOffsets;
pub use reader::{Bz2Reader, Sink};

/// Leading magic of every data block, the binary-coded decimals of pi.
pub(crate) const BLOCK_MAGIC: u64 = 0x3141_5926_5359;
/// Leading magic of the end-of-stream block, the BCD of sqrt(pi).
pub(crate) const EOS_MAGIC: u64 = 0x1772_4538_5090;

/// Symbols per Huffman table selection.
pub(crate) const GROUP_SIZE: usize = 50;
/// Most Huffman coding tables a block may carry.
pub(crate) const MAX_GROUPS: usize = 6;
/// A stream's block size is its header digit times this many bytes.
pub(crate) const BASE_BLOCK_SIZE: usize = 100_000;
/// Pre-RLE capacity of the largest legal block (`BZh9`).
pub(crate) const MAX_DBUF_ENTRIES: usize = 9 * BASE_BLOCK_SIZE;
