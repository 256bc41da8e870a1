//! Canonical Huffman tables for the bzip2 symbol stream.
//!
//! bzip2 never transmits Huffman codes, only code lengths; the codes are
//! reconstructed canonically with symbols ordered by ascending length and ties
//! broken by symbol index. A block carries between two and six tables and
//! switches between them every 50 symbols, which buys a noticeably better fit
//! than one table per block.

pub mod huffman;

pub use huffman::HuffmanTable;
