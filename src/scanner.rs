//! Locate block boundaries without decoding.
//!
//! The 48-bit block and end-of-stream magics can sit at any bit offset, so a
//! plain byte search cannot find them. The scanner instead searches for eight
//! shifted variants of each magic with one Aho-Corasick automaton, then
//! verifies every candidate by extracting the full 48-bit value at the implied
//! bit position. Parallel bzip2 variants use exactly this trick to split work,
//! and it doubles as a recovery aid for containers with damaged blocks.

use aho_corasick::AhoCorasick;
use rayon::prelude::*;

use crate::decompression::{BLOCK_MAGIC, EOS_MAGIC};

/// Chunk granularity for the parallel sweep.
const CHUNK_SIZE: usize = 1024 * 1024;
/// Bytes of overlap so markers spanning a chunk boundary are not missed.
const CHUNK_OVERLAP: usize = 8;

/// What kind of marker was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    /// Data block start.
    Block,
    /// End-of-stream block start.
    Eos,
}

/// A verified 48-bit magic found in the raw compressed bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    /// Bit offset of the first magic bit.
    pub bit_offset: u64,
    pub kind: MarkerKind,
}

/// Reusable scanner holding the prebuilt search automaton.
pub struct Scanner {
    ac: AhoCorasick,
    /// Per pattern: the magic it belongs to, its kind, and its bit shift.
    patterns: Vec<(u64, MarkerKind, u64)>,
}

impl Scanner {
    /// Build the sixteen search patterns: each magic shifted right by 0..=7
    /// bits, keyed on four fully-determined middle bytes.
    pub fn new() -> Self {
        let mut keys = Vec::with_capacity(16);
        let mut patterns = Vec::with_capacity(16);
        for (magic, kind) in [(BLOCK_MAGIC, MarkerKind::Block), (EOS_MAGIC, MarkerKind::Eos)] {
            // Left-align above 16 spare bits so a right shift keeps all magic
            // bits inside the eight-byte window.
            let top = magic << 16;
            for shift in 0..8_u64 {
                let bytes = (top >> shift).to_be_bytes();
                keys.push(bytes[1..5].to_vec());
                patterns.push((magic, kind, shift));
            }
        }
        // The pattern set is fixed and tiny, so construction cannot fail.
        let ac = AhoCorasick::new(&keys).expect("automaton over 16 fixed patterns");
        Self { ac, patterns }
    }

    /// Scan a byte slice sequentially. Returned markers are sorted by bit
    /// offset.
    pub fn scan(&self, data: &[u8]) -> Vec<Marker> {
        let mut markers = self.scan_region(data, 0, data.len());
        markers.sort_by_key(|m| m.bit_offset);
        markers
    }

    /// Scan in parallel over 1 MiB chunks. Equivalent to [`Scanner::scan`].
    pub fn scan_parallel(&self, data: &[u8]) -> Vec<Marker> {
        let chunks = data.len().div_ceil(CHUNK_SIZE).max(1);
        let mut markers: Vec<Marker> = (0..chunks)
            .into_par_iter()
            .flat_map_iter(|i| {
                let start = i * CHUNK_SIZE;
                let end = ((i + 1) * CHUNK_SIZE).min(data.len());
                let scan_end = (end + CHUNK_OVERLAP).min(data.len());
                self.scan_region(&data[..scan_end], start, end)
            })
            .collect();
        markers.sort_by_key(|m| m.bit_offset);
        markers.dedup();
        markers
    }

    /// Find verified markers whose magic starts in `data[region_start..region_end]`.
    /// The slice may extend past `region_end` to let boundary matches verify.
    fn scan_region(&self, data: &[u8], region_start: usize, region_end: usize) -> Vec<Marker> {
        let mut found = Vec::new();
        for mat in self.ac.find_overlapping_iter(&data[region_start..]) {
            let key_pos = region_start + mat.start();
            // The key is preceded by one byte of the magic, so a match at the
            // very start of the data cannot be a real marker.
            if key_pos == 0 {
                continue;
            }
            let magic_byte = key_pos - 1;
            if magic_byte >= region_end {
                continue;
            }
            let (magic, kind, shift) = self.patterns[mat.pattern().as_usize()];
            let bit_offset = magic_byte as u64 * 8 + shift;
            if extract_48(data, bit_offset) == Some(magic) {
                found.push(Marker { bit_offset, kind });
            }
        }
        found
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Read 48 bits starting at an arbitrary bit offset, or None past the end.
fn extract_48(data: &[u8], bit_offset: u64) -> Option<u64> {
    if bit_offset + 48 > data.len() as u64 * 8 {
        return None;
    }
    let byte = (bit_offset / 8) as usize;
    let shift = bit_offset % 8;
    let mut window = 0_u64;
    for &b in &data[byte..byte + 7.min(data.len() - byte)] {
        window = (window << 8) | u64::from(b);
    }
    let have = 8 * 7.min(data.len() - byte) as u64;
    Some((window >> (have - shift - 48)) & 0xFFFF_FFFF_FFFF)
}

#[cfg(test)]
mod test {
    use super::*;

    /// A tiny container: `BZh9`, one data block, the end-of-stream block.
    const HELLO: &[u8] = include_bytes!("../tests/fixtures/hello.bz2");

    #[test]
    fn finds_block_and_eos() {
        let markers = Scanner::new().scan(HELLO);
        assert_eq!(
            markers,
            vec![
                Marker { bit_offset: 32, kind: MarkerKind::Block },
                Marker { bit_offset: 377, kind: MarkerKind::Eos },
            ]
        );
    }

    #[test]
    fn parallel_matches_sequential() {
        let scanner = Scanner::new();
        // Repeat the sample so several chunks get markers.
        let mut data = Vec::new();
        for _ in 0..5 {
            data.extend_from_slice(HELLO);
        }
        assert_eq!(scanner.scan_parallel(&data), scanner.scan(&data));
    }

    #[test]
    fn no_false_positives_in_noise() {
        let noise: Vec<u8> = (0..4096_u32).map(|i| (i.wrapping_mul(2654435761) >> 24) as u8).collect();
        assert!(Scanner::new().scan(&noise).is_empty());
    }
}
