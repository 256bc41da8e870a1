//! Seekable decoding of bzip2 containers.
//!
//! - Streams decoded bytes with bounded memory: each `read` call decodes at
//!   most what was asked for and checkpoints in the middle of a block.
//! - Seeks to arbitrary positions in the decoded stream once the map of block
//!   boundaries is known, either from a first full decode or from a map
//!   exported earlier and installed with `set_block_offsets`.
//! - Verifies the per-block CRC32 of everything it emits and the per-stream
//!   fold carried by the end-of-stream block.
//!
//! Decompression undoes the bzip2 pipeline stage by stage: canonical Huffman
//! coding (tables switching every 50 symbols), run-length coded move-to-front
//! indices, the Burrows-Wheeler transform, and a final byte-level run-length
//! layer.
//!
//! Reading a file front to back:
//!
//! ```no_run
//! use std::io::Read;
//!
//! let mut reader = seekbz2::Bz2Reader::open("archive.tar.bz2")?;
//! let mut decoded = Vec::new();
//! reader.read_to_end(&mut decoded)?;
//! # Ok::<(), std::io::Error>(())
//! ```
//!
//! Random access with a saved offset map:
//!
//! ```no_run
//! use std::io::{Read, SeekFrom};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut reader = seekbz2::Bz2Reader::open("archive.tar.bz2")?;
//! let offsets = reader.block_offsets()?.clone();
//!
//! let mut reader = seekbz2::Bz2Reader::open("archive.tar.bz2")?;
//! reader.set_block_offsets(offsets)?;
//! reader.seek(SeekFrom::Start(1 << 20))?;
//! let mut buf = [0u8; 512];
//! reader.read_exact(&mut buf)?;
//! # Ok(())
//! # }
//! ```
#![warn(rust_2018_idioms)]

pub mod bitstream;
pub mod decompression;
pub mod errors;
pub mod huffman_coding;
pub mod scanner;
pub mod tools;

pub use decompression::{BlockOffsets, Bz2Reader, Sink};
pub use errors::{Error, Result};
pub use scanner::{Marker, MarkerKind, Scanner};
