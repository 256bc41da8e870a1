//! Error types surfaced while decoding bzip2 streams.

use std::fmt;
use std::io;

/// Decoding errors. None of these are recovered internally; a reader that
/// has returned one is poisoned and refuses further work.
#[derive(Debug)]
pub enum Error {
    /// The stream header is not `BZh1`..`BZh9`, or a block magic is neither
    /// the data-block nor the end-of-stream constant.
    InvalidMagic(u64),
    /// The deprecated randomized-block flag is set.
    UnsupportedFeature(&'static str),
    /// A structurally invalid block header field.
    MalformedHeader(&'static str),
    /// The Huffman/MTF/run-length symbol stream is inconsistent.
    MalformedData(&'static str),
    /// A block or stream CRC32 did not match the value carried in the header.
    CrcMismatch { found: u32, expected: u32 },
    /// An offset map handed to `set_block_offsets` failed validation.
    InvalidOffsetMap(&'static str),
    /// The compressed source ran out mid-field.
    UnexpectedEof,
    /// The reader already surfaced an error and may not be reused.
    Poisoned,
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidMagic(found) => write!(f, "invalid bzip2 magic {:#x}", found),
            Self::UnsupportedFeature(what) => write!(f, "unsupported feature: {}", what),
            Self::MalformedHeader(what) => write!(f, "malformed block header: {}", what),
            Self::MalformedData(what) => write!(f, "malformed block data: {}", what),
            Self::CrcMismatch { found, expected } => {
                write!(f, "CRC mismatch: calculated {:#010x}, header says {:#010x}", found, expected)
            }
            Self::InvalidOffsetMap(what) => write!(f, "invalid block offset map: {}", what),
            Self::UnexpectedEof => write!(f, "unexpected end of compressed data"),
            Self::Poisoned => write!(f, "reader is poisoned by an earlier error"),
            Self::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(inner) => inner,
            Error::UnexpectedEof => {
                io::Error::new(io::ErrorKind::UnexpectedEof, "unexpected end of compressed data")
            }
            other => io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
