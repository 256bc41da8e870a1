//! The bitstream module forms the input subsystem for the seekable bzip2 decoder.
//!
//! Nothing in a bzip2 container is byte-aligned except the stream header and the
//! padding after the end-of-stream block, so every other layer of the decoder
//! consumes bits rather than bytes. The reader in this module tracks its position
//! with bit granularity so block starts can be recorded and revisited later.

pub mod bitreader;

pub use bitreader::BitReader;
