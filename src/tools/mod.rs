//! Helper pieces shared by the decoder stages.
//!
//! - crc: the bzip2 CRC32 flavor, both block and stream versions.
//! - symbol_map: decode the sparse symbol bitmap carried in each block header.

pub mod crc;
pub mod symbol_map;
