//! The bzip2 flavor of CRC32.
//!
//! bzip2 folds each byte into the *high* byte of the accumulator (polynomial
//! 0x04C11DB7, no reflection), which is the opposite of the zlib/PNG variant.
//! Each block carries a CRC of its decoded bytes, and the end-of-stream block
//! carries a running fold of the block CRCs.

/// Per-block accumulator start value. The finished CRC is the complement.
pub const CRC_START: u32 = 0xFFFF_FFFF;

const POLYNOMIAL: u32 = 0x04C1_1DB7;

/// Build the 256-entry lookup table. The little-endian (reflected) variant is
/// available for callers that want it, but the wire format always uses the
/// big-endian table.
pub const fn crc32_table(little_endian: bool) -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut c = if little_endian { i as u32 } else { (i as u32) << 24 };
        let mut j = 0;
        while j < 8 {
            c = if little_endian {
                if c & 1 != 0 {
                    (c >> 1) ^ 0xEDB8_8320
                } else {
                    c >> 1
                }
            } else if c & 0x8000_0000 != 0 {
                (c << 1) ^ POLYNOMIAL
            } else {
                c << 1
            };
            j += 1;
        }
        table[i] = c;
        i += 1;
    }
    table
}

pub(crate) const CRC32_TABLE: [u32; 256] = crc32_table(false);

/// Fold one decoded byte into a block CRC accumulator.
#[inline]
pub fn update_crc(crc: u32, byte: u8) -> u32 {
    (crc << 8) ^ CRC32_TABLE[(((crc >> 24) ^ u32::from(byte)) & 0xFF) as usize]
}

/// Fold a finished block CRC into the running stream CRC.
#[inline]
pub fn fold_stream_crc(stream_crc: u32, block_crc: u32) -> u32 {
    stream_crc.rotate_left(1) ^ block_crc
}
