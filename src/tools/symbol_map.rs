//! Decode the sparse symbol map found in every bzip2 block header.
//!
//! A symbol map records which byte values occur in the block. The 256 possible
//! bytes are split into 16 ranges of 16. A leading u16 has one bit per range;
//! for each set bit a further u16 follows with one bit per byte in that range.
//! Ranges with no bytes present are simply absent from the stream.
//!
//! For example, if the first bit of the leading word is zero, none of the bytes
//! 0-15 occurred in the block and no bitmap was written for them.

use std::io::{Read, Seek};

use crate::bitstream::BitReader;
use crate::errors::Result;

const BIT_MASK: u16 = 0x8000;

/// Read the symbol map and return the byte values present, in ascending order.
pub fn decode_sym_map<R: Read + Seek>(br: &mut BitReader<R>) -> Result<Vec<u8>> {
    let ranges = br.read(16)? as u16;
    let mut symbols: Vec<u8> = Vec::with_capacity(256);

    for range in 0..16_u16 {
        // Is there a bitmap for this block of 16 byte values?
        if ranges & (BIT_MASK >> range) > 0 {
            let bitmap = br.read(16)? as u16;
            for bit in 0..16_u16 {
                if bitmap & (BIT_MASK >> bit) > 0 {
                    // range * 16 + bit is the byte value this bit stands for
                    symbols.push(((range << 4) + bit) as u8);
                }
            }
        }
    }
    Ok(symbols)
}

#[cfg(test)]
mod test {
    use super::decode_sym_map;
    use crate::bitstream::BitReader;
    use std::io::Cursor;

    fn reader_from_words(words: &[u16]) -> BitReader<Cursor<Vec<u8>>> {
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        BitReader::new(Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn decode_symbol_map() {
        let mut br = reader_from_words(&[11008, 32770, 4, 17754, 6208]);
        let mut compare = "Making a silly test.".as_bytes().to_vec();
        compare.sort_unstable();
        compare.dedup();
        assert_eq!(compare, decode_sym_map(&mut br).unwrap());
    }

    #[test]
    fn decode_symbol_map_full() {
        let mut br = reader_from_words(&[0xFFFF; 17]);
        let compare = (0..=255).collect::<Vec<u8>>();
        assert_eq!(compare, decode_sym_map(&mut br).unwrap());
    }
}
