//! One compressed block: header, symbol stream, and resumable byte output.
//!
//! [`BlockHeader::read`] parses everything up to the Huffman coding tables.
//! [`Block::decode`] then runs the symbol pass (Huffman + MTF + RUNA/RUNB
//! expansion) to fill the intermediate buffer `dbuf` and rewires it into the
//! Burrows-Wheeler successor chain. After that the block hands out decoded
//! bytes through [`Block::emit`], any number at a time, carrying its run state
//! across calls so a caller budget can land in the middle of anything.

use log::trace;
use std::io::{Read, Seek};

use super::{BLOCK_MAGIC, EOS_MAGIC, GROUP_SIZE, MAX_GROUPS};
use crate::bitstream::BitReader;
use crate::errors::{Error, Result};
use crate::huffman_coding::huffman::{HuffmanTable, MAX_CODE_LEN};
use crate::tools::crc::{update_crc, CRC_START};
use crate::tools::symbol_map::decode_sym_map;

/// Outcome of parsing the 48-bit magic at a block boundary.
pub(crate) enum HeaderParse {
    Data(BlockHeader),
    /// End-of-stream block; carries the whole stream's folded CRC.
    EndOfStream { stream_crc: u32 },
}

/// Everything the symbol pass needs, parsed from a data block header.
pub(crate) struct BlockHeader {
    header_crc: u32,
    orig_ptr: u32,
    /// Translation from MTF symbol values back to the bytes they stand for.
    symbol_to_byte: Vec<u8>,
    /// Which Huffman table decodes each run of 50 symbols.
    selectors: Vec<u8>,
    tables: Vec<HuffmanTable>,
}

impl BlockHeader {
    /// Parse a block header off the bit stream.
    ///
    /// Layout: 48-bit magic, 32-bit expected CRC, then for data blocks the
    /// randomized flag (rejected when set), the 24-bit BWT origin pointer, the
    /// sparse symbol map, the table count, the MTF+unary coded selector list,
    /// and one delta-coded length vector per table.
    pub fn read<R: Read + Seek>(br: &mut BitReader<R>, dbuf_cap: usize) -> Result<HeaderParse> {
        let magic = (u64::from(br.read(24)?) << 24) | u64::from(br.read(24)?);
        let header_crc = br.read(32)?;

        if magic == EOS_MAGIC {
            return Ok(HeaderParse::EndOfStream { stream_crc: header_crc });
        }
        if magic != BLOCK_MAGIC {
            return Err(Error::InvalidMagic(magic));
        }

        if br.read_bool()? {
            return Err(Error::UnsupportedFeature("deprecated randomized-block flag"));
        }

        let orig_ptr = br.read(24)?;
        if orig_ptr as usize >= dbuf_cap {
            return Err(Error::MalformedHeader("origin pointer beyond block capacity"));
        }

        let symbol_to_byte = decode_sym_map(br)?;
        let symbol_count = symbol_to_byte.len();
        if symbol_count == 0 {
            return Err(Error::MalformedHeader("empty symbol map"));
        }

        let group_count = br.read(3)? as usize;
        if !(2..=MAX_GROUPS).contains(&group_count) {
            return Err(Error::MalformedHeader("Huffman group count out of range"));
        }

        let selectors_used = br.read(15)? as usize;
        if selectors_used == 0 {
            return Err(Error::MalformedHeader("zero selectors"));
        }

        // Selector indices arrive unary coded and MTF transformed against the
        // list of table indices.
        let mut table_order: Vec<u8> = (0..group_count as u8).collect();
        let mut selectors = Vec::with_capacity(selectors_used);
        for _ in 0..selectors_used {
            let mut j = 0;
            while br.read_bool()? {
                j += 1;
                if j >= group_count {
                    return Err(Error::MalformedHeader("selector unary run exceeds group count"));
                }
            }
            let table = table_order.remove(j);
            table_order.insert(0, table);
            selectors.push(table);
        }
        trace!("decoded {} selectors for {} coding tables", selectors_used, group_count);

        // Each table codes the literal symbols plus RUNA, RUNB and the block
        // terminator. Lengths are deltas from a 5-bit starting value: a 0 bit
        // emits the current length, `10` increments it, `11` decrements it.
        let coded_symbols = symbol_count + 2;
        let mut tables = Vec::with_capacity(group_count);
        for _ in 0..group_count {
            let mut lengths = vec![0_u8; coded_symbols];
            let mut len = br.read(5)? as i32;
            for length in lengths.iter_mut() {
                loop {
                    if !(1..=MAX_CODE_LEN as i32).contains(&len) {
                        return Err(Error::MalformedHeader("Huffman code length out of range"));
                    }
                    if !br.read_bool()? {
                        break;
                    }
                    if br.read_bool()? {
                        len -= 1;
                    } else {
                        len += 1;
                    }
                }
                *length = len as u8;
            }
            tables.push(HuffmanTable::from_lengths(&lengths));
        }

        Ok(HeaderParse::Data(BlockHeader {
            header_crc,
            orig_ptr,
            symbol_to_byte,
            selectors,
            tables,
        }))
    }
}

/// A fully decoded block, ready to stream its bytes out.
///
/// `dbuf` holds one u32 per pre-RLE symbol. The symbol pass leaves the byte
/// value in the low 8 bits; the BWT preparation packs the successor index into
/// the upper 24, so each entry reads `(next << 8) | byte`. Walking the chain
/// from the origin pointer yields the block's bytes in original order.
pub(crate) struct Block {
    header_crc: u32,
    dbuf: Vec<u32>,
    /// Chain position of the next entry to consume.
    write_pos: u32,
    /// Pre-RLE entries still to consume.
    write_count: u32,
    /// Last emitted byte, or -1 when a repeat run just ended and must not chain.
    write_current: i16,
    /// How many consecutive copies of `write_current` have been emitted.
    write_run: u8,
    /// Copies still owed from an expanded repeat count.
    repeat_left: u8,
    data_crc: u32,
}

impl Block {
    /// Run the symbol pass and the BWT preparation.
    pub fn decode<R: Read + Seek>(
        header: BlockHeader,
        br: &mut BitReader<R>,
        dbuf_cap: usize,
    ) -> Result<Self> {
        let BlockHeader { header_crc, orig_ptr, symbol_to_byte, selectors, tables } = header;

        let symbol_count = symbol_to_byte.len();
        let terminator = (symbol_count + 1) as u16;

        let mut dbuf: Vec<u32> = Vec::with_capacity(dbuf_cap);
        let mut byte_count = [0_u32; 256];

        // MTF state over the symbol alphabet. Literal symbol k means "the byte
        // currently at position k-1", which then moves to the front.
        let mut mtf: Vec<u8> = (0..symbol_count as u8).collect();

        let mut table = &tables[selectors[0] as usize];
        let mut group_pos = 0;
        let mut selector = 0_usize;

        // RUNA/RUNB accumulate a binary-weighted run length: RUNA adds the
        // current weight, RUNB twice that, and the weight doubles each symbol.
        let mut run_weight: u64 = 0;
        let mut run_len: u64 = 0;

        loop {
            if group_pos == 0 {
                if selector >= selectors.len() {
                    return Err(Error::MalformedData("selector list exhausted"));
                }
                table = &tables[selectors[selector] as usize];
                selector += 1;
                group_pos = GROUP_SIZE;
            }
            group_pos -= 1;

            let sym = table.decode_symbol(br)?;

            if sym <= 1 {
                if run_weight == 0 {
                    run_weight = 1;
                    run_len = 0;
                }
                run_len += run_weight << sym;
                run_weight <<= 1;
                if run_len > dbuf_cap as u64 {
                    return Err(Error::MalformedData("run longer than block capacity"));
                }
                continue;
            }

            // First non-run symbol: materialise the pending run as copies of
            // whatever byte currently heads the MTF table.
            if run_weight > 0 {
                run_weight = 0;
                if dbuf.len() + run_len as usize > dbuf_cap {
                    return Err(Error::MalformedData("block overruns its capacity"));
                }
                let byte = symbol_to_byte[mtf[0] as usize];
                byte_count[byte as usize] += run_len as u32;
                for _ in 0..run_len {
                    dbuf.push(u32::from(byte));
                }
            }

            if sym == terminator {
                break;
            }

            if dbuf.len() >= dbuf_cap {
                return Err(Error::MalformedData("block overruns its capacity"));
            }

            // A literal: pull the byte out of the MTF table and move it to the
            // front. Shifting forward in chunks beats a rotate for the short
            // distances that dominate real data.
            let mut k = sym as usize - 1;
            let byte = if k < 16 {
                let front = mtf[k];
                while k > 3 {
                    mtf[k] = mtf[k - 1];
                    mtf[k - 1] = mtf[k - 2];
                    mtf[k - 2] = mtf[k - 3];
                    mtf[k - 3] = mtf[k - 4];
                    k -= 4;
                }
                while k > 0 {
                    mtf[k] = mtf[k - 1];
                    k -= 1;
                }
                mtf[0] = front;
                front
            } else {
                let front = mtf.remove(k);
                mtf.insert(0, front);
                front
            };

            let byte = symbol_to_byte[byte as usize];
            byte_count[byte as usize] += 1;
            dbuf.push(u32::from(byte));
        }

        if orig_ptr as usize >= dbuf.len() {
            return Err(Error::MalformedData("origin pointer beyond block length"));
        }
        trace!("symbol pass produced {} pre-RLE bytes", dbuf.len());

        let mut block = Block {
            header_crc,
            dbuf,
            write_pos: 0,
            write_count: 0,
            write_current: -1,
            write_run: 0,
            repeat_left: 0,
            data_crc: CRC_START,
        };
        block.invert_bwt(orig_ptr, &mut byte_count);
        Ok(block)
    }

    /// Rewire `dbuf` into the successor chain that undoes the Burrows-Wheeler
    /// transform.
    ///
    /// The occurrence counts become an exclusive prefix sum, which is exactly
    /// the order `dbuf` would have if it were sorted; each entry then gets the
    /// index of its successor packed above its byte. The entry at the origin
    /// pointer starts the chain, and its own byte is never part of the output.
    fn invert_bwt(&mut self, orig_ptr: u32, byte_count: &mut [u32; 256]) {
        let mut sum = 0_u32;
        for count in byte_count.iter_mut() {
            let next = sum + *count;
            *count = sum;
            sum = next;
        }

        for i in 0..self.dbuf.len() {
            let byte = (self.dbuf[i] & 0xFF) as usize;
            self.dbuf[byte_count[byte] as usize] |= (i as u32) << 8;
            byte_count[byte] += 1;
        }

        self.write_pos = self.dbuf[orig_ptr as usize] >> 8;
        self.write_count = self.dbuf.len() as u32;
        self.write_current = -1;
        self.write_run = 0;
        self.repeat_left = 0;
        self.data_crc = CRC_START;
    }

    /// Emit decoded bytes into `out`, stopping at its end or the block's.
    /// Returns how many bytes were written. Every byte is folded into the
    /// block CRC as it leaves.
    ///
    /// The chain bytes still carry the encoder's first-stage run-length
    /// encoding: after four identical bytes the next chain entry is not a byte
    /// but a repeat count of 0..=255 further copies. A run cannot chain into
    /// the bytes after it, so the "last byte" memory is cleared once a run is
    /// paid out.
    pub fn emit(&mut self, out: &mut [u8]) -> usize {
        let mut n = 0;
        while n < out.len() && !self.is_done() {
            if self.repeat_left > 0 {
                let byte = self.write_current as u8;
                out[n] = byte;
                n += 1;
                self.data_crc = update_crc(self.data_crc, byte);
                self.repeat_left -= 1;
                if self.repeat_left == 0 {
                    self.write_current = -1;
                }
                continue;
            }

            let entry = self.dbuf[self.write_pos as usize];
            let byte = (entry & 0xFF) as u8;
            self.write_pos = entry >> 8;
            self.write_count -= 1;

            if self.write_run == 3 {
                // Fourth identical byte seen: this entry is a repeat count.
                self.repeat_left = byte;
                self.write_run = 0;
                if self.repeat_left == 0 {
                    self.write_current = -1;
                }
                continue;
            }

            if i16::from(byte) == self.write_current {
                self.write_run += 1;
            } else {
                self.write_run = 0;
            }
            self.write_current = i16::from(byte);

            out[n] = byte;
            n += 1;
            self.data_crc = update_crc(self.data_crc, byte);
        }
        n
    }

    pub fn is_done(&self) -> bool {
        self.write_count == 0 && self.repeat_left == 0
    }

    /// The finished CRC of the block's decoded bytes. Only valid once
    /// [`Block::is_done`] returns true.
    pub fn crc(&self) -> u32 {
        !self.data_crc
    }

    pub fn header_crc(&self) -> u32 {
        self.header_crc
    }
}
