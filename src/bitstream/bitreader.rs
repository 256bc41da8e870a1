use std::io::{Read, Seek, SeekFrom};

use crate::errors::{Error, Result};

/// Refill granularity for the byte buffer between the source and the shift register.
const BUFFER_SIZE: usize = 4096;

/// Reads a bzip2 container MSB-first and allows fetching 1-32 bits at a time.
///
/// Works over any seekable byte source; plain files and `io::Cursor` both qualify.
/// Bytes are pulled through a small buffer into a 32-bit shift register, and bits
/// leave the register from the high end. Reading 3 bits of `1011 1001` yields
/// `101`, not `001`.
#[derive(Debug)]
pub struct BitReader<R> {
    source: R,
    buffer: Vec<u8>,
    buf_pos: usize,
    /// Total bytes pulled from the source so far, buffered or consumed.
    bytes_read: u64,
    /// Most recently read but not yet emitted bits, right-aligned.
    register: u32,
    /// Number of valid bits in the register.
    register_bits: u32,
    size_bits: u64,
}

impl<R: Read + Seek> BitReader<R> {
    /// Wrap a byte source. The total size is measured once so that `eof` and
    /// `size_bits` are exact from the start.
    pub fn new(mut source: R) -> Result<Self> {
        let bytes = source.seek(SeekFrom::End(0))?;
        source.seek(SeekFrom::Start(0))?;
        Ok(Self {
            source,
            buffer: Vec::new(),
            buf_pos: 0,
            bytes_read: 0,
            register: 0,
            register_bits: 0,
            size_bits: bytes * 8,
        })
    }

    /// Return the next `n` bits (1..=32) with the first bit read landing in bit
    /// position `n-1` of the result.
    pub fn read(&mut self, n: usize) -> Result<u32> {
        debug_assert!(n <= 32);
        let mut bits: u32 = 0;
        let mut needed = n as u32;

        while self.register_bits < needed {
            if self.buf_pos == self.buffer.len() {
                self.refill()?;
            }

            // The register tops out at 31 bits, so a 32-bit request can never be
            // satisfied by appending alone. Drain what is already there into the
            // high end of the result first.
            if self.register_bits >= 24 {
                bits = self.register & ((1 << self.register_bits) - 1);
                needed -= self.register_bits;
                bits <<= needed;
                self.register_bits = 0;
            }

            self.register = (self.register << 8) | u32::from(self.buffer[self.buf_pos]);
            self.buf_pos += 1;
            self.register_bits += 8;
        }

        self.register_bits -= needed;
        bits |= (self.register >> self.register_bits) & (((1u64 << needed) - 1) as u32);
        Ok(bits)
    }

    /// Read a single bit as a flag.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read(1)? == 1)
    }

    fn refill(&mut self) -> Result<()> {
        self.buffer.resize(BUFFER_SIZE, 0);
        let n = self.source.read(&mut self.buffer)?;
        if n == 0 {
            return Err(Error::UnexpectedEof);
        }
        self.buffer.truncate(n);
        self.buf_pos = 0;
        self.bytes_read += n as u64;
        Ok(())
    }

    /// Absolute bit position of the next bit to be read.
    pub fn tell(&self) -> u64 {
        (self.bytes_read - (self.buffer.len() - self.buf_pos) as u64) * 8
            - u64::from(self.register_bits)
    }

    /// Reposition to an arbitrary bit offset, discarding all buffered state.
    pub fn seek_bits(&mut self, offset: u64) -> Result<()> {
        self.buffer.clear();
        self.buf_pos = 0;
        self.register = 0;
        self.register_bits = 0;

        self.source.seek(SeekFrom::Start(offset / 8))?;
        self.bytes_read = offset / 8;

        let sub_bits = (offset % 8) as u32;
        if sub_bits > 0 {
            let mut byte = [0u8; 1];
            if self.source.read(&mut byte)? == 0 {
                return Err(Error::UnexpectedEof);
            }
            self.bytes_read += 1;
            self.register = u32::from(byte[0]);
            self.register_bits = 8 - sub_bits;
        }
        Ok(())
    }

    /// Total bits available in the source.
    pub fn size_bits(&self) -> u64 {
        self.size_bits
    }

    pub fn eof(&self) -> bool {
        self.tell() >= self.size_bits
    }

    /// Consume the zero padding up to the next byte boundary. The end-of-stream
    /// block is the only place the format requires this.
    pub fn align_to_byte(&mut self) -> Result<()> {
        let sub_bits = (self.tell() % 8) as usize;
        if sub_bits > 0 {
            self.read(8 - sub_bits)?;
        }
        Ok(())
    }
}
