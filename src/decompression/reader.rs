//! The seekable decoder facade.
//!
//! [`Bz2Reader`] drives block decoding across a whole container, including
//! concatenated streams as produced by parallel compressors. It hands out
//! decoded bytes under a caller budget, records every block boundary in a
//! [`BlockOffsets`] map, and can jump to an arbitrary decoded offset once that
//! map is known, either by decoding once to the end or by installing a map
//! exported earlier.

use log::{info, trace};
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;

use super::block::{Block, BlockHeader, HeaderParse};
use super::offsets::BlockOffsets;
use super::{BASE_BLOCK_SIZE, MAX_DBUF_ENTRIES};
use crate::bitstream::BitReader;
use crate::errors::{Error, Result};
use crate::tools::crc::fold_stream_crc;

/// Decoded bytes leave the reader through chunks of this size.
const OUT_BUF_SIZE: usize = 4096;

/// Where decoded bytes go.
///
/// A sink can carry a caller buffer, a byte stream, both, or neither. With
/// both, bytes fill the buffer until its capacity is exhausted and then go to
/// the stream. With neither, bytes are counted and dropped, which is how the
/// reader itself skips data while seeking. A buffer-only sink also drops what
/// exceeds its capacity, so pass a read budget no larger than the buffer. The
/// reader never closes the stream.
#[derive(Default)]
pub struct Sink<'a> {
    buffer: Option<&'a mut [u8]>,
    filled: usize,
    writer: Option<&'a mut dyn Write>,
}

impl<'a> Sink<'a> {
    /// Count and drop everything.
    pub fn discard() -> Sink<'static> {
        Sink::default()
    }

    pub fn buffer(buf: &'a mut [u8]) -> Self {
        Sink { buffer: Some(buf), filled: 0, writer: None }
    }

    pub fn writer(w: &'a mut dyn Write) -> Self {
        Sink { buffer: None, filled: 0, writer: Some(w) }
    }

    pub fn buffer_and_writer(buf: &'a mut [u8], w: &'a mut dyn Write) -> Self {
        Sink { buffer: Some(buf), filled: 0, writer: Some(w) }
    }

    /// Bytes copied into the buffer so far.
    pub fn bytes_buffered(&self) -> usize {
        self.filled
    }

    fn push(&mut self, mut bytes: &[u8]) -> Result<()> {
        if let Some(buf) = self.buffer.as_deref_mut() {
            let room = buf.len() - self.filled;
            let take = room.min(bytes.len());
            buf[self.filled..self.filled + take].copy_from_slice(&bytes[..take]);
            self.filled += take;
            bytes = &bytes[take..];
        }
        if let Some(w) = self.writer.as_deref_mut() {
            w.write_all(bytes)?;
        }
        Ok(())
    }
}

/// Streaming, seekable bzip2 decoder over any `Read + Seek` source.
///
/// Reading is cooperative: each call decodes at most the requested number of
/// bytes and checkpoints mid-block when the budget runs out, so a sequence of
/// bounded reads produces byte-for-byte the same output as one unbounded one.
pub struct Bz2Reader<R> {
    bitreader: BitReader<R>,
    block: Option<Block>,
    block_index: u64,
    block_size100k: u8,
    /// Running fold of finished block CRCs for the current stream.
    total_crc: u32,
    /// CRC carried by the most recently parsed end-of-stream block.
    stream_crc: u32,
    /// Cleared by `seek`: a fold over skipped blocks cannot be verified.
    check_stream_crc: bool,
    /// Current position in the decoded byte stream.
    bytes_decoded: u64,
    offsets: BlockOffsets,
    finished: bool,
    poisoned: bool,
    allow_trailing_garbage: bool,
}

impl Bz2Reader<File> {
    /// Open a bzip2 file from a path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(File::open(path)?)
    }
}

impl Bz2Reader<Cursor<Vec<u8>>> {
    /// Decode from an owned in-memory buffer.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::new(Cursor::new(data))
    }
}

impl<R: Read + Seek> Bz2Reader<R> {
    /// Wrap a compressed source and parse the `BZh` stream header.
    pub fn new(source: R) -> Result<Self> {
        let mut reader = Self {
            bitreader: BitReader::new(source)?,
            block: None,
            block_index: 0,
            block_size100k: 0,
            total_crc: 0,
            stream_crc: 0,
            check_stream_crc: true,
            bytes_decoded: 0,
            offsets: BlockOffsets::new(),
            finished: false,
            poisoned: false,
            allow_trailing_garbage: false,
        };
        reader.read_stream_header()?;
        Ok(reader)
    }

    /// Accept arbitrary trailing bytes after the final end-of-stream block
    /// instead of requiring another `BZh` stream header there.
    pub fn allow_trailing_garbage(&mut self, allow: bool) {
        self.allow_trailing_garbage = allow;
    }

    /// Decode up to `n_max` bytes into `sink`. Returns the number of bytes
    /// produced; a zero return with a nonzero budget means end of input.
    pub fn read(&mut self, sink: &mut Sink<'_>, n_max: u64) -> Result<u64> {
        self.guarded(|this| this.read_inner(sink, n_max))
    }

    /// Cumulative decoded byte position, i.e. bytes produced since open,
    /// adjusted by seeks.
    pub fn tell(&self) -> u64 {
        self.bytes_decoded
    }

    /// True once the final end-of-stream block has been consumed.
    pub fn eof(&self) -> bool {
        self.finished && self.block.is_none()
    }

    /// The CRC carried by the most recently parsed end-of-stream block.
    pub fn stream_crc(&self) -> u32 {
        self.stream_crc
    }

    /// The stream's block size digit (1..=9).
    pub fn block_size100k(&self) -> u8 {
        self.block_size100k
    }

    /// Total decoded size. Decodes the remainder of the container (discarding
    /// the output) if the offset map is not complete yet.
    pub fn size(&mut self) -> Result<u64> {
        self.guarded(|this| {
            this.ensure_offsets()?;
            this.offsets.total_size().ok_or(Error::UnexpectedEof)
        })
    }

    /// The block offset map, decoding the remainder of the container first if
    /// it is not complete yet. After an error the map collected so far is
    /// returned as-is for diagnostics, not marked complete.
    pub fn block_offsets(&mut self) -> Result<&BlockOffsets> {
        if !self.poisoned && !self.offsets.is_complete() {
            if let Err(e) = self.ensure_offsets() {
                self.poisoned = true;
                return Err(e);
            }
        }
        Ok(&self.offsets)
    }

    /// Install a previously exported offset map, enabling random access
    /// without a first full decode.
    pub fn set_block_offsets(&mut self, offsets: BlockOffsets) -> Result<()> {
        if !offsets.is_complete() || offsets.len() < 2 {
            return Err(Error::InvalidOffsetMap(
                "need a complete map with a data block and the final block",
            ));
        }
        self.offsets = offsets;
        Ok(())
    }

    /// Seek to a position in the decoded byte stream.
    ///
    /// Builds the offset map first if necessary (one full decode with the
    /// output discarded), re-parses the block containing the target and
    /// discards bytes up to it. Stream-CRC verification is off afterwards;
    /// per-block CRCs are still enforced.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.guarded(|this| this.seek_inner(pos))
    }

    fn guarded<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.poisoned {
            return Err(Error::Poisoned);
        }
        let result = f(self);
        if result.is_err() {
            self.poisoned = true;
        }
        result
    }

    fn read_inner(&mut self, sink: &mut Sink<'_>, n_max: u64) -> Result<u64> {
        let mut produced = 0_u64;
        let mut chunk = [0_u8; OUT_BUF_SIZE];

        while produced < n_max {
            if self.block.is_none() {
                if self.finished || !self.next_block()? {
                    break;
                }
            }
            let block = match self.block.as_mut() {
                Some(block) => block,
                None => break,
            };

            let want = (n_max - produced).min(OUT_BUF_SIZE as u64) as usize;
            let n = block.emit(&mut chunk[..want]);
            sink.push(&chunk[..n])?;
            produced += n as u64;
            self.bytes_decoded += n as u64;

            if block.is_done() {
                let crc = block.crc();
                if crc != block.header_crc() {
                    return Err(Error::CrcMismatch { found: crc, expected: block.header_crc() });
                }
                trace!("block {} complete, CRC {:#010x} ok", self.block_index, crc);
                self.total_crc = fold_stream_crc(self.total_crc, crc);
                self.block = None;
            }
        }
        Ok(produced)
    }

    /// Parse block headers until a data block is loaded. Returns false at the
    /// end of the container. Handles end-of-stream blocks and the stream
    /// headers of concatenated streams along the way.
    fn next_block(&mut self) -> Result<bool> {
        loop {
            if !self.offsets.is_complete() {
                self.offsets.record(self.bitreader.tell(), self.bytes_decoded);
            }
            let dbuf_capacity = self.dbuf_capacity();
            match BlockHeader::read(&mut self.bitreader, dbuf_capacity)? {
                HeaderParse::EndOfStream { stream_crc } => {
                    if self.check_stream_crc && self.total_crc != stream_crc {
                        return Err(Error::CrcMismatch {
                            found: self.total_crc,
                            expected: stream_crc,
                        });
                    }
                    info!("end of stream, CRC {:#010x}", stream_crc);
                    self.stream_crc = stream_crc;
                    self.total_crc = 0;
                    self.bitreader.align_to_byte()?;

                    if self.bitreader.eof() {
                        self.finished = true;
                        self.offsets.mark_complete();
                        return Ok(false);
                    }
                    // More bytes follow: another stream, concatenated at a
                    // byte boundary.
                    match self.read_stream_header() {
                        Ok(()) => continue,
                        Err(Error::InvalidMagic(_)) if self.allow_trailing_garbage => {
                            self.finished = true;
                            self.offsets.mark_complete();
                            return Ok(false);
                        }
                        Err(e) => return Err(e),
                    }
                }
                HeaderParse::Data(header) => {
                    self.block_index += 1;
                    trace!("data block {} found", self.block_index);
                    let dbuf_capacity = self.dbuf_capacity();
                    let block = Block::decode(header, &mut self.bitreader, dbuf_capacity)?;
                    self.block = Some(block);
                    return Ok(true);
                }
            }
        }
    }

    fn read_stream_header(&mut self) -> Result<()> {
        for &expected in b"BZh" {
            let byte = self.bitreader.read(8)?;
            if byte != u32::from(expected) {
                return Err(Error::InvalidMagic(u64::from(byte)));
            }
        }
        let digit = self.bitreader.read(8)?;
        if !(u32::from(b'1')..=u32::from(b'9')).contains(&digit) {
            return Err(Error::InvalidMagic(u64::from(digit)));
        }
        self.block_size100k = (digit - u32::from(b'0')) as u8;
        info!("bzip2 stream with block size {}00k", self.block_size100k);
        Ok(())
    }

    fn dbuf_capacity(&self) -> usize {
        self.block_size100k as usize * BASE_BLOCK_SIZE
    }

    /// Decode the rest of the container, discarding the output, so that the
    /// offset map is complete.
    fn ensure_offsets(&mut self) -> Result<()> {
        let mut sink = Sink::discard();
        while !self.offsets.is_complete() {
            if self.read_inner(&mut sink, 1 << 20)? == 0 {
                break;
            }
        }
        Ok(())
    }

    fn seek_inner(&mut self, pos: SeekFrom) -> Result<u64> {
        self.ensure_offsets()?;
        let size = self.offsets.total_size().ok_or(Error::UnexpectedEof)?;

        let target = match pos {
            SeekFrom::Start(offset) => offset,
            SeekFrom::End(delta) => checked_offset(size, delta)?,
            SeekFrom::Current(delta) => checked_offset(self.bytes_decoded, delta)?,
        };

        // A fold of per-block CRCs is only meaningful when every block was
        // decoded in order, which random access gives up.
        self.check_stream_crc = false;
        self.block = None;

        if target >= size {
            self.finished = true;
            self.bytes_decoded = target;
            return Ok(target);
        }

        let (bit_offset, block_decoded_start) = self
            .offsets
            .block_for(target)
            .ok_or(Error::InvalidOffsetMap("no block covers the seek target"))?;
        trace!(
            "seek to {}: block at bit {} starting at decoded byte {}",
            target,
            bit_offset,
            block_decoded_start
        );

        self.bitreader.seek_bits(bit_offset)?;
        self.finished = false;

        // The map does not record which stream a block belongs to, so parse
        // against the format's maximum block capacity.
        match BlockHeader::read(&mut self.bitreader, MAX_DBUF_ENTRIES)? {
            HeaderParse::Data(header) => {
                let block = Block::decode(header, &mut self.bitreader, MAX_DBUF_ENTRIES)?;
                self.block = Some(block);
            }
            HeaderParse::EndOfStream { .. } => {
                return Err(Error::InvalidOffsetMap("seek target maps to an end-of-stream block"));
            }
        }

        self.bytes_decoded = block_decoded_start;
        let mut remaining = target - block_decoded_start;
        let mut sink = Sink::discard();
        while remaining > 0 {
            let n = self.read_inner(&mut sink, remaining)?;
            if n == 0 {
                return Err(Error::InvalidOffsetMap("offset map inconsistent with stream"));
            }
            remaining -= n;
        }
        Ok(target)
    }
}

fn checked_offset(base: u64, delta: i64) -> Result<u64> {
    let target = i128::from(base) + i128::from(delta);
    if target < 0 {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            "seek before start of decoded stream",
        )));
    }
    Ok(target as u64)
}

impl<R: Read + Seek> Read for Bz2Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n_max = buf.len() as u64;
        let mut sink = Sink::buffer(buf);
        let n = Bz2Reader::read(self, &mut sink, n_max)?;
        Ok(n as usize)
    }
}

impl<R: Read + Seek> Seek for Bz2Reader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(Bz2Reader::seek(self, pos)?)
    }
}
