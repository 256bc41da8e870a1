//! End-to-end decoding tests over real bzip2 containers.
//!
//! The fixtures were produced by the reference encoder. `lorem.bz2` was
//! compressed with block size 1 so it spans three data blocks.

use std::io::{Read, Seek, SeekFrom};

use seekbz2::{BlockOffsets, Bz2Reader, Error, Sink};

const EMPTY: &[u8] = include_bytes!("fixtures/empty.bz2");
const HELLO: &[u8] = include_bytes!("fixtures/hello.bz2");
const HELLO_REF: &[u8] = include_bytes!("fixtures/hello.ref");
const AB: &[u8] = include_bytes!("fixtures/ab.bz2");
const RUNS: &[u8] = include_bytes!("fixtures/runs.bz2");
const RUNS_REF: &[u8] = include_bytes!("fixtures/runs.ref");
const LOREM: &[u8] = include_bytes!("fixtures/lorem.bz2");
const LOREM_REF: &[u8] = include_bytes!("fixtures/lorem.ref");

fn init_logs() {
    use simplelog::{Config, LevelFilter, SimpleLogger};
    let _ = SimpleLogger::init(LevelFilter::Warn, Config::default());
}

fn reader(data: &[u8]) -> Bz2Reader<std::io::Cursor<Vec<u8>>> {
    Bz2Reader::from_bytes(data.to_vec()).expect("valid stream header")
}

fn decode_all(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    reader(data).read_to_end(&mut out).expect("clean decode");
    out
}

#[test]
fn empty_container() {
    init_logs();
    let mut r = reader(EMPTY);
    let mut sink = Sink::discard();
    assert_eq!(r.read(&mut sink, 1024).unwrap(), 0);
    assert!(r.eof());
    assert_eq!(r.size().unwrap(), 0);
    assert_eq!(r.stream_crc(), 0);
    let offsets = r.block_offsets().unwrap();
    assert_eq!(offsets.to_pairs(), vec![(32, 0)]);
}

#[test]
fn hello_world() {
    init_logs();
    let mut r = reader(HELLO);
    let mut out = Vec::new();
    r.read_to_end(&mut out).unwrap();
    assert_eq!(out, HELLO_REF);
    // Single-block stream: the stream CRC equals the block CRC and must match
    // the value stored in the end-of-stream header.
    assert_eq!(r.stream_crc(), 0x99AC_2256);
    assert_eq!(r.tell(), HELLO_REF.len() as u64);
}

#[test]
fn read_past_end_returns_zero() {
    let mut r = reader(HELLO);
    let mut out = Vec::new();
    r.read_to_end(&mut out).unwrap();
    let mut byte = [0u8; 1];
    assert_eq!(Read::read(&mut r, &mut byte).unwrap(), 0);
    assert!(r.eof());
}

#[test]
fn runs_round_trip() {
    // Contains runs of 259 and 300 identical bytes, crossing the
    // four-literals-plus-count boundary in both directions.
    assert_eq!(decode_all(RUNS), RUNS_REF);
}

#[test]
fn concatenated_streams() {
    let mut r = reader(AB);
    let mut out = Vec::new();
    r.read_to_end(&mut out).unwrap();
    assert_eq!(out, b"AB");

    let pairs = r.block_offsets().unwrap().to_pairs();
    assert_eq!(pairs.len(), 4, "two data and two end-of-stream entries");
    let decoded: Vec<u64> = pairs.iter().map(|&(_, d)| d).collect();
    assert_eq!(decoded, vec![0, 1, 1, 2]);
    let mut bits: Vec<u64> = pairs.iter().map(|&(b, _)| b).collect();
    assert_eq!(bits[0], 32, "first block follows the four-byte stream header");
    bits.dedup();
    assert_eq!(bits.len(), 4, "bit offsets strictly increase");
}

#[test]
fn multi_block_container() {
    let mut r = reader(LOREM);
    let mut out = Vec::new();
    r.read_to_end(&mut out).unwrap();
    assert_eq!(out, LOREM_REF);

    let pairs = r.block_offsets().unwrap().to_pairs();
    assert_eq!(pairs.len(), 4, "three data blocks plus the end-of-stream block");
    assert!(pairs.windows(2).all(|w| w[0].0 < w[1].0));
    assert!(pairs.windows(2).all(|w| w[0].1 < w[1].1));
    assert_eq!(pairs.last().unwrap().1, LOREM_REF.len() as u64);
}

#[test]
fn bounded_reads_match_unbounded() {
    // Any partition of n into read budgets must concatenate to the same
    // bytes, including budgets that land inside runs and blocks.
    let mut r = reader(LOREM);
    let mut out = Vec::new();
    let mut budget = 1;
    loop {
        let mut chunk = vec![0u8; budget];
        let mut sink = Sink::buffer(&mut chunk);
        let n = r.read(&mut sink, budget as u64).unwrap();
        out.extend_from_slice(&chunk[..n as usize]);
        if n == 0 {
            break;
        }
        budget = budget % 4093 + 1;
    }
    assert_eq!(out, LOREM_REF);
}

#[test]
fn tell_is_idempotent_across_empty_reads() {
    let mut r = reader(LOREM);
    let mut buf = [0u8; 1000];
    let mut sink = Sink::buffer(&mut buf);
    r.read(&mut sink, 1000).unwrap();
    let before = r.tell();
    let mut sink = Sink::discard();
    assert_eq!(r.read(&mut sink, 0).unwrap(), 0);
    assert_eq!(r.tell(), before);
}

#[test]
fn seek_matches_sequential_read() {
    let mut r = reader(LOREM);
    for &target in &[0u64, 1, 99_999, 100_000, 100_001, 123_456, 249_999] {
        r.seek(SeekFrom::Start(target)).unwrap();
        assert_eq!(r.tell(), target);
        let mut buf = [0u8; 100];
        let mut sink = Sink::buffer(&mut buf);
        let n = r.read(&mut sink, 100).unwrap() as usize;
        let want = &LOREM_REF[target as usize..(target as usize + 100).min(LOREM_REF.len())];
        assert_eq!(&buf[..n], want, "seek to {}", target);
    }
}

#[test]
fn seek_within_concatenated_streams() {
    let mut r = reader(AB);
    r.seek(SeekFrom::Start(1)).unwrap();
    let mut buf = [0u8; 4];
    let mut sink = Sink::buffer(&mut buf);
    assert_eq!(r.read(&mut sink, 4).unwrap(), 1);
    assert_eq!(buf[0], b'B');

    r.seek(SeekFrom::Start(0)).unwrap();
    let mut buf = [0u8; 4];
    let mut sink = Sink::buffer(&mut buf);
    assert_eq!(r.read(&mut sink, 4).unwrap(), 2);
    assert_eq!(&buf[..2], b"AB");
}

#[test]
fn seek_past_end_is_sticky_eof() {
    let mut r = reader(HELLO);
    let size = r.size().unwrap();
    r.seek(SeekFrom::Start(size + 10)).unwrap();
    let mut sink = Sink::discard();
    assert_eq!(r.read(&mut sink, 1).unwrap(), 0);
}

#[test]
fn exported_offsets_enable_random_access() {
    // Build the map once, then hand it to a fresh reader that never did a
    // full decode.
    let mut first = reader(LOREM);
    let offsets = first.block_offsets().unwrap().clone();
    assert!(offsets.is_complete());

    let mut r = reader(LOREM);
    r.set_block_offsets(offsets.clone()).unwrap();
    let size = LOREM_REF.len() as u64;
    r.seek(SeekFrom::Start(size / 2)).unwrap();
    let mut buf = [0u8; 100];
    let mut sink = Sink::buffer(&mut buf);
    let n = r.read(&mut sink, 100).unwrap() as usize;
    assert_eq!(&buf[..n], &LOREM_REF[size as usize / 2..size as usize / 2 + 100]);

    // The map round-trips through its exported pair form.
    let rebuilt = BlockOffsets::from_pairs(&offsets.to_pairs()).unwrap();
    assert_eq!(rebuilt, offsets);
}

#[test]
fn rejects_undersized_offset_map() {
    let mut r = reader(HELLO);
    let only_eos = BlockOffsets::from_pairs(&[(32, 0)]);
    assert!(matches!(only_eos, Err(Error::InvalidOffsetMap(_))));
    let incomplete = BlockOffsets::new();
    assert!(matches!(r.set_block_offsets(incomplete), Err(Error::InvalidOffsetMap(_))));
}

#[test]
fn corrupt_header_crc_fails_with_mismatch() {
    init_logs();
    // The first data block's 32-bit expected CRC starts at bit 80; flip its
    // lowest bit.
    let mut data = HELLO.to_vec();
    data[10] ^= 0x01;
    let mut r = Bz2Reader::from_bytes(data).unwrap();
    let mut sink = Sink::discard();
    let err = r.read(&mut sink, u64::MAX).unwrap_err();
    assert!(matches!(err, Error::CrcMismatch { .. }));

    // The map collected before the failure stays exposable for diagnostics
    // and is not marked complete.
    let partial = r.block_offsets().unwrap();
    assert!(!partial.is_complete());
    assert_eq!(partial.to_pairs(), vec![(32, 0)]);
}

#[test]
fn corrupt_payload_fails_with_mismatch() {
    let mut data = HELLO.to_vec();
    data[40] ^= 0x10;
    let mut r = Bz2Reader::from_bytes(data).unwrap();
    let mut sink = Sink::discard();
    assert!(matches!(r.read(&mut sink, u64::MAX), Err(Error::CrcMismatch { .. })));
}

#[test]
fn trailing_garbage_policy() {
    let mut data = HELLO.to_vec();
    data.extend_from_slice(b"not a stream");

    // Default: garbage where a stream header should be is an error.
    let mut strict = Bz2Reader::from_bytes(data.clone()).unwrap();
    let mut sink = Sink::discard();
    assert!(matches!(strict.read(&mut sink, u64::MAX), Err(Error::InvalidMagic(_))));

    // Opt-in: treat it as end of input.
    let mut lenient = Bz2Reader::from_bytes(data).unwrap();
    lenient.allow_trailing_garbage(true);
    let mut out = Vec::new();
    lenient.read_to_end(&mut out).unwrap();
    assert_eq!(out, HELLO_REF);
    assert!(lenient.eof());
}

#[test]
fn io_traits_compose() {
    // The std Read + Seek impls are enough for generic consumers.
    let mut r = reader(LOREM);
    r.seek(SeekFrom::Start(1000)).unwrap();
    let mut buf = [0u8; 64];
    r.read_exact(&mut buf).unwrap();
    assert_eq!(&buf[..], &LOREM_REF[1000..1064]);

    let pos = r.seek(SeekFrom::Current(-64)).unwrap();
    assert_eq!(pos, 1000);
    let mut again = [0u8; 64];
    r.read_exact(&mut again).unwrap();
    assert_eq!(buf, again);
}
