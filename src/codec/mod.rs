// Copyright 2026 nitrokv contributors. Licensed under Apache-2.0.

//! Fixed-endian integer pack/unpack and composite key/value codecs.
//!
//! All multi-byte integers are little-endian on disk; reimplementers must
//! never rely on host byte order. Key builders return a
//! `SmallVec` so the common case (short keys, short members) never touches
//! the heap; parsers return borrowed slices tied to the input's lifetime.

pub mod key;
pub mod value;

use smallvec::SmallVec;

/// Inline buffer size that covers the overwhelming majority of composite
/// keys without spilling to the heap.
pub type KeyBuf = SmallVec<[u8; 64]>;

#[inline]
pub fn put_u32_le(buf: &mut KeyBuf, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

#[inline]
pub fn put_i32_le(buf: &mut KeyBuf, v: i32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

#[inline]
pub fn put_u64_le(buf: &mut KeyBuf, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

#[inline]
pub fn put_f64_bits_le(buf: &mut KeyBuf, v: f64) {
    buf.extend_from_slice(&v.to_bits().to_le_bytes());
}

#[inline]
pub fn get_u32_le(buf: &[u8]) -> Option<u32> {
    if buf.len() < 4 {
        return None;
    }
    let mut a = [0u8; 4];
    a.copy_from_slice(&buf[..4]);
    Some(u32::from_le_bytes(a))
}

#[inline]
pub fn get_i32_le(buf: &[u8]) -> Option<i32> {
    get_u32_le(buf).map(|v| v as i32)
}

#[inline]
pub fn get_u64_le(buf: &[u8]) -> Option<u64> {
    if buf.len() < 8 {
        return None;
    }
    let mut a = [0u8; 8];
    a.copy_from_slice(&buf[..8]);
    Some(u64::from_le_bytes(a))
}

#[inline]
pub fn get_f64_bits_le(buf: &[u8]) -> Option<f64> {
    get_u64_le(buf).map(f64::from_bits)
}
