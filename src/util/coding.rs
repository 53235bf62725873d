//! Encoding utilities for variable-length integers and fixed-width values.
//!
//! Writers append to a `BytesMut`; readers consume from a [`Slice`] and return
//! `None` when the input is truncated or malformed, leaving error reporting to
//! the caller that knows which field was being read.

use bytes::{BufMut, BytesMut};

use crate::slice::Slice;

/// Maximum bytes needed to encode a varint64.
pub const MAX_VARINT64_LEN: usize = 10;

/// Maximum bytes needed to encode a varint32.
pub const MAX_VARINT32_LEN: usize = 5;

/// Append a 32-bit unsigned integer as a varint.
pub fn put_varint32(buf: &mut BytesMut, value: u32) {
    put_varint64(buf, value as u64);
}

/// Append a 64-bit unsigned integer as a varint.
pub fn put_varint64(buf: &mut BytesMut, mut value: u64) {
    while value >= 0x80 {
        buf.put_u8((value as u8) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Append a fixed 32-bit little-endian integer.
pub fn put_fixed32(buf: &mut BytesMut, value: u32) {
    buf.put_u32_le(value);
}

/// Append a fixed 64-bit little-endian integer.
pub fn put_fixed64(buf: &mut BytesMut, value: u64) {
    buf.put_u64_le(value);
}

/// Append a varint32 length followed by the bytes themselves.
pub fn put_length_prefixed_slice(buf: &mut BytesMut, data: &[u8]) {
    debug_assert!(data.len() <= u32::MAX as usize);
    put_varint32(buf, data.len() as u32);
    buf.put_slice(data);
}

/// Consume a varint32 from the front of `input`.
///
/// Values that do not fit in 32 bits are rejected. On failure `input` is left
/// untouched.
pub fn get_varint32(input: &mut Slice<'_>) -> Option<u32> {
    let mut cursor = *input;
    let value = get_varint_limited(&mut cursor, MAX_VARINT32_LEN)?;
    let value = u32::try_from(value).ok()?;
    *input = cursor;
    Some(value)
}

/// Consume a varint64 from the front of `input`.
///
/// On failure `input` is left untouched.
pub fn get_varint64(input: &mut Slice<'_>) -> Option<u64> {
    let mut cursor = *input;
    let value = get_varint_limited(&mut cursor, MAX_VARINT64_LEN)?;
    *input = cursor;
    Some(value)
}

fn get_varint_limited(input: &mut Slice<'_>, max_len: usize) -> Option<u64> {
    let mut result = 0u64;

    for i in 0..max_len {
        if input.is_empty() {
            return None;
        }
        let byte = input[0];
        input.remove_prefix(1);

        let shift = 7 * i as u32;
        let bits = (byte & 0x7F) as u64;
        // The tenth byte of a varint64 may only carry the top bit.
        if shift == 63 && bits > 1 {
            return None;
        }
        result |= bits << shift;

        if byte & 0x80 == 0 {
            return Some(result);
        }
    }

    None // Varint too long
}

/// Consume a varint32-length-prefixed run of bytes.
///
/// The returned slice borrows from the same buffer as `input`. On failure
/// `input` is left untouched.
pub fn get_length_prefixed_slice<'a>(input: &mut Slice<'a>) -> Option<Slice<'a>> {
    let mut cursor = *input;
    let len = get_varint32(&mut cursor)? as usize;
    let data = cursor.take_prefix(len)?;
    *input = cursor;
    Some(data)
}

/// Read a fixed 32-bit little-endian value from the front of `data`.
pub fn decode_fixed32(data: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = data.get(..4)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

/// Read a fixed 64-bit little-endian value from the front of `data`.
pub fn decode_fixed64(data: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = data.get(..8)?.try_into().ok()?;
    Some(u64::from_le_bytes(bytes))
}

/// Get the number of bytes needed to encode a varint.
pub fn varint_length(value: u64) -> usize {
    let mut len = 1;
    let mut v = value;
    while v >= 0x80 {
        v >>= 7;
        len += 1;
    }
    len
}
