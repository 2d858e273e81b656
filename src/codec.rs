//! Key Codec
//!
//! Byte encodings for integers used to build store keys.
//!
//! ## Encodings
//! ```text
//! fixed64        8 bytes big-endian            order preserving
//! varint64       LEB128, 1..=10 bytes          compact, NOT order preserving
//! ordered u64    [len: 1][value: len bytes BE] order preserving, self-delimiting
//! decreasing     bitwise complement of the ordered / fixed form
//! pair (a, b)    ordered(a) ++ ordered(b)      b omitted when zero
//! ```
//!
//! Forward byte order over a decreasing encoding is descending numeric order,
//! which is how "newest first" scans are laid out in a forward-only keyspace.
//!
//! Decoders take `&mut &[u8]` and advance the slice past what they consumed,
//! so several fields can be peeled off a key in sequence.

use crate::error::{Result, TideError};

// =============================================================================
// Fixed Width
// =============================================================================

pub fn put_fixed32(dst: &mut Vec<u8>, v: u32) {
    dst.extend_from_slice(&v.to_be_bytes());
}

pub fn put_fixed64(dst: &mut Vec<u8>, v: u64) {
    dst.extend_from_slice(&v.to_be_bytes());
}

/// Fixed-width encoding whose byte order is descending numeric order
pub fn put_decreasing_fixed64(dst: &mut Vec<u8>, v: u64) {
    dst.extend_from_slice(&(!v).to_be_bytes());
}

pub fn decode_fixed32(input: &mut &[u8]) -> Result<u32> {
    let bytes = take(input, 4)?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub fn decode_fixed64(input: &mut &[u8]) -> Result<u64> {
    let bytes = take(input, 8)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    Ok(u64::from_be_bytes(buf))
}

pub fn decode_decreasing_fixed64(input: &mut &[u8]) -> Result<u64> {
    decode_fixed64(input).map(|v| !v)
}

// =============================================================================
// Varint (LEB128)
// =============================================================================

pub fn put_varint64(dst: &mut Vec<u8>, mut v: u64) {
    while v >= 0x80 {
        dst.push((v as u8) | 0x80);
        v >>= 7;
    }
    dst.push(v as u8);
}

pub fn decode_varint64(input: &mut &[u8]) -> Result<u64> {
    let mut result = 0u64;
    for (i, &byte) in input.iter().enumerate().take(10) {
        let bits = (byte & 0x7f) as u64;
        if i == 9 && bits > 1 {
            return Err(TideError::Codec("varint overflows u64".to_string()));
        }
        result |= bits << (7 * i);
        if byte & 0x80 == 0 {
            *input = &input[i + 1..];
            return Ok(result);
        }
    }
    Err(TideError::Codec("truncated varint".to_string()))
}

// =============================================================================
// Order-Preserving Varint
// =============================================================================

/// Length-prefixed big-endian encoding: shorter values sort first, equal
/// lengths compare byte by byte, so byte order equals numeric order.
pub fn put_ordered_u64(dst: &mut Vec<u8>, v: u64) {
    let bytes = v.to_be_bytes();
    let len = 8 - (v.leading_zeros() / 8) as usize;
    dst.push(len as u8);
    dst.extend_from_slice(&bytes[8 - len..]);
}

pub fn decode_ordered_u64(input: &mut &[u8]) -> Result<u64> {
    let len = take(input, 1)?[0] as usize;
    if len > 8 {
        return Err(TideError::Codec(format!("ordered varint length {} > 8", len)));
    }
    let bytes = take(input, len)?;
    Ok(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
}

/// Complemented ordered varint: forward byte order is descending numeric order
pub fn put_decreasing_u64(dst: &mut Vec<u8>, v: u64) {
    let start = dst.len();
    put_ordered_u64(dst, v);
    for b in &mut dst[start..] {
        *b = !*b;
    }
}

pub fn decode_decreasing_u64(input: &mut &[u8]) -> Result<u64> {
    let len = !take(input, 1)?[0] as usize;
    if len > 8 {
        return Err(TideError::Codec(format!("decreasing varint length {} > 8", len)));
    }
    let bytes = take(input, len)?;
    Ok(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | (!b) as u64))
}

// =============================================================================
// Pairs
// =============================================================================

/// Encode `(a, b)`. The second element is omitted when zero, so the encoding
/// of `(a, 0)` is a strict prefix of the encoding of every `(a, b)`.
pub fn encode_pair(a: u64, b: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(18);
    put_ordered_u64(&mut out, a);
    if b != 0 {
        put_ordered_u64(&mut out, b);
    }
    out
}

/// Decode a pair that occupies the remainder of `input`.
pub fn decode_pair(input: &mut &[u8]) -> Result<(u64, u64)> {
    let a = decode_ordered_u64(input)?;
    let b = if input.is_empty() { 0 } else { decode_ordered_u64(input)? };
    Ok((a, b))
}

pub fn encode_decreasing_pair(a: u64, b: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(18);
    put_decreasing_u64(&mut out, a);
    if b != 0 {
        put_decreasing_u64(&mut out, b);
    }
    out
}

pub fn decode_decreasing_pair(input: &mut &[u8]) -> Result<(u64, u64)> {
    let a = decode_decreasing_u64(input)?;
    let b = if input.is_empty() { 0 } else { decode_decreasing_u64(input)? };
    Ok((a, b))
}

// =============================================================================
// Private Helpers
// =============================================================================

fn take<'a>(input: &mut &'a [u8], n: usize) -> Result<&'a [u8]> {
    if input.len() < n {
        return Err(TideError::Codec(format!(
            "need {} bytes, {} remaining",
            n,
            input.len()
        )));
    }
    let (head, tail) = input.split_at(n);
    *input = tail;
    Ok(head)
}
