// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Utilities for encoding specific items of packets

use super::encoder::Encoder;
use super::{CHeader, Error, FHeader, TrapType};

/// Number of value bits in a compressed packet
pub const COMPRESSED_VALUE_BITS: i32 = 6;

/// Retrieve the index of the most significant set bit
///
/// Returns `-1` for zero.
pub fn msb_index(value: u64) -> i32 {
    value.checked_ilog2().map_or(-1, |i| i as i32)
}

/// Retrieve the number of variable length integer bytes for an msb index
///
/// Each byte holds seven bits. An index of `-1`, i.e. a zero value, still
/// requires a single byte.
pub fn byte_count(msb: i32) -> usize {
    // `msb` is at least -1, so the sum is at least 1
    (msb / 7 + 1) as usize
}

/// Retrieve the number of bytes a variable length integer occupies
pub fn varint_len(value: u64) -> usize {
    byte_count(msb_index(value))
}

/// Encode a variable length integer into a buffer
///
/// Returns the number of bytes written.
pub fn encode_varint(value: u64, buffer: &mut [u8]) -> Result<usize, Error> {
    let mut encoder = Encoder::new(buffer);
    encoder.write_varint(value)?;
    Ok(encoder.bytes_written())
}

/// Determine whether a value fits into a compressed packet
pub fn is_compressible(value: u64) -> bool {
    msb_index(value) < COMPRESSED_VALUE_BITS
}

/// Compose the single byte of a compressed packet
///
/// Only the lower six bits of `value` are retained.
pub fn compressed_byte(c_header: CHeader, value: u64) -> u8 {
    u8::from(c_header) | ((value as u8) << 2)
}

/// Compose the header byte of a non-compressed packet
pub fn header_byte(c_header: CHeader, f_header: FHeader, trap_type: TrapType) -> u8 {
    u8::from(c_header) | (u8::from(f_header) << 2) | (u8::from(trap_type) << 5)
}
