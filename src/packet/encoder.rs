// Copyright (C) 2024, 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Packet encoder

use super::error::Error;
use super::util;

/// An encoder for [packets][super::Packet]
///
/// The encoder writes bytes to a buffer, starting at its beginning. The
/// buffer needs to be large enough to hold all data encoded.
#[derive(Clone, Debug)]
pub struct Encoder<B: AsMut<[u8]>> {
    data: B,
    byte_pos: usize,
}

impl<B: AsMut<[u8]>> Encoder<B> {
    /// Create a new encoder writing to the given buffer
    pub fn new(data: B) -> Self {
        Self { data, byte_pos: 0 }
    }

    /// Encode one entity
    pub fn encode(&mut self, data: &impl Encode<B>) -> Result<(), Error> {
        data.encode(self)
    }

    /// Finish the encoding process
    ///
    /// Returns the buffer and the number of bytes written to it.
    pub fn finish(self) -> (B, usize) {
        (self.data, self.byte_pos)
    }

    /// Retrieve the number of bytes written so far
    pub fn bytes_written(&self) -> usize {
        self.byte_pos
    }

    /// Write a single byte
    pub fn write_byte(&mut self, byte: u8) -> Result<(), Error> {
        let target = self
            .data
            .as_mut()
            .get_mut(self.byte_pos)
            .ok_or(Error::BufferTooSmall)?;
        *target = byte;
        self.byte_pos += 1;
        Ok(())
    }

    /// Write a variable length integer
    ///
    /// The value is written in groups of seven bits, least significant group
    /// first. Only the final byte has its most significant bit set. Zero is
    /// written as a single byte.
    pub fn write_varint(&mut self, value: u64) -> Result<(), Error> {
        let len = util::varint_len(value);
        if self.data.as_mut().len() < self.byte_pos + len {
            return Err(Error::BufferTooSmall);
        }

        let mut value = value;
        for i in 1..=len {
            let terminator = if i == len { 0x80 } else { 0x00 };
            self.write_byte((value & 0x7f) as u8 | terminator)?;
            value >>= 7;
        }
        Ok(())
    }
}

/// Encodable item
///
/// Items implementing this trait may be encoded using an [`Encoder`].
pub trait Encode<B: AsMut<[u8]>>: Sized {
    /// Encode this item
    fn encode(&self, encoder: &mut Encoder<B>) -> Result<(), Error>;
}
