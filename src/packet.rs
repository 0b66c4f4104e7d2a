// Copyright (C) 2024, 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Trace packets and their encoding
//!
//! This module provides the definition of the [`Packet`]s emitted by the
//! [trace encoder][crate::encoder::Encoder] as well as an [`encoder`] for
//! serializing them.
//!
//! # Wire format
//!
//! Each packet starts with a header byte. Its lowest two bits hold a
//! [`CHeader`]. If that is anything other than [`CHeader::NotApplicable`], the
//! packet is compressed: the upper six bits of the byte carry a small value
//! (a timestamp delta or a hit count) and the packet ends there.
//!
//! Otherwise the header byte holds a [`FHeader`] in bits `[4:2]` and a
//! [`TrapType`] in bits `[7:5]`. It is followed by an address field for
//! [sync][FHeader::Sync], [uninferable jump][FHeader::UninferableJump] and
//! [trap][FHeader::Trap] packets, and by a timestamp field for all packets.
//! Both fields are variable length integers: seven bits of payload per byte,
//! least significant group first, with bit 7 set only in the final byte.

pub mod encoder;
pub mod error;
pub mod util;


use core::fmt;

pub use encoder::{Encode, Encoder};
pub use error::Error;

/// Size of a buffer sufficient for any [`Packet`]
///
/// The longest packet consists of a header and two variable length integers of
/// ten bytes each.
pub const MAX_PACKET_SIZE: usize = 32;

/// Compressed header
///
/// [`TakenBranch`][Self::TakenBranch] and [`NotTaken`][Self::NotTaken] double
/// as [`HIT`][Self::HIT] and [`MISS`][Self::MISS] in
/// [`BranchMode::Prediction`][crate::config::BranchMode::Prediction].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CHeader {
    TakenBranch = 0b00,
    NotTaken = 0b01,
    /// The packet is not compressed
    NotApplicable = 0b10,
    InferableJump = 0b11,
}

impl CHeader {
    /// Branch predictor hit
    pub const HIT: Self = Self::TakenBranch;
    /// Branch predictor miss
    pub const MISS: Self = Self::NotTaken;

    /// Retrieve the compressed header corresponding to a [`FHeader`]
    ///
    /// Only taken and not taken branches (or hits and misses) and inferable
    /// jumps have a compressed form. All other [`FHeader`]s map to
    /// [`NotApplicable`][Self::NotApplicable].
    pub fn for_full(f_header: FHeader) -> Self {
        match f_header {
            FHeader::TakenBranch => Self::TakenBranch,
            FHeader::NotTaken => Self::NotTaken,
            FHeader::InferableJump => Self::InferableJump,
            _ => Self::NotApplicable,
        }
    }
}

impl From<CHeader> for u8 {
    fn from(header: CHeader) -> Self {
        header as u8
    }
}

/// Full header, identifying the kind of a non-compressed packet
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FHeader {
    TakenBranch = 0b000,
    NotTaken = 0b001,
    UninferableJump = 0b010,
    InferableJump = 0b011,
    /// Exception, interrupt or trap return
    Trap = 0b100,
    /// Start or end of a trace segment
    Sync = 0b101,
    /// Value report, reserved
    Value = 0b110,
    /// Reserved
    Reserved = 0b111,
}

impl FHeader {
    /// Branch predictor hit
    pub const HIT: Self = Self::TakenBranch;
    /// Branch predictor miss
    pub const MISS: Self = Self::NotTaken;

    /// Determine whether packets with this header carry an address field
    pub fn has_address(self) -> bool {
        matches!(self, Self::UninferableJump | Self::Trap | Self::Sync)
    }
}

impl From<FHeader> for u8 {
    fn from(header: FHeader) -> Self {
        header as u8
    }
}

/// Reason for a [trap packet][FHeader::Trap]
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq)]
pub enum TrapType {
    #[default]
    None = 0b000,
    Exception = 0b001,
    Interrupt = 0b010,
    TrapReturn = 0b100,
}

impl From<TrapType> for u8 {
    fn from(trap_type: TrapType) -> Self {
        trap_type as u8
    }
}

/// A single trace packet
///
/// Packets are usually built through one of the constructor fns, which fill in
/// the headers consistently.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Packet {
    pub c_header: CHeader,
    pub f_header: FHeader,
    pub trap_type: TrapType,
    /// Address, shifted right by one
    ///
    /// For jumps and traps, this is the XOR of two shifted addresses. Unused
    /// (and zero) for other packets but [sync][FHeader::Sync] packets.
    pub address: u64,
    /// Timestamp delta, absolute timestamp or hit count
    pub timestamp: u64,
}

impl Packet {
    /// Create a sync packet opening or closing a trace segment
    pub fn sync(address: u64, timestamp: u64) -> Self {
        Self {
            c_header: CHeader::NotApplicable,
            f_header: FHeader::Sync,
            trap_type: TrapType::None,
            address,
            timestamp,
        }
    }

    /// Create a packet reporting a branch or an inferable jump
    ///
    /// The packet will be compressed if `delta` is small enough and the
    /// `f_header` has a compressed form.
    pub fn direct(f_header: FHeader, delta: u64) -> Self {
        let c_header = if util::is_compressible(delta) {
            CHeader::for_full(f_header)
        } else {
            CHeader::NotApplicable
        };
        Self {
            c_header,
            f_header,
            trap_type: TrapType::None,
            address: 0,
            timestamp: delta,
        }
    }

    /// Create a packet reporting a number of branch predictor hits
    pub fn hit(count: u64) -> Self {
        Self::direct(FHeader::HIT, count)
    }

    /// Create a packet reporting an uninferable jump
    pub fn uninferable_jump(address: u64, delta: u64) -> Self {
        Self {
            c_header: CHeader::NotApplicable,
            f_header: FHeader::UninferableJump,
            trap_type: TrapType::None,
            address,
            timestamp: delta,
        }
    }

    /// Create a packet reporting a trap or trap return
    pub fn trap(trap_type: TrapType, address: u64, delta: u64) -> Self {
        Self {
            c_header: CHeader::NotApplicable,
            f_header: FHeader::Trap,
            trap_type,
            address,
            timestamp: delta,
        }
    }

    /// Determine whether this packet is encoded in its compressed form
    pub fn is_compressed(&self) -> bool {
        self.c_header != CHeader::NotApplicable
    }

    /// Retrieve the number of bytes this packet occupies when encoded
    pub fn encoded_len(&self) -> usize {
        if self.is_compressed() {
            return 1;
        }
        let address = if self.f_header.has_address() {
            util::varint_len(self.address)
        } else {
            0
        };
        1 + address + util::varint_len(self.timestamp)
    }
}

impl<B: AsMut<[u8]>> Encode<B> for Packet {
    fn encode(&self, encoder: &mut Encoder<B>) -> Result<(), Error> {
        if self.is_compressed() {
            return encoder.write_byte(util::compressed_byte(self.c_header, self.timestamp));
        }

        encoder.write_byte(util::header_byte(
            self.c_header,
            self.f_header,
            self.trap_type,
        ))?;
        if self.f_header.has_address() {
            encoder.write_varint(self.address)?;
        }
        encoder.write_varint(self.timestamp)
    }
}

/// Log representation
impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[Packet]: c_header: {}, f_header: {}, trap_type: {}, address: {:x}, timestamp: {:x}",
            u8::from(self.c_header),
            u8::from(self.f_header),
            u8::from(self.trap_type),
            self.address,
            self.timestamp,
        )
    }
}

/// Hex dump of encoded bytes
///
/// Displays bytes as space separated pairs of lower case hex digits.
#[derive(Copy, Clone, Debug)]
pub struct Hex<'a>(pub &'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut bytes = self.0.iter();
        if let Some(first) = bytes.next() {
            write!(f, "{first:02x}")?;
        }
        bytes.try_for_each(|b| write!(f, " {b:02x}"))
    }
}
