// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Hart to encoder ingress
//!
//! This module provides the record a hart hands to the
//! [`Encoder`][crate::encoder::Encoder] for every retired instruction. The
//! classification of the retired instruction into a [`Kind`] happens upstream
//! and is not the concern of this crate.


/// Single ingress record
///
/// A hart produces exactly one ingress record per retired instruction. The
/// [`Default`] record, which is also held by the encoder's pipeline registers
/// before the first record arrives, has address and timestamp `0` and kind
/// [`Kind::None`].
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq)]
pub struct Ingress {
    /// Address of the retired instruction
    pub address: u64,
    /// Monotonic cycle or retirement counter
    pub timestamp: u64,
    /// Classification of the retired instruction
    pub kind: Kind,
}

impl Ingress {
    /// Create a new ingress record
    pub const fn new(address: u64, timestamp: u64, kind: Kind) -> Self {
        Self {
            address,
            timestamp,
            kind,
        }
    }
}

/// Instruction classification
///
/// The type implements `TryFrom<u8>`, allowing conversion from the numerical
/// codes `0` to `7` in the order of declaration.
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq)]
pub enum Kind {
    /// Instruction not causing any control flow discontinuity
    #[default]
    None,
    /// Taken conditional branch
    BranchTaken,
    /// Not taken conditional branch
    BranchNotTaken,
    /// Jump with a target inferable from the binary
    JumpInferable,
    /// Jump with a target not inferable from the binary, e.g. `jalr`
    JumpUninferable,
    /// Exception
    Exception,
    /// Interrupt
    Interrupt,
    /// Exception or interrupt return
    TrapReturn,
}

impl Kind {
    /// Retrieve the outcome if this is a conditional branch
    ///
    /// Returns `Some(true)` for taken and `Some(false)` for not taken
    /// branches, [`None`] for all other kinds.
    pub fn branch_taken(self) -> Option<bool> {
        match self {
            Self::BranchTaken => Some(true),
            Self::BranchNotTaken => Some(false),
            _ => None,
        }
    }

    /// Determine whether this is a conditional branch
    pub fn is_branch(self) -> bool {
        self.branch_taken().is_some()
    }
}

impl TryFrom<u8> for Kind {
    type Error = u8;

    fn try_from(num: u8) -> Result<Self, Self::Error> {
        match num {
            0 => Ok(Self::None),
            1 => Ok(Self::BranchTaken),
            2 => Ok(Self::BranchNotTaken),
            3 => Ok(Self::JumpInferable),
            4 => Ok(Self::JumpUninferable),
            5 => Ok(Self::Exception),
            6 => Ok(Self::Interrupt),
            7 => Ok(Self::TrapReturn),
            n => Err(n),
        }
    }
}

impl From<Kind> for u8 {
    fn from(kind: Kind) -> Self {
        kind as u8
    }
}
