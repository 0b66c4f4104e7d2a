// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Configuration


/// Encoder parameters
///
/// Parameters select the [`BranchMode`] and the number of entries of the
/// branch predictor table used in [`BranchMode::Prediction`]. They are
/// consumed by the [encoder builder][crate::encoder::Builder::with_params].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Parameters {
    pub br_mode: BranchMode,
    pub bp_entries: usize,
}

/// See [PARAMETERS] for default values of individual fields
impl Default for Parameters {
    fn default() -> Self {
        PARAMETERS
    }
}

/// Default [Parameters]
pub const PARAMETERS: Parameters = Parameters {
    br_mode: BranchMode::Target,
    bp_entries: DEFAULT_BP_ENTRIES,
};

/// Default number of branch predictor entries
pub const DEFAULT_BP_ENTRIES: usize = 1024;

/// Branch reporting mode
///
/// The mode determines how the encoder reports branches while a trace segment
/// is open. It is expected to be set before tracing is enabled. Changing the
/// mode while a segment is open results in an unspecified (but memory safe)
/// packet stream.
///
/// The type implements `TryFrom<u8>`, allowing conversion from the two bit
/// numerical representation.
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BranchMode {
    /// Every branch and inferable jump is reported by a direct packet
    #[default]
    Target = 0b00,
    /// Branch history mode, reserved
    ///
    /// No packets are generated in this mode while a segment is open.
    History = 0b01,
    /// Branches are reported as runs of branch predictor hits and misses
    Prediction = 0b10,
    /// Reserved
    ///
    /// No packets are generated in this mode while a segment is open.
    Reserved = 0b11,
}

impl TryFrom<u8> for BranchMode {
    type Error = u8;

    fn try_from(num: u8) -> Result<Self, Self::Error> {
        match num {
            0b00 => Ok(Self::Target),
            0b01 => Ok(Self::History),
            0b10 => Ok(Self::Prediction),
            0b11 => Ok(Self::Reserved),
            n => Err(n),
        }
    }
}

impl From<BranchMode> for u8 {
    fn from(mode: BranchMode) -> Self {
        mode as u8
    }
}
