// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Packet-specific error types

use core::fmt;

/// Packet encode errors
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The target buffer is too small for the encoded data
    BufferTooSmall,
}

impl core::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferTooSmall => write!(f, "Reached end of buffer while encoding"),
        }
    }
}
