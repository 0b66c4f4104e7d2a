// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Trace encoder errors

use core::fmt;

use crate::packet;

/// Errors that may be emitted by the trace [`Encoder`][super::Encoder]
#[derive(Debug, PartialEq, Eq)]
pub enum Error<S> {
    /// The branch predictor cannot be constructed for the given size
    CannotConstructPredictor(usize),
    /// A packet could not be encoded
    Encode(packet::Error),
    /// The [`Sink`][crate::sink::Sink] did not accept a packet
    Sink(S),
}

impl<S> core::error::Error for Error<S>
where
    S: fmt::Debug + core::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Encode(inner) => Some(inner),
            Self::Sink(inner) => Some(inner),
            _ => None,
        }
    }
}

impl<S> fmt::Display for Error<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CannotConstructPredictor(entries) => {
                write!(f, "Cannot construct branch predictor with {entries} entries")
            }
            Self::Encode(_) => write!(f, "Cannot encode packet"),
            Self::Sink(_) => write!(f, "Cannot write packet to sink"),
        }
    }
}
