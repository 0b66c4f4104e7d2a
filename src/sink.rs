// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Destinations for encoded trace data
//!
//! The [`Encoder`][crate::encoder::Encoder] hands each encoded packet to a
//! [`Sink`] as a whole. Sinks only need to append data; they are never asked
//! to seek or to retract data.
//!
//! Besides the adapter for [`FnMut`]s created via [`from_fn`], this module
//! provides a [`Slice`] sink for writing into a fixed buffer and a [`Discard`]
//! sink. With the `alloc`
//! feature, [`Vec<u8>`] may serve as a sink directly.
//!
//! # Example
//!
//! The following writes the trace to a file:
//!
//! ```no_run
//! use std::io::Write;
//!
//! use tacit_encoder::encoder::{self, Encoder};
//! use tacit_encoder::sink;
//!
//! let mut file = std::fs::File::create("tacit.out")?;
//! let encoder: Encoder<_> = encoder::builder()
//!     .with_sink(sink::from_fn(|data: &[u8]| file.write_all(data)))
//!     .build()
//!     .unwrap();
//! # drop(encoder);
//! # Ok::<(), std::io::Error>(())
//! ```


#[cfg(feature = "alloc")]
use alloc::vec::Vec;
use core::fmt;

/// Append-only destination for encoded packets
pub trait Sink {
    /// Error type returned by [`write_packet`][Self::write_packet]
    type Error;

    /// Append the data of a single encoded packet
    fn write_packet(&mut self, data: &[u8]) -> Result<(), Self::Error>;
}

impl<S: Sink + ?Sized> Sink for &mut S {
    type Error = S::Error;

    fn write_packet(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        (**self).write_packet(data)
    }
}

#[cfg(feature = "alloc")]
impl Sink for Vec<u8> {
    type Error = core::convert::Infallible;

    fn write_packet(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.extend_from_slice(data);
        Ok(())
    }
}

/// [`Sink`] discarding all data
#[derive(Copy, Clone, Default, Debug)]
pub struct Discard;

impl Sink for Discard {
    type Error = core::convert::Infallible;

    fn write_packet(&mut self, _: &[u8]) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// [`Sink`] adapter for an [`FnMut`]
///
/// This forwards calls to [`Sink::write_packet`] to the wrapped [`FnMut`].
#[derive(Copy, Clone, Default, Debug)]
pub struct Func<F: FnMut(&[u8]) -> Result<(), E>, E> {
    func: F,
    phantom: core::marker::PhantomData<E>,
}

impl<F: FnMut(&[u8]) -> Result<(), E>, E> Func<F, E> {
    /// Create a new [`Sink`] from an [`FnMut`]
    fn new(func: F) -> Self {
        Self {
            func,
            phantom: Default::default(),
        }
    }
}

impl<F: FnMut(&[u8]) -> Result<(), E>, E> Sink for Func<F, E> {
    type Error = E;

    fn write_packet(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        (self.func)(data)
    }
}

/// Create a [`Func`] [`Sink`] from an [`FnMut`]
pub fn from_fn<F: FnMut(&[u8]) -> Result<(), E>, E>(func: F) -> Func<F, E> {
    Func::new(func)
}

/// [`Sink`] writing into a fixed buffer
///
/// Packets which do not fit into the remaining space are rejected as a whole
/// with [`Full`].
#[derive(Debug)]
pub struct Slice<'a> {
    data: &'a mut [u8],
    len: usize,
}

impl<'a> Slice<'a> {
    /// Create a new [`Sink`] writing to the given buffer
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data, len: 0 }
    }

    /// Retrieve the data written so far
    pub fn written(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Retrieve the number of bytes written so far
    pub fn len(&self) -> usize {
        self.len
    }

    /// Determine whether nothing was written yet
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Sink for Slice<'_> {
    type Error = Full;

    fn write_packet(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        let end = self.len + data.len();
        let target = self.data.get_mut(self.len..end).ok_or(Full)?;
        target.copy_from_slice(data);
        self.len = end;
        Ok(())
    }
}

/// The buffer of a [`Slice`] sink is exhausted
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Full;

impl core::error::Error for Full {}

impl fmt::Display for Full {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trace buffer is full")
    }
}
