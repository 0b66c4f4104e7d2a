// Copyright (C) 2024, 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0

//! # Encoder for compact control flow traces
//!
//! This crate implements a trace encoder for a processor core. On every
//! retired instruction, the [encoder] is fed an [ingress] record. It emits a
//! compact stream of [packet]s recording control flow discontinuities:
//! branches, jumps, traps and trap returns. Timestamps are reported as deltas
//! and jump targets as XOR against the jumping instruction's address, which
//! keeps most packets at a single byte.
//!
//! The encoder supports two [modes][config::BranchMode]:
//! - in branch target mode, every branch is reported via its own packet and
//! - in branch prediction mode, the encoder runs a [predictor] model and only
//!   reports runs of correct predictions and individual mispredictions.
//!
//! This crate is not concerned how instructions are classified or where the
//! packets end up. The latter is abstracted as a [`Sink`][sink::Sink].
//!
//! # no_std
//!
//! This crate is not dependent on the standard library. It can therefore even
//! be used in bare metal environments. Allocation is only required with the
//! `alloc` feature, which enables predictor tables sized at runtime.
//!
//! # Logging
//!
//! Emitted packets and branch predictions are logged at trace level via
//! [`tracing`]. No subscriber is installed by this crate.
//!
//! # Example
//!
//! The following example encodes a short sequence of retired instructions
//! in branch prediction mode, writing packets to a fixed buffer.
//!
//! ```
//! use tacit_encoder::config::BranchMode;
//! use tacit_encoder::encoder::{self, Encoder};
//! use tacit_encoder::ingress::{Ingress, Kind};
//! use tacit_encoder::sink;
//!
//! let mut buffer = [0u8; 64];
//! let mut encoder: Encoder<_> = encoder::builder()
//!     .with_sink(sink::Slice::new(&mut buffer))
//!     .with_mode(BranchMode::Prediction)
//!     .build()
//!     .unwrap();
//!
//! encoder.set_enabled(true);
//! let trace = [
//!     Ingress::new(0x8000_0000, 0, Kind::None),
//!     Ingress::new(0x8000_0004, 1, Kind::BranchNotTaken),
//!     Ingress::new(0x8000_0008, 2, Kind::BranchNotTaken),
//!     Ingress::new(0x8000_000c, 3, Kind::JumpUninferable),
//!     Ingress::new(0x8000_1000, 4, Kind::None),
//! ];
//! for ingress in trace {
//!     if let Some(packet) = encoder.push_ingress(ingress).unwrap() {
//!         println!("{packet}");
//!     }
//! }
//!
//! encoder.set_enabled(false);
//! encoder.push_ingress(Ingress::new(0x8000_1004, 5, Kind::None)).unwrap();
//! assert_eq!(encoder.sink().written().len(), 19);
//! ```
#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

pub mod config;
pub mod encoder;
pub mod ingress;
pub mod packet;
pub mod predictor;
pub mod sink;

pub use encoder::Encoder;
pub use ingress::Ingress;
pub use packet::Packet;
