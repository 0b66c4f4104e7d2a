// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Trace encoder
//!
//! This module provides the [`Encoder`], which turns a stream of [`Ingress`]
//! records into [`Packet`]s. It models a small hardware pipeline: each record
//! passes through two stages, and most packets are generated for the record in
//! the second stage, i.e. one call after the record was pushed. This allows
//! the encoder to know the address following a jump or trap.
//!
//! A trace segment is opened by [enabling][Encoder::set_enabled] the encoder
//! and closed by disabling it. Both events are marked by a sync packet. While
//! a segment is open, packets are generated according to the [`BranchMode`].
//!
//! # Example
//!
//! ```
//! use tacit_encoder::encoder::{self, Encoder};
//! use tacit_encoder::ingress::{Ingress, Kind};
//! use tacit_encoder::sink;
//!
//! let mut buffer = [0u8; 64];
//! let mut encoder: Encoder<_> = encoder::builder()
//!     .with_sink(sink::Slice::new(&mut buffer))
//!     .build()
//!     .unwrap();
//!
//! encoder.set_enabled(true);
//! encoder.push_ingress(Ingress::new(0x1000, 0, Kind::BranchTaken)).unwrap();
//! encoder.push_ingress(Ingress::new(0x1004, 1, Kind::BranchNotTaken)).unwrap();
//! assert_eq!(encoder.sink().written(), b"\x16\x00\x90\x80\x00");
//! ```

pub mod error;

#[cfg(test)]
mod tests;

use crate::config::{self, BranchMode};
use crate::ingress::{Ingress, Kind};
use crate::packet::{self, FHeader, Hex, Packet, TrapType};
use crate::predictor::{CounterTable, Predictor};
use crate::sink::{self, Sink};

pub use error::Error;

/// Encoder state
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq)]
pub enum State {
    /// No trace segment is open
    #[default]
    Idle,
    /// A trace segment was opened with a sync packet
    Data,
}

/// Trace encoder for a single hart
///
/// The encoder writes each [`Packet`] it generates to its [`Sink`] and
/// consults its [`Predictor`] in [`BranchMode::Prediction`].
#[derive(Clone, Debug)]
pub struct Encoder<S, P = CounterTable> {
    sink: S,
    predictor: P,
    mode: BranchMode,
    enabled: bool,
    state: State,
    /// Pipeline register holding the current record
    stage0: Ingress,
    /// Pipeline register holding the record of the previous call
    stage1: Ingress,
    prev_timestamp: u64,
    hit_count: u64,
    miss_flag: bool,
    buffer: [u8; packet::MAX_PACKET_SIZE],
}

impl<S: Sink, P: Predictor> Encoder<S, P> {
    /// Process a single [`Ingress`] record, potentially producing a packet
    ///
    /// Shifts the record into the pipeline and drives the inner state. At most
    /// one packet is generated per call. If one is, it is written to the sink
    /// and returned.
    ///
    /// If the sink fails, the error is returned. The record is still consumed
    /// and the encoder's state advanced as if the packet had been written.
    pub fn push_ingress(&mut self, ingress: Ingress) -> Result<Option<Packet>, Error<S::Error>> {
        self.stage1 = self.stage0;
        self.stage0 = ingress;

        let packet = match (self.state, self.enabled) {
            (State::Idle, false) => None,
            (State::Idle, true) => {
                self.state = State::Data;
                self.hit_count = 0;
                self.miss_flag = false;
                Some(self.sync_packet())
            }
            (State::Data, true) => match self.mode {
                BranchMode::Target => self.target_step(),
                BranchMode::Prediction => self.prediction_step(),
                BranchMode::History | BranchMode::Reserved => None,
            },
            (State::Data, false) => {
                self.state = State::Idle;
                Some(self.sync_packet())
            }
        };

        if let Some(packet) = packet.as_ref() {
            self.emit(packet)?;
        }
        Ok(packet)
    }

    /// Enable or disable tracing
    ///
    /// The change takes effect with the next call to
    /// [`push_ingress`][Self::push_ingress], which will emit a sync packet.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Determine whether tracing is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Set the [`BranchMode`]
    ///
    /// The mode should only be changed while no trace segment is open. The
    /// packets generated for a segment during which the mode changed are
    /// unspecified.
    pub fn set_mode(&mut self, mode: BranchMode) {
        self.mode = mode;
    }

    /// Retrieve the current [`BranchMode`]
    pub fn mode(&self) -> BranchMode {
        self.mode
    }

    /// Retrieve the current [`State`]
    pub fn state(&self) -> State {
        self.state
    }

    /// Retrieve the number of branch predictor hits not yet reported
    pub fn pending_hits(&self) -> u64 {
        self.hit_count
    }

    /// Reset the encoder
    ///
    /// Returns to [`State::Idle`], disables tracing, clears the pipeline and
    /// resets the [`Predictor`]. The [`BranchMode`] is retained.
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.enabled = false;
        self.stage0 = Default::default();
        self.stage1 = Default::default();
        self.predictor.reset();
        self.prev_timestamp = 0;
        self.hit_count = 0;
        self.miss_flag = false;
    }

    /// Retrieve the [`Predictor`]
    pub fn predictor(&self) -> &P {
        &self.predictor
    }

    /// Retrieve the [`Predictor`] for modification
    pub fn predictor_mut(&mut self) -> &mut P {
        &mut self.predictor
    }

    /// Retrieve the [`Sink`]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Retrieve the [`Sink`] for modification
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Destroy this encoder, retrieving the [`Sink`]
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Generate packets in [`BranchMode::Target`]
    ///
    /// Every control flow discontinuity is reported for the record in stage 1.
    fn target_step(&mut self) -> Option<Packet> {
        match self.stage1.kind {
            Kind::BranchTaken => Some(self.direct_packet(FHeader::TakenBranch)),
            Kind::BranchNotTaken => Some(self.direct_packet(FHeader::NotTaken)),
            _ => self.discontinuity_packet(),
        }
    }

    /// Generate packets in [`BranchMode::Prediction`]
    ///
    /// Stage 0 performs the branch prediction, stage 1 the packet generation.
    fn prediction_step(&mut self) -> Option<Packet> {
        let mut flush = false;
        let mut miss = false;

        // Stage 0: prediction
        if let Some(taken) = self.stage0.kind.branch_taken() {
            if self.predict(taken) {
                self.hit_count += 1;
            } else {
                flush = true;
                miss = true;
            }
        } else if self.stage0.kind != Kind::None {
            // Hits must be reported before any other discontinuity
            flush = true;
        }

        // Stage 1: packet generation
        let packet = if flush && self.hit_count > 0 {
            debug_assert!(
                matches!(
                    self.stage1.kind,
                    Kind::BranchTaken | Kind::BranchNotTaken | Kind::None
                ),
                "hit packet would displace packet for {:?}",
                self.stage1.kind,
            );
            debug_assert!(!self.miss_flag, "hit packet would displace miss packet");
            let packet = Packet::hit(self.hit_count);
            self.hit_count = 0;
            Some(packet)
        } else if self.miss_flag {
            debug_assert!(
                self.stage1.kind.is_branch(),
                "miss reported for {:?}",
                self.stage1.kind,
            );
            debug_assert!(
                self.hit_count <= 1,
                "{} hits pending during miss",
                self.hit_count,
            );
            Some(self.direct_packet(FHeader::MISS))
        } else {
            self.discontinuity_packet()
        };

        // The miss flag models a register: it only changes on the next rising
        // edge, after all reads above.
        self.miss_flag = miss;
        packet
    }

    /// Consult the predictor for the branch in stage 0
    fn predict(&mut self, taken: bool) -> bool {
        let pc = self.stage0.address;
        let hit = self.predictor.predict(pc, taken);
        tracing::trace!(
            pc,
            taken,
            hit,
            counter = ?self.predictor.peek(pc),
            "branch prediction",
        );
        hit
    }

    /// Generate a packet for a jump or trap in stage 1
    ///
    /// Branches and other records yield no packet.
    fn discontinuity_packet(&mut self) -> Option<Packet> {
        let trap_type = match self.stage1.kind {
            Kind::JumpInferable => return Some(self.direct_packet(FHeader::InferableJump)),
            Kind::JumpUninferable => {
                let address = self.xor_address();
                return Some(Packet::uninferable_jump(address, self.take_delta()));
            }
            Kind::Exception => TrapType::Exception,
            Kind::Interrupt => TrapType::Interrupt,
            Kind::TrapReturn => TrapType::TrapReturn,
            Kind::None | Kind::BranchTaken | Kind::BranchNotTaken => return None,
        };
        let address = self.xor_address();
        Some(Packet::trap(trap_type, address, self.take_delta()))
    }

    /// Generate a sync packet for the record in stage 0
    fn sync_packet(&mut self) -> Packet {
        self.prev_timestamp = self.stage0.timestamp;
        Packet::sync(self.stage0.address >> 1, self.stage0.timestamp)
    }

    /// Generate a direct packet for the record in stage 1
    fn direct_packet(&mut self, f_header: FHeader) -> Packet {
        Packet::direct(f_header, self.take_delta())
    }

    /// Compute the address field of jump and trap packets
    ///
    /// The address is the XOR of the two pipeline stages' addresses, i.e. it
    /// is relative to the jump or trapping instruction rather than to the
    /// address last reported.
    fn xor_address(&self) -> u64 {
        (self.stage0.address >> 1) ^ (self.stage1.address >> 1)
    }

    /// Compute the timestamp delta for stage 1 and advance the baseline
    fn take_delta(&mut self) -> u64 {
        let timestamp = self.stage1.timestamp;
        let delta = timestamp.wrapping_sub(self.prev_timestamp);
        self.prev_timestamp = timestamp;
        delta
    }

    /// Encode a packet and write it to the sink
    fn emit(&mut self, packet: &Packet) -> Result<(), Error<S::Error>> {
        let mut encoder = packet::Encoder::new(&mut self.buffer[..]);
        encoder.encode(packet).map_err(Error::Encode)?;
        let (data, len) = encoder.finish();
        let data = &data[..len];
        tracing::trace!(%packet, bytes = %Hex(data), "packet");
        self.sink.write_packet(data).map_err(Error::Sink)
    }
}

/// Create a new [`Builder`] for [`Encoder`]s
pub fn builder() -> Builder {
    Default::default()
}

/// Builder for [`Encoder`]s
///
/// A builder will build a single [`Encoder`] for a single hart. If multiple
/// harts are to be traced, multiple [`Encoder`]s need to be built. For this
/// purpose, [`Builder`] implements [`Copy`] and [`Clone`] as long as the
/// [`Sink`] does.
#[derive(Copy, Clone, Debug)]
pub struct Builder<S = sink::Discard> {
    sink: S,
    mode: BranchMode,
    bp_entries: usize,
}

impl Builder {
    /// Create a new builder for an [`Encoder`]
    pub fn new() -> Self {
        Default::default()
    }
}

impl<S> Builder<S> {
    /// Build the [`Encoder`] with the given [`config::Parameters`]
    ///
    /// New builders assume [`Default`] parameters.
    pub fn with_params(self, params: &config::Parameters) -> Self {
        Self {
            mode: params.br_mode,
            bp_entries: params.bp_entries,
            ..self
        }
    }

    /// Build the [`Encoder`] with the given [`Sink`]
    ///
    /// New builders carry a [`sink::Discard`]. This is usually not what you
    /// want.
    pub fn with_sink<T>(self, sink: T) -> Builder<T> {
        Builder {
            sink,
            mode: self.mode,
            bp_entries: self.bp_entries,
        }
    }

    /// Build an [`Encoder`] starting out in the given [`BranchMode`]
    pub fn with_mode(self, mode: BranchMode) -> Self {
        Self { mode, ..self }
    }

    /// Build an [`Encoder`] with a predictor of the given number of entries
    pub fn with_bp_entries(self, bp_entries: usize) -> Self {
        Self { bp_entries, ..self }
    }

    /// Build the [`Encoder`]
    ///
    /// The [`Encoder`] starts out disabled and in [`State::Idle`].
    pub fn build<P>(self) -> Result<Encoder<S, P>, Error<S::Error>>
    where
        S: Sink,
        P: Predictor,
    {
        let predictor =
            P::new(self.bp_entries).ok_or(Error::CannotConstructPredictor(self.bp_entries))?;
        Ok(Encoder {
            sink: self.sink,
            predictor,
            mode: self.mode,
            enabled: false,
            state: Default::default(),
            stage0: Default::default(),
            stage1: Default::default(),
            prev_timestamp: 0,
            hit_count: 0,
            miss_flag: false,
            buffer: [0; packet::MAX_PACKET_SIZE],
        })
    }
}

impl<S: Default> Default for Builder<S> {
    fn default() -> Self {
        Self {
            sink: Default::default(),
            mode: Default::default(),
            bp_entries: Default::default(),
        }
        .with_params(&Default::default())
    }
}
