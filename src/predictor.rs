// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Branch predictor models
//!
//! In [`BranchMode::Prediction`][crate::config::BranchMode::Prediction], the
//! [`Encoder`][crate::encoder::Encoder] only reports whether a model of a
//! branch predictor guessed the direction of a branch correctly. A decoder
//! replays the same model, so both sides need to agree on it exactly.
//!
//! This module defines the [`Predictor`] trait and the [`CounterTable`], a
//! direct-mapped table of 2-bit saturating [`Counter`]s. The table's storage
//! is pluggable via the [`Storage`] trait: arrays serve statically sized
//! tables, and with the `alloc` feature tables may be sized at runtime.


#[cfg(feature = "alloc")]
use alloc::boxed::Box;
#[cfg(feature = "alloc")]
use alloc::vec;
use core::fmt;

use crate::config::DEFAULT_BP_ENTRIES;

/// Branch predictor
///
/// A branch predictor guesses the direction of conditional branches and is
/// trained with their actual direction.
pub trait Predictor: Sized {
    /// State of a single prediction entry, for diagnostics
    type State: Copy + fmt::Debug;

    /// Create a new predictor with the given number of entries
    ///
    /// Returns [`None`] if the predictor cannot be created for `entries`, e.g.
    /// because it is zero or not supported by the implementation.
    fn new(entries: usize) -> Option<Self>;

    /// Reset all entries to their initial state
    fn reset(&mut self);

    /// Predict the branch at `pc` and train with its actual direction
    ///
    /// Returns `true` if the prediction made before training matched `taken`.
    fn predict(&mut self, pc: u64, taken: bool) -> bool;

    /// Retrieve the state of the entry used for `pc` without altering it
    fn peek(&self, pc: u64) -> Self::State;
}

/// 2-bit saturating counter
///
/// The numerical representation of the variants is the counter's value.
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub enum Counter {
    StrongNotTaken = 0,
    #[default]
    WeakNotTaken = 1,
    WeakTaken = 2,
    StrongTaken = 3,
}

impl Counter {
    /// Determine whether this counter predicts a taken branch
    pub fn is_taken(self) -> bool {
        matches!(self, Self::WeakTaken | Self::StrongTaken)
    }

    /// Count towards [`StrongTaken`][Self::StrongTaken], saturating
    pub fn increment(self) -> Self {
        match self {
            Self::StrongNotTaken => Self::WeakNotTaken,
            Self::WeakNotTaken => Self::WeakTaken,
            Self::WeakTaken | Self::StrongTaken => Self::StrongTaken,
        }
    }

    /// Count towards [`StrongNotTaken`][Self::StrongNotTaken], saturating
    pub fn decrement(self) -> Self {
        match self {
            Self::StrongTaken => Self::WeakTaken,
            Self::WeakTaken => Self::WeakNotTaken,
            Self::WeakNotTaken | Self::StrongNotTaken => Self::StrongNotTaken,
        }
    }

    /// Train this counter with the actual direction of a branch
    pub fn update(self, taken: bool) -> Self {
        if taken {
            self.increment()
        } else {
            self.decrement()
        }
    }
}

impl From<Counter> for u8 {
    fn from(counter: Counter) -> Self {
        counter as u8
    }
}

/// Backing storage for a [`CounterTable`]
pub trait Storage: AsRef<[Counter]> + AsMut<[Counter]> + Sized {
    /// Allocate storage for exactly `entries` [`Counter`]s
    ///
    /// Returns [`None`] if the storage cannot hold exactly `entries` counters.
    fn allocate(entries: usize) -> Option<Self>;
}

impl<const N: usize> Storage for [Counter; N] {
    fn allocate(entries: usize) -> Option<Self> {
        (entries == N).then_some([Counter::default(); N])
    }
}

#[cfg(feature = "alloc")]
impl Storage for Box<[Counter]> {
    fn allocate(entries: usize) -> Option<Self> {
        Some(vec![Counter::default(); entries].into_boxed_slice())
    }
}

/// Direct-mapped table of 2-bit saturating [`Counter`]s
///
/// The counter for a branch is selected by the branch's address, dropping the
/// lowest bit, modulo the number of entries. Different branches may thus
/// share a counter. All counters start out as [`Counter::WeakNotTaken`].
#[derive(Clone, Debug)]
pub struct CounterTable<S = [Counter; DEFAULT_BP_ENTRIES]> {
    counters: S,
}

/// [`CounterTable`] with a number of entries chosen at runtime
#[cfg(feature = "alloc")]
pub type BoxedTable = CounterTable<Box<[Counter]>>;

impl<S: Storage> CounterTable<S> {
    /// Retrieve the number of entries in this table
    pub fn entries(&self) -> usize {
        self.counters.as_ref().len()
    }

    /// Overwrite the counter used for `pc`
    pub fn set(&mut self, pc: u64, counter: Counter) {
        let index = self.index(pc);
        self.counters.as_mut()[index] = counter;
    }

    /// Compute the index of the counter used for `pc`
    fn index(&self, pc: u64) -> usize {
        // `entries` is never zero, and the result is smaller than `entries`
        ((pc >> 1) % self.entries() as u64) as usize
    }
}

impl<S: Storage> Predictor for CounterTable<S> {
    type State = Counter;

    fn new(entries: usize) -> Option<Self> {
        if entries == 0 {
            return None;
        }
        S::allocate(entries).map(|counters| Self { counters })
    }

    fn reset(&mut self) {
        self.counters.as_mut().fill(Counter::WeakNotTaken);
    }

    fn predict(&mut self, pc: u64, taken: bool) -> bool {
        let index = self.index(pc);
        let counter = &mut self.counters.as_mut()[index];
        let old = *counter;
        *counter = old.update(taken);
        old.is_taken() == taken
    }

    fn peek(&self, pc: u64) -> Self::State {
        self.counters.as_ref()[self.index(pc)]
    }
}
