// SPDX-License-Identifier: AGPL-3.0-only

//! Periodic coordinate folding and the packed particle index.
//!
//! Positions are folded into the canonical cell `[0, cycle)³` before any
//! spatial algorithm runs and restored afterwards. Each fold is recorded in a
//! 3-bit [`WrapFlags`] value (bit `d` set ⇔ axis `d` was folded) which travels
//! alongside the particle id in an [`EncodedIndex`].
//!
//! # Folding model
//!
//! | Input on axis `d`   | Wrapped           | Flag |
//! |---------------------|-------------------|------|
//! | `x < 0`             | `x + cycle`       | set  |
//! | `x >= cycle`        | `x - cycle`       | set  |
//! | otherwise           | `x`               | clear |
//!
//! Only a single fold per axis is supported: a particle more than one cycle
//! outside the cell stays outside after wrapping.
//!
//! Unwrapping cannot know which direction a flagged coordinate was folded,
//! so it uses the position inside the cell: coordinates above `cycle/2` move
//! down by one cycle, the rest move up. A flagged particle therefore recovers
//! its original coordinate exactly when that coordinate lay in
//! `(-cycle/2, 3·cycle/2]`, and modulo `cycle` otherwise.

use crate::error::{OracleError, Result};

/// Bits reserved for the particle id in the packed index.
pub const ID_BITS: u32 = 29;

/// Largest particle id that fits in an [`EncodedIndex`].
pub const MAX_ID: usize = (1 << ID_BITS) - 1;

/// Per-axis fold record (3 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WrapFlags(u8);

impl WrapFlags {
    /// No axis folded.
    pub const EMPTY: Self = Self(0);

    /// Flags from raw bits.
    ///
    /// # Errors
    ///
    /// [`OracleError::FlagsOutOfRange`] when `bits >= 8`.
    pub fn from_bits(bits: u32) -> Result<Self> {
        u8::try_from(bits)
            .ok()
            .filter(|&b| b < 8)
            .map(Self)
            .ok_or(OracleError::FlagsOutOfRange(bits))
    }

    /// Record a fold on `axis` (0, 1 or 2).
    pub fn set(&mut self, axis: usize) {
        debug_assert!(axis < 3);
        self.0 |= 1 << axis;
    }

    /// Whether `axis` was folded.
    #[must_use]
    pub const fn is_set(self, axis: usize) -> bool {
        axis < 3 && self.0 & (1 << axis) != 0
    }

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0 as u32
    }

    /// Whether no axis was folded.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Particle id plus fold flags, packed as `id | flags << 29` for interop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncodedIndex {
    id: u32,
    flags: WrapFlags,
}

impl EncodedIndex {
    /// Build an index, checking the id width.
    ///
    /// # Errors
    ///
    /// [`OracleError::IdOutOfRange`] when `id > MAX_ID`.
    pub fn new(id: usize, flags: WrapFlags) -> Result<Self> {
        if id > MAX_ID {
            return Err(OracleError::IdOutOfRange(id));
        }
        let id = u32::try_from(id).map_err(|_| OracleError::IdOutOfRange(id))?;
        Ok(Self { id, flags })
    }

    /// Global particle id.
    #[must_use]
    pub const fn id(self) -> usize {
        self.id as usize
    }

    /// Fold flags.
    #[must_use]
    pub const fn flags(self) -> WrapFlags {
        self.flags
    }

    /// Packed 32-bit layout.
    #[must_use]
    pub const fn to_bits(self) -> u32 {
        self.id | (self.flags.bits() << ID_BITS)
    }

    /// Decode the packed layout. Every `u32` is a valid encoding.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self {
            id: bits & (MAX_ID as u32),
            flags: WrapFlags((bits >> ID_BITS) as u8),
        }
    }
}

/// Cubic periodic cell of edge `cycle`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodicDomain {
    cycle: f64,
}

impl PeriodicDomain {
    /// Cell with edge `cycle`.
    ///
    /// # Errors
    ///
    /// [`OracleError::InvalidCycle`] unless `cycle` is finite and positive.
    pub fn new(cycle: f64) -> Result<Self> {
        if cycle.is_finite() && cycle > 0.0 {
            Ok(Self { cycle })
        } else {
            Err(OracleError::InvalidCycle(cycle))
        }
    }

    /// Cell edge.
    #[must_use]
    pub const fn cycle(&self) -> f64 {
        self.cycle
    }

    /// Fold `position` into the cell, recording which axes moved.
    #[must_use]
    pub fn wrap(&self, position: [f64; 3]) -> ([f64; 3], WrapFlags) {
        let mut flags = WrapFlags::EMPTY;
        let mut out = position;
        for (axis, x) in out.iter_mut().enumerate() {
            if *x < 0.0 {
                *x += self.cycle;
                flags.set(axis);
                // tiny negatives round up to exactly `cycle`
                if *x >= self.cycle {
                    *x = 0.0;
                }
            } else if *x >= self.cycle {
                *x -= self.cycle;
                flags.set(axis);
            }
        }
        (out, flags)
    }

    /// Undo [`wrap`](Self::wrap) using the recorded flags.
    #[must_use]
    pub fn unwrap(&self, position: [f64; 3], flags: WrapFlags) -> [f64; 3] {
        let mut out = position;
        let half = 0.5 * self.cycle;
        for (axis, x) in out.iter_mut().enumerate() {
            if flags.is_set(axis) {
                *x += if *x > half { -self.cycle } else { self.cycle };
            }
        }
        out
    }

    /// Nearest periodic image of a displacement.
    #[must_use]
    pub fn minimum_image(&self, d: [f64; 3]) -> [f64; 3] {
        let c = self.cycle;
        [
            d[0] - c * (d[0] / c).round(),
            d[1] - c * (d[1] / c).round(),
            d[2] - c * (d[2] / c).round(),
        ]
    }

    /// Whether `position` lies inside `[0, cycle)³`.
    #[must_use]
    pub fn contains(&self, position: [f64; 3]) -> bool {
        position.iter().all(|&x| (0.0..self.cycle).contains(&x))
    }
}
