// SPDX-License-Identifier: AGPL-3.0-only

//! Particle records and the per-worker replica of the full particle set.
//!
//! Every worker holds all `N` particles indexed by global id; ownership is
//! tracked separately by [`crate::partition::OwnershipMask`]. Categories are
//! zero-based here. Tables produced by 1-based tools convert through
//! [`Category::from_one_based`].

use crate::error::{OracleError, Result};

/// Particle type, an index into the [`crate::type_table::TypeScaleTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Category(usize);

impl Category {
    /// Zero-based category.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Convert a 1-based category label.
    ///
    /// # Errors
    ///
    /// [`OracleError::CategoryOutOfRange`] for label 0.
    pub fn from_one_based(label: usize) -> Result<Self> {
        label
            .checked_sub(1)
            .map(Self)
            .ok_or(OracleError::CategoryOutOfRange {
                category: label,
                num_types: 0,
            })
    }

    /// Zero-based index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// One simulated particle. The global id is its index in the [`ParticleSet`].
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// Current position
    pub position: [f64; 3],
    /// Position at the previous step, carried through redistribution
    pub previous_position: [f64; 3],
    /// Charge
    pub charge: f64,
    /// Type index
    pub category: Category,
}

impl Particle {
    /// Particle at rest (previous position equals current).
    #[must_use]
    pub const fn new(position: [f64; 3], charge: f64, category: Category) -> Self {
        Self {
            position,
            previous_position: position,
            charge,
            category,
        }
    }
}

/// Replica of all particles, index == global id.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleSet {
    particles: Vec<Particle>,
}

impl ParticleSet {
    /// Build a set, checking every category against `num_types`.
    ///
    /// # Errors
    ///
    /// [`OracleError::CategoryOutOfRange`] on the first bad category, or
    /// [`OracleError::IdOutOfRange`] if the set cannot be indexed by an
    /// [`crate::periodic::EncodedIndex`].
    pub fn new(particles: Vec<Particle>, num_types: usize) -> Result<Self> {
        if let Some(p) = particles.iter().find(|p| p.category.index() >= num_types) {
            return Err(OracleError::CategoryOutOfRange {
                category: p.category.index(),
                num_types,
            });
        }
        if particles.len() > crate::periodic::MAX_ID + 1 {
            return Err(OracleError::IdOutOfRange(particles.len() - 1));
        }
        Ok(Self { particles })
    }

    /// Number of particles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Particle by global id.
    #[must_use]
    pub fn get(&self, id: usize) -> Option<&Particle> {
        self.particles.get(id)
    }

    /// Mutable particle by global id.
    pub fn get_mut(&mut self, id: usize) -> Option<&mut Particle> {
        self.particles.get_mut(id)
    }

    /// All particles in id order.
    #[must_use]
    pub fn as_slice(&self) -> &[Particle] {
        &self.particles
    }

    /// Iterate particles in id order.
    pub fn iter(&self) -> std::slice::Iter<'_, Particle> {
        self.particles.iter()
    }
}
