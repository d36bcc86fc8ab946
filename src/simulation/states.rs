//! Core state types for the N-body simulation.
//!
//! Defines the particle representation and the index-stable store that owns
//! every body for the simulation's lifetime:
//! - `Particle` using `NVec2` (position, velocity, mass)
//! - `ParticleStore`, a flat collection with checked per-index access
//!
//! Indices handed out by the store stay valid until the simulator is dropped;
//! bodies are never added, removed, or reordered after construction.

use nalgebra::Vector2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::SimError;

pub type NVec2 = Vector2<f64>;

/// Mass given to every seeded body.
pub const DEFAULT_BODY_MASS: f64 = 5.0e6;
/// Mass of the anchor body placed at the origin.
pub const CENTRAL_BODY_MASS: f64 = 1.0e12;

#[derive(Debug, Clone)]
pub struct Particle {
    pub x: NVec2, // position
    pub v: NVec2, // velocity
    pub m: f64, // mass, strictly positive
}

/// Flat, index-stable collection of bodies.
#[derive(Debug, Clone)]
pub struct ParticleStore {
    particles: Vec<Particle>,
}

impl ParticleStore {
    /// Create `num_particles` bodies (at least one): `num_particles - 1` at
    /// uniformly random positions inside the square of half-width `bounds`,
    /// plus one heavy body at the origin that anchors the cloud. All initial
    /// velocities are zero; the caller sets velocities afterwards if orbital
    /// motion is wanted.
    pub fn seeded(num_particles: usize, bounds: f64, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut particles = Vec::with_capacity(num_particles);
        for _ in 1..num_particles {
            particles.push(Particle {
                x: NVec2::new(
                    rng.gen_range(-bounds..bounds),
                    rng.gen_range(-bounds..bounds),
                ),
                v: NVec2::zeros(),
                m: DEFAULT_BODY_MASS,
            });
        }
        particles.push(Particle {
            x: NVec2::zeros(),
            v: NVec2::zeros(),
            m: CENTRAL_BODY_MASS,
        });
        Self { particles }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Full ordered snapshot, suitable for rendering.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particle(&self, index: usize) -> Result<&Particle, SimError> {
        let len = self.particles.len();
        self.particles
            .get(index)
            .ok_or(SimError::IndexOutOfRange { index, len })
    }

    pub fn set_position(&mut self, index: usize, x: NVec2) -> Result<(), SimError> {
        self.particle_mut(index)?.x = x;
        Ok(())
    }

    pub fn set_velocity(&mut self, index: usize, v: NVec2) -> Result<(), SimError> {
        self.particle_mut(index)?.v = v;
        Ok(())
    }

    /// Overwrite a body's mass. Masses must stay strictly positive, otherwise
    /// the tree aggregates lose their meaning.
    pub fn set_mass(&mut self, index: usize, m: f64) -> Result<(), SimError> {
        if !(m > 0.0 && m.is_finite()) {
            return Err(SimError::InvalidConfiguration {
                reason: format!("particle mass must be positive and finite, got {m}"),
            });
        }
        self.particle_mut(index)?.m = m;
        Ok(())
    }

    fn particle_mut(&mut self, index: usize) -> Result<&mut Particle, SimError> {
        let len = self.particles.len();
        self.particles
            .get_mut(index)
            .ok_or(SimError::IndexOutOfRange { index, len })
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut Particle {
        self.particles.as_mut_ptr()
    }
}
