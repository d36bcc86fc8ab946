//! Gravity evaluation for the n-body engine
//!
//! `Gravity` bundles the force-law constants and exposes two per-particle
//! evaluators:
//! - `barnes_hut`, the tree-walking approximation used by the stepping loop
//! - `direct`, the exact O(n) per-particle sum kept as the reference for
//!   accuracy tests and benchmarks
//!
//! Both use the same softened Newtonian kernel, so `theta = 0` makes the
//! tree walk agree with the direct sum exactly.

use crate::simulation::params::Parameters;
use crate::simulation::quadtree::QuadTree;
use crate::simulation::states::{NVec2, ParticleStore};

/// Newtonian gravity with softening.
///
/// `eps2` is added to every squared separation so close encounters and
/// coincident bodies produce a large-but-finite pull instead of a singular
/// one.
#[allow(non_snake_case)]
#[derive(Debug, Clone, Copy)]
pub struct Gravity {
    pub G: f64, // gravitational constant
    pub eps2: f64, // softening
    pub theta: f64, // opening angle for the tree walk
}

impl Gravity {
    pub fn from_parameters(params: &Parameters) -> Self {
        Self {
            G: params.G,
            eps2: params.eps2,
            theta: params.theta,
        }
    }

    /// Acceleration on `body` via the Barnes–Hut tree walk.
    ///
    /// The tree must have been built over the same store this step; the walk
    /// only reads it, so any number of workers may call this concurrently.
    pub fn barnes_hut(&self, body: usize, store: &ParticleStore, tree: &QuadTree) -> NVec2 {
        tree.acceleration(body, store, self.G, self.eps2, self.theta)
    }

    /// Exact acceleration on `body` from every other body.
    pub fn direct(&self, body: usize, store: &ParticleStore) -> NVec2 {
        let particles = store.particles();
        let pos = particles[body].x;
        let mut acc = NVec2::zeros();

        for (other, o) in particles.iter().enumerate() {
            if other == body {
                continue;
            }
            // r points from the queried body toward the attractor
            let r = o.x - pos;
            let d2 = r.norm_squared() + self.eps2;
            let inv_r = d2.sqrt().recip();
            let inv_r3 = inv_r * inv_r * inv_r;
            acc += self.G * o.m * inv_r3 * r;
        }

        acc
    }
}
