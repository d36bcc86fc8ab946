//! Fixed-step time integration for the N-body system
//!
//! Semi-implicit (symplectic) Euler: the velocity update happens first and
//! the position update uses the already-updated velocity. For orbital
//! motion this keeps the energy error bounded over long runs, where the
//! explicit variant drifts steadily outward.

use crate::simulation::states::{NVec2, Particle};

/// Advance a slice of particles by one step given their accelerations.
///
/// Purely local per particle, so disjoint slices can be integrated from
/// different workers at the same time. `accels[i]` must correspond to
/// `particles[i]`.
pub fn semi_implicit_euler(particles: &mut [Particle], accels: &[NVec2], dt: f64) {
    debug_assert_eq!(particles.len(), accels.len());

    for (p, a) in particles.iter_mut().zip(accels.iter()) {
        // Kick then drift: v_n+1 = v_n + dt a_n, x_n+1 = x_n + dt v_n+1
        p.v += *a * dt;
        p.x += p.v * dt;
    }
}
