//! Numerical and physical parameters for the simulation
//!
//! `Parameters` holds everything fixed at construction:
//! - particle count, root half-width and random seed,
//! - opening angle `theta` and integration step `dt`,
//! - worker thread count,
//! - softening and gravitational constant (`eps2`, `G`)
//!
//! Rebuilding the simulator is the only way to change any of these.

use crate::error::SimError;

/// Softening floor used when a scenario does not specify one.
pub const DEFAULT_EPS2: f64 = 1.0e-4;
/// Newtonian gravitational constant, SI units.
pub const DEFAULT_G: f64 = 6.674_08e-11;

#[allow(non_snake_case)]
#[derive(Debug, Clone)]
pub struct Parameters {
    pub num_particles: usize, // total body count, including the central anchor
    pub bounds: f64, // half-width of the root extent, centered on the origin
    pub seed: u64, // deterministic seed
    pub theta: f64, // opening angle; 0 degenerates to the exact n^2 sum
    pub dt: f64, // fixed step size
    pub num_threads: usize, // worker pool size
    pub eps2: f64, // softening added to squared separations
    pub G: f64, // gravitational constant
}

impl Parameters {
    /// Reject out-of-range parameters before anything is built.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.num_particles == 0 {
            return Self::invalid("num_particles must be at least 1");
        }
        if self.num_threads == 0 {
            return Self::invalid("num_threads must be at least 1");
        }
        if !(self.bounds > 0.0 && self.bounds.is_finite()) {
            return Self::invalid("bounds must be positive and finite");
        }
        if !(self.theta >= 0.0 && self.theta.is_finite()) {
            return Self::invalid("theta must be non-negative and finite");
        }
        if !(self.dt > 0.0 && self.dt.is_finite()) {
            return Self::invalid("dt must be positive and finite");
        }
        if !(self.eps2 >= 0.0 && self.eps2.is_finite()) {
            return Self::invalid("eps2 must be non-negative and finite");
        }
        if !self.G.is_finite() {
            return Self::invalid("G must be finite");
        }
        Ok(())
    }

    fn invalid(reason: &str) -> Result<(), SimError> {
        Err(SimError::InvalidConfiguration {
            reason: reason.to_string(),
        })
    }
}
