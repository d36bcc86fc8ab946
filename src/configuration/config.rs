//! Configuration types for loading simulation scenarios from YAML.
//!
//! This module defines a thin, `serde`-deserializable representation of a
//! scenario. A scenario consists of:
//!
//! - [`SystemConfig`]  – body count, root half-width, seed, worker count
//! - [`PhysicsConfig`] – opening angle, step size, softening, G
//! - [`RunConfig`]     – how many steps the headless runner executes
//! - [`SimulationConfig`] – top-level wrapper used to load a scenario file
//!
//! # YAML format
//! An example scenario matching these types:
//!
//! ```yaml
//! simulation:
//!   num_particles: 2000
//!   bounds: 512.0          # half-width of the root square
//!   seed: 1337
//!   num_threads: 4
//!
//! physics:
//!   theta: 0.7             # opening angle; 0 -> exact n^2 evaluation
//!   dt: 0.1
//!   eps2: 1.0e-4           # optional, softening epsilon^2
//!   G: 6.67408e-11         # optional, gravitational constant
//!
//! run:
//!   steps: 500
//! ```
//!
//! Validation happens when the runtime `Parameters` are handed to the
//! simulator, not here, so a config can be assembled piecewise first.

use serde::Deserialize;

use crate::simulation::params::{Parameters, DEFAULT_EPS2, DEFAULT_G};

/// Structural configuration: how many bodies, how much space, how many
/// workers.
#[derive(Deserialize, Debug, Clone)]
pub struct SystemConfig {
    pub num_particles: usize, // total body count, including the central anchor
    pub bounds: f64, // half-width of the root extent
    pub seed: u64, // seed for the initial positions
    pub num_threads: usize, // fixed worker pool size
}

/// Numerical and physical parameters for a scenario.
#[allow(non_snake_case)]
#[derive(Deserialize, Debug, Clone)]
pub struct PhysicsConfig {
    pub theta: f64, // opening angle threshold
    pub dt: f64, // fixed step size
    pub eps2: Option<f64>, // softening, defaults to DEFAULT_EPS2
    pub G: Option<f64>, // gravitational constant, defaults to DEFAULT_G
}

/// Settings for the headless runner binary.
#[derive(Deserialize, Debug, Clone)]
pub struct RunConfig {
    pub steps: u64, // steps to execute before printing the summary
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { steps: 100 }
    }
}

/// Top-level scenario configuration loaded from YAML.
#[derive(Deserialize, Debug, Clone)]
pub struct SimulationConfig {
    pub simulation: SystemConfig,
    pub physics: PhysicsConfig,
    #[serde(default)]
    pub run: RunConfig,
}

impl SimulationConfig {
    /// Map the file-facing configuration onto runtime parameters, filling
    /// in defaults for the optional physics constants.
    pub fn parameters(&self) -> Parameters {
        Parameters {
            num_particles: self.simulation.num_particles,
            bounds: self.simulation.bounds,
            seed: self.simulation.seed,
            theta: self.physics.theta,
            dt: self.physics.dt,
            num_threads: self.simulation.num_threads,
            eps2: self.physics.eps2.unwrap_or(DEFAULT_EPS2),
            G: self.physics.G.unwrap_or(DEFAULT_G),
        }
    }
}
