pub mod simulation;
pub mod configuration;
pub mod benchmark;
pub mod error;

pub use simulation::states::{Particle, ParticleStore, NVec2};
pub use simulation::params::Parameters;
pub use simulation::quadtree::{Extent, QuadTree, MAX_DEPTH};
pub use simulation::forces::Gravity;
pub use simulation::integrator::semi_implicit_euler;
pub use simulation::pool::{partition, WorkerPool};
pub use simulation::system::{ParticleSystem, Paused, Phase};

pub use configuration::config::{SimulationConfig, SystemConfig, PhysicsConfig, RunConfig};
pub use error::SimError;

pub use benchmark::benchmark::{bench_gravity, bench_threads};
