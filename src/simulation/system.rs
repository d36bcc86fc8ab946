//! Simulator facade
//!
//! `ParticleSystem` owns the particle store, the quadtree, the acceleration
//! buffer, and the worker pool, and drives the three step phases:
//!
//! 1. Building: the tree is rebuilt over the current positions (sequential,
//!    on the calling thread)
//! 2. Evaluating: workers compute accelerations over disjoint particle
//!    ranges, all reading the freshly built tree
//! 3. Integrating: workers advance their ranges with the semi-implicit
//!    Euler step
//!
//! The pool's done barrier closes each phase, so no worker ever reads tree
//! aggregates before the build finishes or touches particle state before
//! evaluation is over. External edits go through [`ParticleSystem::pause`],
//! whose guard holds the `&mut self` borrow; mutating while a step is in
//! flight is therefore not expressible.

use std::ops::Range;

use log::{debug, info};

use crate::error::SimError;
use crate::simulation::forces::Gravity;
use crate::simulation::integrator::semi_implicit_euler;
use crate::simulation::params::Parameters;
use crate::simulation::pool::{partition, SendPtr, WorkerPool};
use crate::simulation::quadtree::{Extent, QuadTree};
use crate::simulation::states::{NVec2, Particle, ParticleStore};

/// Where the stepping loop currently is. Outside of `step` this is always
/// `Idle`; the variants exist to make the phase ordering explicit and to
/// label the per-phase logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Building,
    Evaluating,
    Integrating,
}

pub struct ParticleSystem {
    params: Parameters,
    store: ParticleStore,
    tree: QuadTree,
    gravity: Gravity,
    accels: Vec<NVec2>, // per-body acceleration, filled during Evaluating
    ranges: Vec<Range<usize>>, // one contiguous partition per worker
    pool: WorkerPool,
    phase: Phase,
    time: f64, // accumulated simulation time
    steps: u64,
}

impl ParticleSystem {
    /// Build a system from a deserialized scenario configuration.
    pub fn new(config: &crate::configuration::config::SimulationConfig) -> Result<Self, SimError> {
        Self::from_parameters(config.parameters())
    }

    /// Build a system directly from runtime parameters.
    ///
    /// Fails with `InvalidConfiguration` for out-of-range parameters; no
    /// partial system is produced.
    pub fn from_parameters(params: Parameters) -> Result<Self, SimError> {
        params.validate()?;

        let store = ParticleStore::seeded(params.num_particles, params.bounds, params.seed);
        let tree = QuadTree::new(Extent::centered(params.bounds));
        let gravity = Gravity::from_parameters(&params);
        let accels = vec![NVec2::zeros(); store.len()];
        let ranges = partition(store.len(), params.num_threads);
        let pool = WorkerPool::new(params.num_threads);

        info!(
            "particle system ready: {} bodies, {} workers, theta = {}, dt = {}",
            store.len(),
            pool.num_threads(),
            params.theta,
            params.dt,
        );

        Ok(Self {
            params,
            store,
            tree,
            gravity,
            accels,
            ranges,
            pool,
            phase: Phase::Idle,
            time: 0.0,
            steps: 0,
        })
    }

    /// Advance the simulation by one `dt`.
    ///
    /// Runs build, evaluate, and integrate back to back; each parallel phase
    /// is closed by the pool's barrier before the next begins.
    pub fn step(&mut self) {
        self.phase = Phase::Building;
        self.tree.build(&self.store);
        debug!(
            "step {}: built {} tree nodes over {} bodies",
            self.steps,
            self.tree.len(),
            self.store.len(),
        );

        self.phase = Phase::Evaluating;
        {
            let ranges = &self.ranges;
            let store = &self.store;
            let tree = &self.tree;
            let gravity = self.gravity;
            let accels = SendPtr(self.accels.as_mut_ptr());
            self.pool.run(move |worker| {
                let range = ranges[worker].clone();
                // SAFETY: the ranges are a disjoint cover of the buffer, so
                // each worker writes its own sub-slice and nothing else.
                let out = unsafe {
                    std::slice::from_raw_parts_mut(accels.0.add(range.start), range.len())
                };
                for (a, body) in out.iter_mut().zip(range) {
                    *a = gravity.barnes_hut(body, store, tree);
                }
            });
        }

        self.phase = Phase::Integrating;
        {
            let dt = self.params.dt;
            let ranges = &self.ranges;
            let accels = &self.accels;
            let particles = SendPtr(self.store.as_mut_ptr());
            self.pool.run(move |worker| {
                let range = ranges[worker].clone();
                // SAFETY: same disjoint cover as above, over the particle
                // buffer this time.
                let slice = unsafe {
                    std::slice::from_raw_parts_mut(particles.0.add(range.start), range.len())
                };
                semi_implicit_euler(slice, &accels[range], dt);
            });
        }

        self.time += self.params.dt;
        self.steps += 1;
        self.phase = Phase::Idle;
    }

    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    /// Ordered snapshot of every body.
    pub fn particles(&self) -> &[Particle] {
        self.store.particles()
    }

    /// Every node region of the most recently built tree, root first.
    /// Empty before the first step.
    pub fn extents(&self) -> Vec<Extent> {
        self.tree.extents().collect()
    }

    /// Aggregate mass of the most recently built tree, zero before the
    /// first step.
    pub fn tree_mass(&self) -> f64 {
        self.tree.total_mass()
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Borrow the system for interactive editing.
    ///
    /// The guard holds the exclusive borrow, so no step can run while edits
    /// are being applied, and edits cannot race a step already in flight.
    pub fn pause(&mut self) -> Paused<'_> {
        Paused { system: self }
    }
}

/// Edit capability handed out by [`ParticleSystem::pause`].
///
/// All per-particle mutators live here. Index errors surface immediately
/// and leave the targeted particle untouched.
pub struct Paused<'a> {
    system: &'a mut ParticleSystem,
}

impl Paused<'_> {
    pub fn particle(&self, index: usize) -> Result<&Particle, SimError> {
        self.system.store.particle(index)
    }

    pub fn set_position(&mut self, index: usize, x: NVec2) -> Result<(), SimError> {
        self.system.store.set_position(index, x)
    }

    pub fn set_velocity(&mut self, index: usize, v: NVec2) -> Result<(), SimError> {
        self.system.store.set_velocity(index, v)
    }

    pub fn set_mass(&mut self, index: usize, m: f64) -> Result<(), SimError> {
        self.system.store.set_mass(index, m)
    }
}
