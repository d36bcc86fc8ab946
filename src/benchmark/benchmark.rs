use std::time::Instant;

use crate::simulation::forces::Gravity;
use crate::simulation::params::Parameters;
use crate::simulation::quadtree::{Extent, QuadTree};
use crate::simulation::states::ParticleStore;
use crate::simulation::system::ParticleSystem;

fn bench_parameters(n: usize, num_threads: usize) -> Parameters {
    Parameters {
        num_particles: n,
        bounds: 512.0,
        seed: 42,
        theta: 0.7,
        dt: 0.1,
        num_threads,
        eps2: 1.0e-4,
        G: 6.674_08e-11,
    }
}

/// Compare one full-sweep force evaluation, direct sum against the tree
/// walk, across system sizes.
pub fn bench_gravity() {
    let ns = [200, 400, 800, 1600, 3200, 6400];

    for n in ns {
        let params = bench_parameters(n, 1);
        let store = ParticleStore::seeded(n, params.bounds, params.seed);
        let gravity = Gravity::from_parameters(&params);

        let mut tree = QuadTree::new(Extent::centered(params.bounds));
        tree.build(&store);

        // Warm up
        for i in 0..n {
            let _ = gravity.direct(i, &store);
            let _ = gravity.barnes_hut(i, &store, &tree);
        }

        // Time direct
        let t0 = Instant::now();
        for i in 0..n {
            let _ = gravity.direct(i, &store);
        }
        let dt_direct = t0.elapsed().as_secs_f64();

        // Time barnes-hut, including the rebuild it depends on
        let t1 = Instant::now();
        tree.build(&store);
        for i in 0..n {
            let _ = gravity.barnes_hut(i, &store, &tree);
        }
        let dt_bh = t1.elapsed().as_secs_f64();

        println!("N = {n:5}, direct = {dt_direct:8.6} s, BH = {dt_bh:8.6} s");
    }
}

/// Step throughput for a fixed system size across worker counts.
pub fn bench_threads() {
    let n = 6400;
    let steps = 20;
    let thread_counts = [1, 2, 4, 8];

    for num_threads in thread_counts {
        let params = bench_parameters(n, num_threads);
        let mut system =
            ParticleSystem::from_parameters(params).expect("benchmark parameters are valid");

        // Warm up one step so the tree arena is at capacity
        system.step();

        let t0 = Instant::now();
        for _ in 0..steps {
            system.step();
        }
        let elapsed = t0.elapsed().as_secs_f64();

        println!(
            "N = {n:5}, threads = {num_threads}, {steps} steps in {elapsed:8.6} s ({:6.1} steps/s)",
            steps as f64 / elapsed,
        );
    }
}
