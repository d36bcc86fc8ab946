use quadsim::simulation::forces::Gravity;
use quadsim::simulation::params::Parameters;
use quadsim::simulation::pool::{partition, WorkerPool};
use quadsim::simulation::quadtree::{Extent, QuadTree};
use quadsim::simulation::states::{NVec2, ParticleStore};
use quadsim::simulation::system::{ParticleSystem, Phase};
use quadsim::{SimError, SimulationConfig};

use std::sync::atomic::{AtomicUsize, Ordering};

/// Runtime parameters for a small deterministic system
fn test_params(num_particles: usize, num_threads: usize) -> Parameters {
    Parameters {
        num_particles,
        bounds: 100.0,
        seed: 42,
        theta: 0.5,
        dt: 0.01,
        num_threads,
        eps2: 1.0e-4,
        G: 6.674_08e-11,
    }
}

/// Seeded store over the default test extent
fn seeded_store(n: usize) -> ParticleStore {
    ParticleStore::seeded(n, 100.0, 42)
}

/// Sum of every particle mass in the store
fn store_mass(store: &ParticleStore) -> f64 {
    store.particles().iter().map(|p| p.m).sum()
}

/// System with exactly two unit masses at (-d/2, 0) and (d/2, 0), at rest
fn two_body_system(d: f64, g: f64, eps2: f64, theta: f64, dt: f64) -> ParticleSystem {
    let params = Parameters {
        num_particles: 2,
        bounds: 10.0,
        seed: 7,
        theta,
        dt,
        num_threads: 1,
        eps2,
        G: g,
    };
    let mut sys = ParticleSystem::from_parameters(params).unwrap();

    let mut edit = sys.pause();
    edit.set_position(0, NVec2::new(-d / 2.0, 0.0)).unwrap();
    edit.set_velocity(0, NVec2::zeros()).unwrap();
    edit.set_mass(0, 1.0).unwrap();
    edit.set_position(1, NVec2::new(d / 2.0, 0.0)).unwrap();
    edit.set_velocity(1, NVec2::zeros()).unwrap();
    edit.set_mass(1, 1.0).unwrap();

    sys
}

/// Total mechanical energy of a two-body system (no softening)
fn two_body_energy(sys: &ParticleSystem, g: f64) -> f64 {
    let p = sys.particles();
    let kinetic = 0.5 * p[0].m * p[0].v.norm_squared() + 0.5 * p[1].m * p[1].v.norm_squared();
    let d = (p[1].x - p[0].x).norm();
    kinetic - g * p[0].m * p[1].m / d
}

// ==================================================================================
// Quadtree tests
// ==================================================================================

#[test]
fn tree_conserves_total_mass_across_rebuilds() {
    let mut store = seeded_store(500);
    let expected = store_mass(&store);

    let mut tree = QuadTree::new(Extent::centered(100.0));
    tree.build(&store);
    assert!(
        (tree.total_mass() - expected).abs() <= 1e-9 * expected,
        "root mass {} != particle mass {}",
        tree.total_mass(),
        expected
    );

    // Move a body and rebuild; the aggregate must follow.
    store.set_position(3, NVec2::new(55.0, -12.0)).unwrap();
    tree.build(&store);
    assert!((tree.total_mass() - expected).abs() <= 1e-9 * expected);
}

#[test]
fn every_body_lands_in_exactly_one_leaf() {
    let store = seeded_store(400);
    let mut tree = QuadTree::new(Extent::centered(100.0));
    tree.build(&store);

    let mut seen = vec![0usize; store.len()];
    for node in &tree.nodes {
        if !node.bodies.is_empty() {
            assert!(node.is_leaf(), "internal node holds bodies directly");
        }
        for &body in &node.bodies {
            seen[body] += 1;
            let clamped = tree.root_extent().clamp(&store.particles()[body].x);
            assert!(
                node.extent.contains(&clamped),
                "body {} indexed outside its leaf region",
                body
            );
        }
    }
    assert!(seen.iter().all(|&count| count == 1), "cover is not exact: {seen:?}");
}

#[test]
fn coincident_bodies_share_a_depth_capped_leaf() {
    let mut store = seeded_store(3);
    store.set_position(0, NVec2::new(1.0, 1.0)).unwrap();
    store.set_position(1, NVec2::new(1.0, 1.0)).unwrap();
    store.set_position(2, NVec2::new(-5.0, -5.0)).unwrap();
    store.set_mass(0, 3.0).unwrap();
    store.set_mass(1, 5.0).unwrap();

    let mut tree = QuadTree::new(Extent::centered(10.0));
    tree.build(&store);

    let shared = tree
        .nodes
        .iter()
        .find(|node| node.bodies.len() == 2)
        .expect("coincident bodies did not end up in a shared leaf");
    assert!((shared.mass - 8.0).abs() < 1e-12, "merged leaf mass {}", shared.mass);
    assert!((tree.total_mass() - store_mass(&store)).abs() <= 1e-9 * store_mass(&store));
}

#[test]
fn out_of_bounds_bodies_are_still_indexed() {
    let mut store = seeded_store(50);
    store.set_position(0, NVec2::new(1.0e6, -2.0e6)).unwrap();

    let mut tree = QuadTree::new(Extent::centered(100.0));
    tree.build(&store);

    let mut seen = 0;
    for node in &tree.nodes {
        seen += node.bodies.iter().filter(|&&b| b == 0).count();
    }
    assert_eq!(seen, 1, "drifted body must be indexed exactly once");
    assert!((tree.total_mass() - store_mass(&store)).abs() <= 1e-9 * store_mass(&store));
    // The true position is not touched by the clamp-for-indexing policy.
    assert_eq!(store.particles()[0].x, NVec2::new(1.0e6, -2.0e6));
}

#[test]
fn extents_start_at_the_root_region() {
    let store = seeded_store(64);
    let mut tree = QuadTree::new(Extent::centered(100.0));
    assert_eq!(tree.extents().count(), 0);

    tree.build(&store);
    let extents: Vec<Extent> = tree.extents().collect();
    assert_eq!(extents.len(), tree.len());
    assert_eq!(extents[0], Extent::centered(100.0));
}

// ==================================================================================
// Force evaluation tests
// ==================================================================================

#[test]
fn theta_zero_matches_the_direct_sum() {
    let store = seeded_store(150);
    let mut tree = QuadTree::new(Extent::centered(100.0));
    tree.build(&store);

    let gravity = Gravity {
        G: 6.674_08e-11,
        eps2: 1.0e-4,
        theta: 0.0,
    };

    for i in 0..store.len() {
        let exact = gravity.direct(i, &store);
        let walked = gravity.barnes_hut(i, &store, &tree);
        let err = (walked - exact).norm();
        assert!(
            err <= 1e-10 * (1.0 + exact.norm()),
            "body {i}: tree walk {walked:?} vs direct {exact:?}"
        );
    }
}

#[test]
fn force_error_shrinks_with_theta() {
    let store = seeded_store(300);
    let mut tree = QuadTree::new(Extent::centered(100.0));
    tree.build(&store);

    let thetas = [1.2, 0.6, 0.3, 0.0];
    let mut previous = f64::INFINITY;

    for theta in thetas {
        let gravity = Gravity {
            G: 6.674_08e-11,
            eps2: 1.0e-4,
            theta,
        };
        let mut total_err = 0.0;
        for i in 0..store.len() {
            let exact = gravity.direct(i, &store);
            let walked = gravity.barnes_hut(i, &store, &tree);
            total_err += (walked - exact).norm() / (1.0 + exact.norm());
        }
        let mean_err = total_err / store.len() as f64;
        assert!(
            mean_err <= previous + 1e-12,
            "error grew when tightening theta to {theta}: {mean_err} > {previous}"
        );
        previous = mean_err;
    }

    // theta = 0 is the exact evaluation
    assert!(previous <= 1e-10, "theta = 0 left residual error {previous}");
}

#[test]
fn gravity_newton_third_law() {
    let mut store = seeded_store(2);
    store.set_position(0, NVec2::new(-0.5, 0.0)).unwrap();
    store.set_position(1, NVec2::new(0.5, 0.3)).unwrap();
    store.set_mass(0, 2.0).unwrap();
    store.set_mass(1, 3.0).unwrap();

    let gravity = Gravity {
        G: 0.1,
        eps2: 0.0,
        theta: 0.0,
    };
    let a0 = gravity.direct(0, &store);
    let a1 = gravity.direct(1, &store);

    let net = a0 * store.particles()[0].m + a1 * store.particles()[1].m;
    assert!(net.norm() < 1e-12, "net momentum change not zero: {net:?}");
}

#[test]
fn gravity_softening_prevents_blowup() {
    let mut store = seeded_store(2);
    store.set_position(0, NVec2::new(0.0, 0.0)).unwrap();
    store.set_position(1, NVec2::new(1.0e-9, 0.0)).unwrap();
    store.set_mass(0, 1.0).unwrap();
    store.set_mass(1, 1.0).unwrap();

    let gravity = Gravity {
        G: 1.0,
        eps2: 0.1,
        theta: 0.0,
    };
    let a0 = gravity.direct(0, &store);
    assert!(a0.norm() < 100.0, "softening failed, acceleration {}", a0.norm());
}

#[test]
fn single_body_feels_no_force() {
    let store = seeded_store(1);
    let mut tree = QuadTree::new(Extent::centered(100.0));
    tree.build(&store);

    let gravity = Gravity {
        G: 1.0,
        eps2: 0.0,
        theta: 0.5,
    };
    assert_eq!(gravity.barnes_hut(0, &store, &tree), NVec2::zeros());
    assert_eq!(gravity.direct(0, &store), NVec2::zeros());
}

// ==================================================================================
// Integrator tests
// ==================================================================================

#[test]
fn integration_uses_the_updated_velocity() {
    let mut store = seeded_store(1);
    store.set_position(0, NVec2::zeros()).unwrap();
    store.set_velocity(0, NVec2::new(1.0, 0.0)).unwrap();

    let mut particles = store.particles().to_vec();
    let accels = vec![NVec2::new(0.0, 2.0)];
    quadsim::semi_implicit_euler(&mut particles, &accels, 0.5);

    // v = (1, 0) + 0.5 (0, 2) = (1, 1); x = 0.5 v
    assert_eq!(particles[0].v, NVec2::new(1.0, 1.0));
    assert_eq!(particles[0].x, NVec2::new(0.5, 0.5));
}

// ==================================================================================
// Worker pool tests
// ==================================================================================

#[test]
fn partition_is_an_exact_cover() {
    for (n, k) in [(10, 3), (2, 4), (7, 7), (5, 1), (0, 2), (100, 8)] {
        let ranges = partition(n, k);
        assert_eq!(ranges.len(), k);

        let mut next = 0;
        for range in &ranges {
            assert_eq!(range.start, next, "ranges must be contiguous");
            next = range.end;
        }
        assert_eq!(next, n, "ranges must cover every index");

        let lens: Vec<usize> = ranges.iter().map(|r| r.len()).collect();
        let max = lens.iter().max().unwrap();
        let min = lens.iter().min().unwrap();
        assert!(max - min <= 1, "unbalanced partition for n={n}, k={k}: {lens:?}");
    }
}

#[test]
fn pool_runs_every_worker_each_dispatch() {
    let pool = WorkerPool::new(4);
    let counts: Vec<AtomicUsize> = (0..4).map(|_| AtomicUsize::new(0)).collect();

    pool.run(|worker| {
        counts[worker].fetch_add(1, Ordering::SeqCst);
    });
    assert!(counts.iter().all(|c| c.load(Ordering::SeqCst) == 1));

    // Workers are reused, not respawned.
    pool.run(|worker| {
        counts[worker].fetch_add(1, Ordering::SeqCst);
    });
    assert!(counts.iter().all(|c| c.load(Ordering::SeqCst) == 2));
}

// ==================================================================================
// System tests
// ==================================================================================

#[test]
fn construction_rejects_bad_parameters() {
    let cases = [
        Parameters { num_particles: 0, ..test_params(10, 2) },
        Parameters { num_threads: 0, ..test_params(10, 2) },
        Parameters { bounds: 0.0, ..test_params(10, 2) },
        Parameters { bounds: -3.0, ..test_params(10, 2) },
        Parameters { theta: -0.1, ..test_params(10, 2) },
        Parameters { dt: 0.0, ..test_params(10, 2) },
        Parameters { eps2: -1.0, ..test_params(10, 2) },
        Parameters { G: f64::NAN, ..test_params(10, 2) },
    ];

    for params in cases {
        let result = ParticleSystem::from_parameters(params.clone());
        assert!(
            matches!(result, Err(SimError::InvalidConfiguration { .. })),
            "accepted bad parameters: {params:?}"
        );
    }
}

#[test]
fn index_errors_surface_from_the_edit_guard() {
    let mut sys = ParticleSystem::from_parameters(test_params(4, 1)).unwrap();
    let mut edit = sys.pause();

    match edit.set_mass(99, 1.0) {
        Err(SimError::IndexOutOfRange { index, len }) => {
            assert_eq!(index, 99);
            assert_eq!(len, 4);
        }
        other => panic!("expected IndexOutOfRange, got {other:?}"),
    }
    assert!(matches!(
        edit.particle(4),
        Err(SimError::IndexOutOfRange { .. })
    ));
}

#[test]
fn extents_are_empty_before_the_first_step() {
    let mut sys = ParticleSystem::from_parameters(test_params(32, 2)).unwrap();
    assert!(sys.extents().is_empty());
    assert_eq!(sys.phase(), Phase::Idle);

    sys.step();
    let extents = sys.extents();
    assert!(!extents.is_empty());
    assert_eq!(extents[0], Extent::centered(100.0));
    assert_eq!(sys.phase(), Phase::Idle);
    assert_eq!(sys.steps(), 1);
}

#[test]
fn two_bodies_fall_toward_each_other() {
    // Unit masses at (-1, 0) and (1, 0), no softening, exact evaluation.
    let mut sys = two_body_system(2.0, 1.0, 0.0, 0.0, 0.01);
    sys.step();

    let p = sys.particles();
    // a = G m / d^2 = 0.25, so v = 0.0025 after one step
    assert!((p[0].v.x - 0.0025).abs() < 1e-15, "v0 = {:?}", p[0].v);
    assert_eq!(p[0].v.x, -p[1].v.x, "velocities must be symmetric");
    assert_eq!(p[0].v.y, 0.0);
    assert_eq!(p[1].v.y, 0.0);

    // Positions move inward by v dt with the updated velocity.
    assert!((p[0].x.x - (-1.0 + 0.0025 * 0.01)).abs() < 1e-15);
    assert!((p[1].x.x - (1.0 - 0.0025 * 0.01)).abs() < 1e-15);
    assert!((sys.time() - 0.01).abs() < 1e-15);
}

#[test]
fn trajectories_agree_across_thread_counts() {
    let steps = 50;

    let mut single = ParticleSystem::from_parameters(test_params(300, 1)).unwrap();
    let mut pooled = ParticleSystem::from_parameters(test_params(300, 4)).unwrap();

    for _ in 0..steps {
        single.step();
        pooled.step();
    }

    for (a, b) in single.particles().iter().zip(pooled.particles()) {
        assert!(
            (a.x - b.x).norm() < 1e-9 && (a.v - b.v).norm() < 1e-9,
            "thread count changed the physics: {:?} vs {:?}",
            a.x,
            b.x
        );
    }
}

#[test]
fn circular_orbit_energy_stays_bounded() {
    let g = 1.0;
    let mut sys = two_body_system(1.0, g, 0.0, 0.0, 1.0e-3);

    // Circular orbit about the barycenter: v^2 / r = G m / d^2 with r = d/2.
    let v = (g * 1.0 / 2.0).sqrt();
    {
        let mut edit = sys.pause();
        edit.set_velocity(0, NVec2::new(0.0, v)).unwrap();
        edit.set_velocity(1, NVec2::new(0.0, -v)).unwrap();
    }

    let initial = two_body_energy(&sys, g);
    for _ in 0..2000 {
        sys.step();
    }
    let drift = (two_body_energy(&sys, g) - initial).abs();

    assert!(
        drift < 0.01 * initial.abs(),
        "energy drifted by {drift} from {initial}"
    );
}

#[test]
fn mass_edit_round_trips_into_the_next_step() {
    let heavier = 5.0e11;

    let mut edited = ParticleSystem::from_parameters(test_params(8, 1)).unwrap();
    let mut reference = ParticleSystem::from_parameters(test_params(8, 1)).unwrap();
    let mut untouched = ParticleSystem::from_parameters(test_params(8, 1)).unwrap();

    {
        let mut edit = edited.pause();
        edit.set_mass(0, heavier).unwrap();
        assert_eq!(edit.particle(0).unwrap().m, heavier);
    }
    {
        let mut edit = reference.pause();
        edit.set_mass(0, heavier).unwrap();
    }

    edited.step();
    reference.step();
    untouched.step();

    // Identical state and identical edit: the step must agree exactly.
    for (a, b) in edited.particles().iter().zip(reference.particles()) {
        assert_eq!(a.x, b.x);
        assert_eq!(a.v, b.v);
    }

    // The heavier body must pull its neighbours differently than before.
    let moved = edited
        .particles()
        .iter()
        .zip(untouched.particles())
        .any(|(a, b)| (a.x - b.x).norm() > 1e-12);
    assert!(moved, "mass edit had no effect on the following step");
}

// ==================================================================================
// Configuration tests
// ==================================================================================

#[test]
fn scenario_yaml_fills_physics_defaults() {
    let yaml = "
simulation:
  num_particles: 128
  bounds: 64.0
  seed: 9
  num_threads: 2

physics:
  theta: 0.8
  dt: 0.05
";
    let config: SimulationConfig = serde_yaml::from_str(yaml).unwrap();
    let params = config.parameters();

    assert_eq!(params.num_particles, 128);
    assert_eq!(params.num_threads, 2);
    assert_eq!(params.theta, 0.8);
    assert_eq!(params.eps2, 1.0e-4);
    assert!((params.G - 6.674_08e-11).abs() < 1e-25);
    assert_eq!(config.run.steps, 100);

    let sys = ParticleSystem::new(&config).unwrap();
    assert_eq!(sys.particles().len(), 128);
}
