//! A two-rank run must reproduce the serial run: the kernel reads only its
//! own pre-step state plus exchanged halos, so rank count cannot change the
//! arithmetic.

use lbm_cascade::comm::LocalComm;
use lbm_cascade::model::Q;
use lbm_cascade::prelude::*;
use serial_test::serial;
use std::collections::HashMap;

fn config(rank_grid: RankGridConfig) -> SolverConfig {
    SolverConfig {
        domain: DomainConfig { nx: 8, ny: 8 },
        rank_grid,
        viscosity: 0.02,
        reference_velocity: 0.0,
        regions: vec![RegionConfig {
            level: 1,
            region: 0,
            x0: 2,
            x1: 6,
            y0: 2,
            y1: 6,
        }],
        body: BodyCase::None,
        body_level: 0,
        body_region: 0,
        structural: Default::default(),
        steps: 3,
        report_every: 100,
        restart: false,
    }
}

fn perturb<C: Communicator>(sim: &mut Simulation<C>) {
    let root_id = sim.hierarchy.root;
    let root = sim.hierarchy.node_mut(root_id).unwrap();
    for i in 0..root.field.nx() + 2 {
        for j in 0..root.field.ny() + 2 {
            let s = root.field.idx(i, j);
            let (gx, gy) = root.global_of_local(i, j);
            // periodic global coordinate keyed perturbation, identical on
            // every rank and in every decomposition
            let (gx, gy) = (gx.rem_euclid(8), gy.rem_euclid(8));
            let rho = 1.0 + 0.01 * ((gx * 5 + gy * 3) % 7) as f64;
            for q in 0..Q {
                root.field.f[s][q] = lbm_cascade::model::equilibrium(q, rho, [0.0; 2]);
            }
            root.field.recompute_moments(s);
        }
    }
}

/// Run on the given communicator and return the root field keyed by global
/// cell coordinates.
fn run<C: Communicator>(comm: C) -> HashMap<(i64, i64), (f64, [f64; 2])> {
    let grid = if comm.size() == 1 {
        RankGridConfig { px: 1, py: 1 }
    } else {
        RankGridConfig { px: 2, py: 1 }
    };
    let mut sim = Simulation::new(config(grid), comm).unwrap();
    perturb(&mut sim);
    sim.run().unwrap();
    let root = sim.hierarchy.node(sim.hierarchy.root).unwrap();
    let mut out = HashMap::new();
    for j in 1..=root.field.ny() {
        for i in 1..=root.field.nx() {
            let s = root.field.idx(i, j);
            let g = root.global_of_local(i, j);
            out.insert(g, (root.field.rho[s], root.field.u[s]));
        }
    }
    out
}

#[test]
#[serial]
fn two_ranks_reproduce_the_serial_fields() {
    LocalComm::reset_mailbox();
    let serial_fields = run(NoComm);

    let world = LocalComm::world(2);
    let handles: Vec<_> = world
        .into_iter()
        .map(|comm| std::thread::spawn(move || run(comm)))
        .collect();
    let mut distributed = HashMap::new();
    for h in handles {
        distributed.extend(h.join().unwrap());
    }

    assert_eq!(serial_fields.len(), distributed.len());
    for (g, (rho, u)) in &serial_fields {
        let (drho, du) = distributed[g];
        assert!(
            (rho - drho).abs() < 1e-12,
            "density diverged at cell {g:?}"
        );
        assert!((u[0] - du[0]).abs() < 1e-12);
        assert!((u[1] - du[1]).abs() < 1e-12);
    }
}
