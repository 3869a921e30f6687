//! Single level, single rank, no immersed boundary: a uniform equilibrium
//! field is a fixed point of the collision-stream kernel.

use approx::assert_abs_diff_eq;
use lbm_cascade::prelude::*;

fn config(nx: usize, ny: usize) -> SolverConfig {
    SolverConfig {
        domain: DomainConfig { nx, ny },
        rank_grid: RankGridConfig { px: 1, py: 1 },
        viscosity: 0.02,
        reference_velocity: 0.0,
        regions: vec![],
        body: BodyCase::None,
        body_level: 0,
        body_region: 0,
        structural: Default::default(),
        steps: 5,
        report_every: 100,
        restart: false,
    }
}

#[test]
fn uniform_equilibrium_is_stationary_across_macro_steps() {
    let mut sim = Simulation::new(config(8, 8), NoComm).unwrap();
    let before = sim.hierarchy.node(sim.hierarchy.root).unwrap().field.f.clone();
    sim.run().unwrap();

    let root = sim.hierarchy.node(sim.hierarchy.root).unwrap();
    for (a, b) in root.field.f.iter().zip(&before) {
        for q in 0..a.len() {
            assert_abs_diff_eq!(a[q], b[q], epsilon = 1e-13);
        }
    }
    for s in root.field.owned_indices() {
        assert_abs_diff_eq!(root.field.rho[s], 1.0, epsilon = 1e-13);
        assert_abs_diff_eq!(root.field.u[s][0], 0.0, epsilon = 1e-13);
        assert_abs_diff_eq!(root.field.u[s][1], 0.0, epsilon = 1e-13);
    }
}

#[test]
fn averages_of_a_stationary_field_equal_the_field() {
    let mut sim = Simulation::new(config(6, 6), NoComm).unwrap();
    sim.run().unwrap();
    let root = sim.hierarchy.node(sim.hierarchy.root).unwrap();
    assert_eq!(root.field.samples, 5);
    for s in root.field.owned_indices() {
        assert_abs_diff_eq!(root.field.avg_rho[s], 1.0, epsilon = 1e-13);
        assert_abs_diff_eq!(root.field.avg_u[s][0], 0.0, epsilon = 1e-13);
    }
}
