//! Immersed-boundary force conservation: the force spread onto the lattice
//! equals the force computed at the markers, including when a marker's
//! support spans a rank boundary (the reduction must sum each contribution
//! exactly once).

use lbm_cascade::comm::LocalComm;
use lbm_cascade::prelude::*;
use serial_test::serial;

fn circle_config(rank_grid: RankGridConfig) -> SolverConfig {
    SolverConfig {
        domain: DomainConfig { nx: 16, ny: 16 },
        rank_grid,
        viscosity: 0.02,
        reference_velocity: 0.0,
        regions: vec![],
        // centred on the domain midline so markers sit on the 2-rank split
        body: BodyCase::Circle {
            centre: [8.0, 8.0],
            radius: 3.0,
            markers: 24,
        },
        body_level: 0,
        body_region: 0,
        structural: Default::default(),
        steps: 1,
        report_every: 100,
        restart: false,
    }
}

/// Total spread force over this rank's owned sites.
fn owned_spread_force(sim: &Simulation<impl Communicator>) -> [f64; 2] {
    let root = sim.hierarchy.node(sim.hierarchy.root).unwrap();
    let mut total = [0.0f64; 2];
    for s in root.field.owned_indices() {
        total[0] += root.field.force[s][0];
        total[1] += root.field.force[s][1];
    }
    total
}

/// Total marker force over markers this rank owns (non-empty support).
fn owned_marker_force(sim: &Simulation<impl Communicator>) -> [f64; 2] {
    let mut total = [0.0f64; 2];
    for body in sim.registry.bodies() {
        for m in &body.markers {
            if !m.support.is_empty() {
                total[0] += m.force[0];
                total[1] += m.force[1];
            }
        }
    }
    total
}

#[test]
fn single_rank_spread_matches_marker_forces() {
    let mut sim = Simulation::new(circle_config(RankGridConfig { px: 1, py: 1 }), NoComm).unwrap();
    // push the fluid so the held circle resists with a non-zero force
    {
        let root_id = sim.hierarchy.root;
        let root = sim.hierarchy.node_mut(root_id).unwrap();
        for s in 0..root.field.f.len() {
            for q in 0..lbm_cascade::model::Q {
                root.field.f[s][q] = lbm_cascade::model::equilibrium(q, 1.0, [0.04, 0.0]);
            }
            root.field.recompute_moments(s);
        }
    }
    sim.macro_step().unwrap();

    let spread = owned_spread_force(&sim);
    let marker = owned_marker_force(&sim);
    assert!(marker[0].abs() > 1e-6, "held circle should feel the stream");
    assert!((spread[0] - marker[0]).abs() < 1e-10);
    assert!((spread[1] - marker[1]).abs() < 1e-10);
}

#[test]
#[serial]
fn cross_rank_support_conserves_force_after_reduction() {
    LocalComm::reset_mailbox();
    let world = LocalComm::world(2);
    let handles: Vec<_> = world
        .into_iter()
        .map(|comm| {
            std::thread::spawn(move || {
                let mut sim =
                    Simulation::new(circle_config(RankGridConfig { px: 2, py: 1 }), comm).unwrap();
                {
                    let root_id = sim.hierarchy.root;
                    let root = sim.hierarchy.node_mut(root_id).unwrap();
                    for s in 0..root.field.f.len() {
                        for q in 0..lbm_cascade::model::Q {
                            root.field.f[s][q] =
                                lbm_cascade::model::equilibrium(q, 1.0, [0.04, 0.0]);
                        }
                        root.field.recompute_moments(s);
                    }
                }
                sim.macro_step().unwrap();
                (owned_spread_force(&sim), owned_marker_force(&sim))
            })
        })
        .collect();

    let mut spread = [0.0f64; 2];
    let mut marker = [0.0f64; 2];
    for h in handles {
        let (s, m) = h.join().unwrap();
        spread[0] += s[0];
        spread[1] += s[1];
        marker[0] += m[0];
        marker[1] += m[1];
    }
    assert!(marker[0].abs() > 1e-6);
    assert!((spread[0] - marker[0]).abs() < 1e-10);
    assert!((spread[1] - marker[1]).abs() < 1e-10);
}
