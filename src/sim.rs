//! `Simulation`: the per-rank driver that wires configuration, topology,
//! hierarchy, registry and scheduler together and advances macro steps.
//!
//! Singleton-per-run managers are explicit context objects threaded through
//! by reference; there is no mutable global state.

use crate::comm::Communicator;
use crate::config::SolverConfig;
use crate::decomp::RankTopology;
use crate::error::CascadeError;
use crate::grid::hierarchy::{GridHierarchy, HierarchySnapshot};
use crate::ibm::body::BodyKind;
use crate::ibm::registry::{ObjectRegistry, RegistrySnapshot};
use crate::scheduler::TimeStepScheduler;
use serde::{Deserialize, Serialize};

/// Everything external restart encoding needs to resume a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub step: usize,
    pub hierarchy: HierarchySnapshot,
    pub registry: RegistrySnapshot,
}

pub struct Simulation<C: Communicator> {
    pub config: SolverConfig,
    pub topology: RankTopology,
    pub hierarchy: GridHierarchy,
    pub registry: ObjectRegistry,
    scheduler: TimeStepScheduler,
    comm: C,
    /// Completed macro steps.
    pub step: usize,
}

impl<C: Communicator> Simulation<C> {
    /// Build the full per-rank state for a run.
    ///
    /// # Errors
    /// Any `Configuration`/`Topology` error detected here is fatal and
    /// deterministic across ranks, since all ranks share the configuration.
    pub fn new(config: SolverConfig, comm: C) -> Result<Self, CascadeError> {
        let topology = RankTopology::build(comm.rank(), comm.size(), config.rank_grid)?;
        let hierarchy = GridHierarchy::build(&config, &topology)?;
        let registry = ObjectRegistry::from_config(&config, &hierarchy)?;
        let scheduler = TimeStepScheduler::new(&hierarchy, &topology, &config);
        log::info!(
            "rank {} of {} initialised: viscosity {}, u_ref {}",
            comm.rank(),
            comm.size(),
            config.viscosity,
            config.reference_velocity
        );
        if config.restart {
            log::info!("restart requested; expecting an externally decoded snapshot via restore");
        }
        Ok(Self {
            config,
            topology,
            hierarchy,
            registry,
            scheduler,
            comm,
            step: 0,
        })
    }

    /// Advance one macro step: prescribed rigid motion first (site typing
    /// and marker moves happen only at macro-step boundaries, never
    /// mid-sub-step), then the recursive multi-rate walk.
    pub fn macro_step(&mut self) -> Result<(), CascadeError> {
        self.move_rigid_bodies();
        self.scheduler
            .macro_step(&mut self.hierarchy, &mut self.registry, &self.comm)?;
        self.step += 1;
        Ok(())
    }

    /// Run to the configured iteration count. A core-detected error is
    /// broadcast through the communicator's abort hook so no peer rank stays
    /// blocked on a collective.
    pub fn run(&mut self) -> Result<(), CascadeError> {
        while self.step < self.config.steps {
            if let Err(e) = self.macro_step() {
                log::error!("fatal at macro step {}: {e}", self.step);
                self.comm.abort(1);
                return Err(e);
            }
            log::debug!("macro step {} of {} done", self.step, self.config.steps);
            if !self.registry.is_empty() && self.step % self.config.report_every == 0 {
                for (b, f) in self.force_report().into_iter().enumerate() {
                    log::info!(
                        "body {b}: aggregate force ({:.6e}, {:.6e}) over the last {} step(s)",
                        f[0],
                        f[1],
                        self.config.report_every
                    );
                }
            }
        }
        Ok(())
    }

    fn move_rigid_bodies(&mut self) {
        for body in self.registry.bodies_mut() {
            if let BodyKind::Rigid { velocity } = body.kind {
                if velocity == [0.0; 2] {
                    continue;
                }
                for m in &mut body.markers {
                    m.position_old = m.position;
                    m.position[0] += velocity[0];
                    m.position[1] += velocity[1];
                    m.support.clear();
                }
            }
        }
    }

    /// Expose the state externally encoded into a restart snapshot.
    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            step: self.step,
            hierarchy: self.hierarchy.snapshot(),
            registry: self.registry.snapshot(),
        }
    }

    /// Resume from an externally decoded snapshot.
    ///
    /// # Errors
    /// `RestartMismatch` when the snapshot disagrees with the live hierarchy
    /// or registry; fatal, nothing is partially applied before validation.
    pub fn restore(&mut self, snap: &RunSnapshot) -> Result<(), CascadeError> {
        self.hierarchy.restore(&snap.hierarchy)?;
        self.registry.restore(&snap.registry)?;
        self.step = snap.step;
        Ok(())
    }

    /// Per-body aggregate force since the last report, resetting the
    /// accumulators (one call per reporting period).
    pub fn force_report(&mut self) -> Vec<[f64; 2]> {
        self.registry.take_force_report()
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }
}
