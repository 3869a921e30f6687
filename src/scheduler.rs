//! Recursive multi-rate time-step scheduler.
//!
//! Per macro step the scheduler walks the grid tree depth-first:
//! collide-stream the node, run the immersed-boundary passes where bodies
//! are hosted, refresh halos, then explode into the children, advance each
//! child twice (2× temporal refinement), and coalesce the children back.
//! A level-L node therefore executes exactly 2^L kernel sub-steps per
//! level-0 macro step.

use crate::comm::Communicator;
use crate::config::{SolverConfig, StructuralConfig};
use crate::decomp::RankTopology;
use crate::error::CascadeError;
use crate::grid::hierarchy::GridHierarchy;
use crate::grid::node::NodeId;
use crate::halo::{self, HaloPlan};
use crate::ibm::{self, ObjectRegistry};
use crate::kernel;
use crate::transfer;

pub struct TimeStepScheduler {
    /// Halo plans indexed by node id; built once, immutable thereafter.
    plans: Vec<HaloPlan>,
    u_inlet: [f64; 2],
    structural: StructuralConfig,
}

impl TimeStepScheduler {
    pub fn new(hier: &GridHierarchy, topo: &RankTopology, cfg: &SolverConfig) -> Self {
        let plans = hier
            .iter()
            .map(|(_, node)| HaloPlan::build(node, topo))
            .collect();
        Self {
            plans,
            u_inlet: [cfg.reference_velocity, 0.0],
            structural: cfg.structural,
        }
    }

    /// Drive one level-0 macro step over the whole tree.
    pub fn macro_step<C: Communicator>(
        &self,
        hier: &mut GridHierarchy,
        registry: &mut ObjectRegistry,
        comm: &C,
    ) -> Result<(), CascadeError> {
        // macro step t+1 may not read fields step t has not finished writing
        comm.barrier();
        let root = hier.root;
        self.advance(hier, registry, root, comm)
    }

    /// One sub-step of `id` at its own level's rate, recursing into its
    /// children with two fine sub-steps per own step.
    fn advance<C: Communicator>(
        &self,
        hier: &mut GridHierarchy,
        registry: &mut ObjectRegistry,
        id: NodeId,
        comm: &C,
    ) -> Result<(), CascadeError> {
        let plan = self
            .plans
            .get(id.get())
            .ok_or(CascadeError::MissingNode(id.get()))?;

        kernel::step(hier.node_mut(id)?, self.u_inlet);

        // Immersed-boundary interleave: predictor right after collide-stream
        // (pre-correction velocity), corrector once force spreading has
        // perturbed the field. Every rank participates in the reduction even
        // when it owns no markers.
        if registry.host == Some(id) && !registry.is_empty() {
            let node = hier.node_mut(id)?;
            for body in registry.bodies_mut() {
                ibm::predictor(body, node, &self.structural)?;
            }
            halo::reduce_forces(id, node, plan, comm)?;
            ibm::apply_velocity_correction(node);
            let node = hier.node(id)?;
            for body in registry.bodies_mut() {
                ibm::corrector(body, node);
            }
        }

        halo::exchange(id, hier.node_mut(id)?, plan, comm)?;

        let children = hier.node(id)?.children.clone();
        if children.is_empty() {
            return Ok(());
        }
        for &c in &children {
            let child_plan = self
                .plans
                .get(c.get())
                .ok_or(CascadeError::MissingNode(c.get()))?;
            let (parent, child) = hier.pair_mut(id, c)?;
            transfer::explode(parent, child, child_plan)?;
        }
        for _sub in 0..2 {
            for &c in &children {
                self.advance(hier, registry, c, comm)?;
            }
        }
        for &c in &children {
            let (parent, child) = hier.pair_mut(id, c)?;
            transfer::coalesce(child, parent)?;
        }
        Ok(())
    }
}
