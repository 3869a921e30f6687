//! `GridHierarchy`: arena of grid nodes with child index lists.
//!
//! The recursive parent/child tree is stored as a flat arena addressed by
//! [`NodeId`] handles, which keeps traversal iterative-friendly and lets the
//! explosion/coalescence transfers borrow a parent and child pair at once.
//! The hierarchy is created once from static refinement-region configuration
//! and never changes shape afterwards.

use crate::config::SolverConfig;
use crate::decomp::RankTopology;
use crate::error::CascadeError;
use crate::grid::node::{GridNode, IndexBox, NodeId};
use crate::grid::site::SiteField;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct GridHierarchy {
    nodes: Vec<GridNode>,
    pub root: NodeId,
}

/// Field state of every node, exposed for external snapshot encoding.
///
/// The on-disk encoding is owned externally; the core only guarantees that
/// `restore` of an unmodified snapshot reproduces the captured state,
/// including the running-average sample counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchySnapshot {
    pub fields: Vec<SiteField>,
}

impl GridHierarchy {
    /// Build the full hierarchy for this rank from static configuration.
    ///
    /// # Errors
    /// `Topology` when the domain cannot be split over the rank grid;
    /// `Configuration` when a refinement region is malformed (missing parent,
    /// box outside the parent, duplicate (level, region) pair).
    pub fn build(cfg: &SolverConfig, topo: &RankTopology) -> Result<Self, CascadeError> {
        let root_global = IndexBox::new(0, cfg.domain.nx, 0, cfg.domain.ny);
        let root_owned = topo.domain_slab(cfg.domain.nx, cfg.domain.ny)?;
        let root = GridNode {
            level: 0,
            region: 0,
            origin: [0.0, 0.0],
            dx: 1.0,
            omega: GridNode::omega_for_level(cfg.viscosity, 0),
            global: root_global,
            owned: root_owned,
            field: SiteField::new(root_owned.width(), root_owned.height()),
            parent: None,
            children: Vec::new(),
        };
        let mut hier = Self {
            nodes: vec![root],
            root: NodeId::new(0),
        };

        let mut regions = cfg.regions.clone();
        regions.sort_by_key(|r| (r.level, r.region));
        for rc in &regions {
            if rc.level == 0 {
                return Err(CascadeError::Configuration(
                    "refinement regions start at level 1".into(),
                ));
            }
            if hier.find(rc.level, rc.region).is_some() {
                return Err(CascadeError::Configuration(format!(
                    "duplicate refinement region (level {}, region {})",
                    rc.level, rc.region
                )));
            }
            let parent_id = if rc.level == 1 {
                hier.root
            } else {
                hier.find(rc.level - 1, rc.region).ok_or_else(|| {
                    CascadeError::Configuration(format!(
                        "region {} at level {} has no parent grid",
                        rc.region, rc.level
                    ))
                })?
            };
            let bounds = IndexBox::new(rc.x0, rc.x1, rc.y0, rc.y1);
            if bounds.is_empty() {
                return Err(CascadeError::Configuration(format!(
                    "empty refinement box for region {} at level {}",
                    rc.region, rc.level
                )));
            }
            let parent = hier.node(parent_id)?;
            if !parent.global.contains_box(&bounds) {
                return Err(CascadeError::Configuration(format!(
                    "region {} at level {} exceeds its parent grid",
                    rc.region, rc.level
                )));
            }
            let global = bounds.refined();
            let owned = global.intersect(&parent.owned.refined());
            let field = if owned.is_empty() {
                SiteField::empty()
            } else {
                SiteField::new(owned.width(), owned.height())
            };
            // bounds are absolute parent-level indices, so the physical
            // origin is their position at the parent's spacing
            let origin = [
                bounds.x0 as f64 * parent.dx,
                bounds.y0 as f64 * parent.dx,
            ];
            let dx = parent.dx * 0.5;
            let node = GridNode {
                level: rc.level,
                region: rc.region,
                origin,
                dx,
                omega: GridNode::omega_for_level(cfg.viscosity, rc.level),
                global,
                owned,
                field,
                parent: Some(parent_id),
                children: Vec::new(),
            };
            let id = NodeId::new(hier.nodes.len());
            hier.nodes.push(node);
            hier.nodes[parent_id.get()].children.push(id);
        }

        log::info!(
            "hierarchy built: {} node(s), {} level(s), rank slab {:?}",
            hier.nodes.len(),
            1 + cfg.num_levels(),
            root_owned
        );
        Ok(hier)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Handle of the node at (level, region), if configured.
    pub fn find(&self, level: usize, region: usize) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.level == level && (level == 0 || n.region == region))
            .map(NodeId::new)
    }

    pub fn node(&self, id: NodeId) -> Result<&GridNode, CascadeError> {
        self.nodes
            .get(id.get())
            .ok_or(CascadeError::MissingNode(id.get()))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut GridNode, CascadeError> {
        self.nodes
            .get_mut(id.get())
            .ok_or(CascadeError::MissingNode(id.get()))
    }

    /// Borrow two distinct nodes mutably, for parent/child transfers.
    pub fn pair_mut(
        &mut self,
        a: NodeId,
        b: NodeId,
    ) -> Result<(&mut GridNode, &mut GridNode), CascadeError> {
        let (ai, bi) = (a.get(), b.get());
        if ai == bi {
            return Err(CascadeError::Configuration(format!(
                "node {ai} cannot be its own transfer partner"
            )));
        }
        if ai.max(bi) >= self.nodes.len() {
            return Err(CascadeError::MissingNode(ai.max(bi)));
        }
        let (lo, hi) = self.nodes.split_at_mut(ai.max(bi));
        if ai < bi {
            Ok((&mut lo[ai], &mut hi[0]))
        } else {
            Ok((&mut hi[0], &mut lo[bi]))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &GridNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId::new(i), n))
    }

    /// Capture every node's field state for external snapshot encoding.
    pub fn snapshot(&self) -> HierarchySnapshot {
        HierarchySnapshot {
            fields: self.nodes.iter().map(|n| n.field.clone()).collect(),
        }
    }

    /// Restore field state from a snapshot.
    ///
    /// # Errors
    /// `RestartMismatch` when the snapshot's node count or any node's cell
    /// counts disagree with the live hierarchy.
    pub fn restore(&mut self, snap: &HierarchySnapshot) -> Result<(), CascadeError> {
        if snap.fields.len() != self.nodes.len() {
            return Err(CascadeError::RestartMismatch {
                what: "grid nodes",
                expected: self.nodes.len(),
                found: snap.fields.len(),
            });
        }
        for (node, field) in self.nodes.iter_mut().zip(&snap.fields) {
            if field.nx() != node.field.nx() || field.ny() != node.field.ny() {
                return Err(CascadeError::RestartMismatch {
                    what: "cells in a grid node",
                    expected: node.field.nx() * node.field.ny(),
                    found: field.nx() * field.ny(),
                });
            }
            node.field = field.clone();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BodyCase, DomainConfig, RankGridConfig, RegionConfig, StructuralConfig};

    fn config_8x8_refined() -> SolverConfig {
        SolverConfig {
            domain: DomainConfig { nx: 8, ny: 8 },
            rank_grid: RankGridConfig { px: 1, py: 1 },
            viscosity: 0.02,
            reference_velocity: 0.05,
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
            structural: StructuralConfig::default(),
            steps: 1,
            report_every: 1,
            restart: false,
        }
    }

    fn serial_topo() -> RankTopology {
        RankTopology::build(0, 1, RankGridConfig { px: 1, py: 1 }).unwrap()
    }

    #[test]
    fn two_level_build_halves_spacing_and_doubles_extents() {
        let hier = GridHierarchy::build(&config_8x8_refined(), &serial_topo()).unwrap();
        assert_eq!(hier.len(), 2);
        let child_id = hier.find(1, 0).unwrap();
        let child = hier.node(child_id).unwrap();
        assert_eq!(child.global, IndexBox::new(4, 12, 4, 12));
        assert_eq!(child.owned, child.global);
        assert_eq!(child.dx, 0.5);
        assert_eq!(child.origin, [2.0, 2.0]);
        let root = hier.node(hier.root).unwrap();
        assert_eq!(root.children, vec![child_id]);
    }

    #[test]
    fn region_outside_parent_is_configuration_error() {
        let mut cfg = config_8x8_refined();
        cfg.regions[0].x1 = 20;
        let err = GridHierarchy::build(&cfg, &serial_topo()).unwrap_err();
        assert!(matches!(err, CascadeError::Configuration(_)));
    }

    #[test]
    fn orphan_level_two_region_is_configuration_error() {
        let mut cfg = config_8x8_refined();
        cfg.regions[0].level = 2;
        let err = GridHierarchy::build(&cfg, &serial_topo()).unwrap_err();
        assert!(matches!(err, CascadeError::Configuration(_)));
    }

    #[test]
    fn snapshot_restore_roundtrip_rejects_wrong_shape() {
        let mut hier = GridHierarchy::build(&config_8x8_refined(), &serial_topo()).unwrap();
        let snap = hier.snapshot();
        hier.restore(&snap).unwrap();

        let mut short = snap.clone();
        short.fields.pop();
        assert!(matches!(
            hier.restore(&short),
            Err(CascadeError::RestartMismatch { .. })
        ));
    }
}
