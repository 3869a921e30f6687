//! Halo exchange: per-direction boundary-layer packing, symmetric
//! send/receive, and the additive reverse exchange that ships spread
//! immersed-boundary forces back to their owning rank.
//!
//! Every send has a matching in-flight receive (receives are posted first),
//! so the exchange cannot deadlock. Wire payloads are `bytemuck::Pod`
//! records; unpacking copies into an aligned record buffer before casting.

use crate::comm::{CommTag, Communicator, ExchangePhase, Wait};
use crate::decomp::{DIRS, OPP_DIR, RankTopology};
use crate::error::CascadeError;
use crate::grid::node::{GridNode, NodeId};
use crate::grid::site::SiteField;
use crate::model::Q;
use bytemuck::Zeroable;
use itertools::iproduct;

/// One boundary-layer record on the wire: distributions, the (possibly
/// force-shifted) velocity, and the body-force accumulator, so a ghost site
/// collides exactly as its owner does.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct HaloRecord {
    pub f: [f64; Q],
    pub u: [f64; 2],
    pub force: [f64; 2],
}

static_assertions::assert_eq_size!(HaloRecord, [f64; Q + 4]);

/// One live exchange lane: the owned boundary layer sent toward `dir` and
/// the ghost layer refreshed from the neighbour in `dir`.
#[derive(Debug, Clone)]
pub struct HaloLink {
    pub dir: usize,
    pub peer: usize,
    pub send_sites: Vec<usize>,
    pub recv_sites: Vec<usize>,
}

/// Per-node exchange plan plus the ghost sites left to inter-level
/// explosion. Built once after partitioning; immutable thereafter.
#[derive(Debug, Clone, Default)]
pub struct HaloPlan {
    pub links: Vec<HaloLink>,
    /// Ghost sites outside the node's region box; refined nodes have their
    /// boundary condition injected here from the parent grid.
    pub explosion_sites: Vec<usize>,
}

impl HaloPlan {
    /// Build the exchange plan for `node` under `topo`.
    ///
    /// Level 0 wraps periodically, so every direction is a live lane. On
    /// finer nodes a lane is live only when its ghost layer lies inside the
    /// region box; the remaining ghost sites are explosion-filled.
    pub fn build(node: &GridNode, topo: &RankTopology) -> Self {
        if !node.is_local() {
            return Self::default();
        }
        let nx = node.field.nx();
        let ny = node.field.ny();
        let mut plan = Self::default();
        for (dir, &(dx, dy)) in DIRS.iter().enumerate() {
            let live = node.level == 0 || ghost_layer_in_region(node, dx, dy);
            if live {
                plan.links.push(HaloLink {
                    dir,
                    peer: topo.neighbors[dir],
                    send_sites: layer_sites(&node.field, dx, dy, false),
                    recv_sites: layer_sites(&node.field, dx, dy, true),
                });
            }
        }
        if node.level > 0 {
            let covered: std::collections::HashSet<usize> = plan
                .links
                .iter()
                .flat_map(|l| l.recv_sites.iter().copied())
                .collect();
            for (j, i) in iproduct!(0..ny + 2, 0..nx + 2) {
                let ghost = i == 0 || i == nx + 1 || j == 0 || j == ny + 1;
                let s = node.field.idx(i, j);
                if ghost && !covered.contains(&s) {
                    plan.explosion_sites.push(s);
                }
            }
        }
        plan
    }

    fn link(&self, dir: usize) -> Option<&HaloLink> {
        self.links.iter().find(|l| l.dir == dir)
    }
}

/// True when the ghost layer in direction `(dx, dy)` lies inside the node's
/// region box, i.e. a same-level neighbour owns it.
fn ghost_layer_in_region(node: &GridNode, dx: i64, dy: i64) -> bool {
    let x_ok = match dx {
        1 => node.owned.x1 < node.global.x1,
        -1 => node.owned.x0 > node.global.x0,
        _ => true,
    };
    let y_ok = match dy {
        1 => node.owned.y1 < node.global.y1,
        -1 => node.owned.y0 > node.global.y0,
        _ => true,
    };
    x_ok && y_ok
}

/// Row-major site list of a boundary layer: the owned layer adjacent to edge
/// `(dx, dy)` when `ghost` is false, the ghost layer beyond it otherwise.
fn layer_sites(fld: &SiteField, dx: i64, dy: i64, ghost: bool) -> Vec<usize> {
    let nx = fld.nx();
    let ny = fld.ny();
    let xs: Vec<usize> = match (dx, ghost) {
        (1, false) => vec![nx],
        (1, true) => vec![nx + 1],
        (-1, false) => vec![1],
        (-1, true) => vec![0],
        _ => (1..=nx).collect(),
    };
    let ys: Vec<usize> = match (dy, ghost) {
        (1, false) => vec![ny],
        (1, true) => vec![ny + 1],
        (-1, false) => vec![1],
        (-1, true) => vec![0],
        _ => (1..=ny).collect(),
    };
    iproduct!(ys, xs).map(|(j, i)| fld.idx(i, j)).collect()
}

fn gather(fld: &SiteField, sites: &[usize]) -> Vec<HaloRecord> {
    sites
        .iter()
        .map(|&s| HaloRecord {
            f: fld.f[s],
            u: fld.u[s],
            force: fld.force[s],
        })
        .collect()
}

fn scatter(fld: &mut SiteField, sites: &[usize], recs: &[HaloRecord]) {
    for (&s, rec) in sites.iter().zip(recs) {
        fld.f[s] = rec.f;
        fld.u[s] = rec.u;
        fld.force[s] = rec.force;
        // density is always the zeroth moment of the distributions
        fld.rho[s] = rec.f.iter().sum();
    }
}

/// Refresh the ghost layers of `node` from its same-level neighbours.
///
/// Self-lanes (periodic wrap onto this rank) are copied locally; remote
/// lanes post all receives, then send, then wait and unpack.
pub fn exchange<C: Communicator>(
    id: NodeId,
    node: &mut GridNode,
    plan: &HaloPlan,
    comm: &C,
) -> Result<(), CascadeError> {
    if !node.is_local() {
        return Ok(());
    }
    let me = comm.rank();

    // local periodic copies
    for dir in 0..8 {
        let Some(link) = plan.link(dir) else { continue };
        if link.peer != me {
            continue;
        }
        let source = plan.link(OPP_DIR[dir]).ok_or_else(|| CascadeError::Topology(format!(
            "self-lane {dir} of node {id} has no opposite lane"
        )))?;
        let recs = gather(&node.field, &source.send_sites);
        scatter(&mut node.field, &link.recv_sites, &recs);
    }

    // remote lanes: receives first, then sends
    let mut pending = Vec::new();
    for link in plan.links.iter().filter(|l| l.peer != me) {
        let tag = CommTag::exchange(ExchangePhase::Distributions, id, OPP_DIR[link.dir]);
        let bytes = link.recv_sites.len() * std::mem::size_of::<HaloRecord>();
        let handle = comm.irecv(link.peer, tag.as_u16(), bytes);
        pending.push((link, handle));
    }
    for link in plan.links.iter().filter(|l| l.peer != me) {
        let tag = CommTag::exchange(ExchangePhase::Distributions, id, link.dir);
        let recs = gather(&node.field, &link.send_sites);
        comm.isend(link.peer, tag.as_u16(), bytemuck::cast_slice(&recs))
            .wait();
    }
    for (link, handle) in pending {
        let raw = handle.wait().ok_or(CascadeError::Comm {
            peer: link.peer,
            reason: format!("halo receive for direction {} returned no data", link.dir),
        })?;
        let mut recs = vec![HaloRecord::zeroed(); link.recv_sites.len()];
        bytemuck::cast_slice_mut::<HaloRecord, u8>(&mut recs).copy_from_slice(&raw);
        scatter(&mut node.field, &link.recv_sites, &recs);
    }
    Ok(())
}

/// Ship force contributions spread into ghost cells back to the owning rank
/// and add them there, then clear the ghost accumulators.
///
/// This is the explicit cross-rank reduction of immersed-boundary spreading:
/// contributions are summed exactly once on the owner, never double-counted.
pub fn reduce_forces<C: Communicator>(
    id: NodeId,
    node: &mut GridNode,
    plan: &HaloPlan,
    comm: &C,
) -> Result<(), CascadeError> {
    if !node.is_local() {
        return Ok(());
    }
    let me = comm.rank();

    for dir in 0..8 {
        let Some(link) = plan.link(dir) else { continue };
        if link.peer != me {
            continue;
        }
        // periodic wrap onto this rank: ghost layer `dir` coincides with the
        // owned layer on the opposite edge
        let target = plan.link(OPP_DIR[dir]).ok_or_else(|| CascadeError::Topology(format!(
            "self-lane {dir} of node {id} has no opposite lane"
        )))?;
        for k in 0..link.recv_sites.len() {
            let from = link.recv_sites[k];
            let to = target.send_sites[k];
            let contrib = node.field.force[from];
            node.field.force[to][0] += contrib[0];
            node.field.force[to][1] += contrib[1];
        }
    }

    let mut pending = Vec::new();
    for link in plan.links.iter().filter(|l| l.peer != me) {
        let tag = CommTag::exchange(ExchangePhase::ForceReduction, id, OPP_DIR[link.dir]);
        let bytes = link.send_sites.len() * std::mem::size_of::<[f64; 2]>();
        let handle = comm.irecv(link.peer, tag.as_u16(), bytes);
        pending.push((link, handle));
    }
    for link in plan.links.iter().filter(|l| l.peer != me) {
        let tag = CommTag::exchange(ExchangePhase::ForceReduction, id, link.dir);
        let ghost_force: Vec<[f64; 2]> = link
            .recv_sites
            .iter()
            .map(|&s| node.field.force[s])
            .collect();
        comm.isend(link.peer, tag.as_u16(), bytemuck::cast_slice(&ghost_force))
            .wait();
    }
    for (link, handle) in pending {
        let raw = handle.wait().ok_or(CascadeError::Comm {
            peer: link.peer,
            reason: format!(
                "force reduction receive for direction {} returned no data",
                link.dir
            ),
        })?;
        let mut contrib = vec![[0.0f64; 2]; link.send_sites.len()];
        bytemuck::cast_slice_mut::<[f64; 2], u8>(&mut contrib).copy_from_slice(&raw);
        for (&s, c) in link.send_sites.iter().zip(&contrib) {
            node.field.force[s][0] += c[0];
            node.field.force[s][1] += c[1];
        }
    }

    // ghost contributions have been handed to their owners
    let nx = node.field.nx();
    let ny = node.field.ny();
    for (j, i) in iproduct!(0..ny + 2, 0..nx + 2) {
        if i == 0 || i == nx + 1 || j == 0 || j == ny + 1 {
            let s = node.field.idx(i, j);
            node.field.force[s] = [0.0; 2];
        }
    }
    Ok(())
}
