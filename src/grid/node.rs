//! `GridNode`: one (level, region) grid in the refinement hierarchy, and the
//! strong handle type used to address nodes in the arena.

use crate::grid::site::SiteField;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Zero-cost handle for a grid node in the hierarchy arena.
///
/// Handles are created once at initialisation and stay valid for the whole
/// run; the hierarchy is structurally static.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct NodeId(usize);

impl NodeId {
    #[inline]
    pub const fn new(raw: usize) -> Self {
        NodeId(raw)
    }

    #[inline]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeId").field(&self.0).finish()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Half-open rectangular index range `[x0, x1) × [y0, y1)` at one level's
/// resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexBox {
    pub x0: usize,
    pub x1: usize,
    pub y0: usize,
    pub y1: usize,
}

impl IndexBox {
    pub fn new(x0: usize, x1: usize, y0: usize, y1: usize) -> Self {
        Self { x0, x1, y0, y1 }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.x1.saturating_sub(self.x0)
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.y1.saturating_sub(self.y0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }

    #[inline]
    pub fn contains(&self, gx: usize, gy: usize) -> bool {
        gx >= self.x0 && gx < self.x1 && gy >= self.y0 && gy < self.y1
    }

    #[inline]
    pub fn contains_box(&self, other: &IndexBox) -> bool {
        other.is_empty()
            || (other.x0 >= self.x0 && other.x1 <= self.x1 && other.y0 >= self.y0 && other.y1 <= self.y1)
    }

    /// Intersection of two boxes; may be empty.
    pub fn intersect(&self, other: &IndexBox) -> IndexBox {
        IndexBox {
            x0: self.x0.max(other.x0),
            x1: self.x1.min(other.x1),
            y0: self.y0.max(other.y0),
            y1: self.y1.min(other.y1),
        }
    }

    /// The same box expressed one level finer (indices doubled).
    pub fn refined(&self) -> IndexBox {
        IndexBox {
            x0: self.x0 * 2,
            x1: self.x1 * 2,
            y0: self.y0 * 2,
            y1: self.y1 * 2,
        }
    }
}

/// One grid of the hierarchy: a (level, region) pair owning its site storage
/// and an ordered list of exclusively-owned child grids.
#[derive(Debug, Clone)]
pub struct GridNode {
    pub level: usize,
    pub region: usize,
    /// Lower corner of the region box in level-0 lattice units.
    pub origin: [f64; 2],
    /// Lattice spacing in level-0 units; halves per level.
    pub dx: f64,
    /// Relaxation rate, derived so physical viscosity is level-invariant.
    pub omega: f64,
    /// Full region box at this level's resolution, across all ranks.
    pub global: IndexBox,
    /// This rank's owned slab of `global`; empty when the rank does not
    /// intersect the region.
    pub owned: IndexBox,
    pub field: SiteField,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl GridNode {
    /// Relaxation rate for `level` given the level-invariant physical
    /// viscosity (expressed in level-0 lattice units).
    ///
    /// Spacing and time step both halve per level, so the lattice viscosity
    /// doubles: `nu_lat = nu * 2^level`, `tau = 3 nu_lat + 1/2`.
    pub fn omega_for_level(viscosity: f64, level: usize) -> f64 {
        let nu_lat = viscosity * (1u64 << level) as f64;
        1.0 / (3.0 * nu_lat + 0.5)
    }

    /// Local flat index of a global cell, if it lies in the owned box or its
    /// halo ring.
    #[inline]
    pub fn local_index(&self, gx: i64, gy: i64) -> Option<usize> {
        let i = gx - self.owned.x0 as i64 + 1;
        let j = gy - self.owned.y0 as i64 + 1;
        let w = self.field.nx() as i64 + 2;
        let h = self.field.ny() as i64 + 2;
        if i >= 0 && i < w && j >= 0 && j < h {
            Some(self.field.idx(i as usize, j as usize))
        } else {
            None
        }
    }

    /// Global cell coordinates of a local owned/halo coordinate pair.
    #[inline]
    pub fn global_of_local(&self, i: usize, j: usize) -> (i64, i64) {
        (
            self.owned.x0 as i64 + i as i64 - 1,
            self.owned.y0 as i64 + j as i64 - 1,
        )
    }

    /// True when the rank owns part of this node.
    #[inline]
    pub fn is_local(&self) -> bool {
        !self.field.is_empty()
    }
}
