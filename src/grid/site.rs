//! Flat per-grid storage of macroscopic fields, distributions, running
//! time-averages and site-type tags.
//!
//! Storage covers the locally-owned index box plus a one-cell halo ring (the
//! stencil span of the single-relaxation kernel). Layout is row-major
//! structure-of-arrays; a site is addressed by its flat index.

use crate::model::Q;
use serde::{Deserialize, Serialize};

/// Classification of a lattice site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SiteType {
    Fluid,
    Solid,
    /// Holds the prescribed-equilibrium inflow state every sub-step.
    Inlet,
    /// Copies distributions from its upstream neighbour after streaming.
    Outlet,
}

/// Flat field arrays over an owned box of `nx × ny` cells plus the halo ring.
///
/// # Invariants
/// - `rho`/`u` are always the zeroth/first moments of `f` at owned sites
///   after streaming; they are never mutated independently of `f`, with the
///   single documented exception of the immersed-boundary velocity
///   correction.
/// - `samples` counts completed running-average updates; the averages use the
///   stable form `new = old + (value - old) / n`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteField {
    nx: usize,
    ny: usize,
    pub rho: Vec<f64>,
    pub u: Vec<[f64; 2]>,
    pub f: Vec<[f64; Q]>,
    /// Streaming target buffer, swapped with `f` after each sub-step.
    pub f_post: Vec<[f64; Q]>,
    /// Accumulated body force for the current sub-step; cleared after the
    /// relaxation that consumes it.
    pub force: Vec<[f64; 2]>,
    pub ty: Vec<SiteType>,
    pub avg_rho: Vec<f64>,
    pub avg_u: Vec<[f64; 2]>,
    /// Running averages of velocity products: xx, xy, yy.
    pub avg_uu: Vec<[f64; 3]>,
    pub samples: u64,
}

impl SiteField {
    /// Allocate storage for `nx × ny` owned cells, everything at rest
    /// (density 1, zero velocity, equilibrium distributions).
    pub fn new(nx: usize, ny: usize) -> Self {
        let len = (nx + 2) * (ny + 2);
        let f0: [f64; Q] = std::array::from_fn(|q| crate::model::equilibrium(q, 1.0, [0.0; 2]));
        Self {
            nx,
            ny,
            rho: vec![1.0; len],
            u: vec![[0.0; 2]; len],
            f: vec![f0; len],
            f_post: vec![f0; len],
            force: vec![[0.0; 2]; len],
            ty: vec![SiteType::Fluid; len],
            avg_rho: vec![0.0; len],
            avg_u: vec![[0.0; 2]; len],
            avg_uu: vec![[0.0; 3]; len],
            samples: 0,
        }
    }

    /// Empty storage for a node this rank does not intersect.
    pub fn empty() -> Self {
        Self::new(0, 0)
    }

    /// Owned cells in x.
    #[inline]
    pub fn nx(&self) -> usize {
        self.nx
    }

    /// Owned cells in y.
    #[inline]
    pub fn ny(&self) -> usize {
        self.ny
    }

    /// True when the rank owns no cells of this node.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nx == 0 || self.ny == 0
    }

    /// Row stride of the flat arrays.
    #[inline]
    pub fn stride(&self) -> usize {
        self.nx + 2
    }

    /// Flat index of local coordinates; `(1, 1)` is the first owned cell,
    /// `0` and `n + 1` address the halo ring.
    #[inline]
    pub fn idx(&self, i: usize, j: usize) -> usize {
        debug_assert!(i < self.nx + 2 && j < self.ny + 2);
        j * (self.nx + 2) + i
    }

    /// Iterate flat indices of all owned cells in row-major order.
    pub fn owned_indices(&self) -> impl Iterator<Item = usize> + '_ {
        let stride = self.stride();
        (1..=self.ny).flat_map(move |j| (1..=self.nx).map(move |i| j * stride + i))
    }

    /// Recompute `rho` and `u` at `site` as moments of `f`.
    #[inline]
    pub fn recompute_moments(&mut self, site: usize) {
        let f = &self.f[site];
        let mut rho = 0.0;
        let mut mom = [0.0f64; 2];
        for q in 0..Q {
            rho += f[q];
            mom[0] += f[q] * crate::model::VELOCITIES[q][0] as f64;
            mom[1] += f[q] * crate::model::VELOCITIES[q][1] as f64;
        }
        self.rho[site] = rho;
        if rho.abs() > f64::EPSILON {
            self.u[site] = [mom[0] / rho, mom[1] / rho];
        } else {
            self.u[site] = [0.0; 2];
        }
    }

    /// Fold the current owned-site moments into the running averages.
    pub fn update_averages(&mut self) {
        self.samples += 1;
        let n = self.samples as f64;
        let stride = self.stride();
        for j in 1..=self.ny {
            for i in 1..=self.nx {
                let s = j * stride + i;
                self.avg_rho[s] += (self.rho[s] - self.avg_rho[s]) / n;
                let [ux, uy] = self.u[s];
                self.avg_u[s][0] += (ux - self.avg_u[s][0]) / n;
                self.avg_u[s][1] += (uy - self.avg_u[s][1]) / n;
                self.avg_uu[s][0] += (ux * ux - self.avg_uu[s][0]) / n;
                self.avg_uu[s][1] += (ux * uy - self.avg_uu[s][1]) / n;
                self.avg_uu[s][2] += (uy * uy - self.avg_uu[s][2]) / n;
            }
        }
    }
}
