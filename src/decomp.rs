//! Domain decomposition: Cartesian rank topology and per-level block
//! partitioning.
//!
//! Each rank owns a contiguous rectangular slab of level 0, split as evenly
//! as possible with remainder cells assigned to lowest-coordinate ranks.
//! Finer nodes derive their local boxes by intersecting their region with the
//! rank's refined slab, which keeps every parent/child transfer rank-local.

use crate::config::RankGridConfig;
use crate::error::CascadeError;
use crate::grid::node::IndexBox;

/// The eight exchange directions of the D2Q9 star (rest particle excluded):
/// east, north, west, south, then the diagonals.
pub const DIRS: [(i64, i64); 8] = [
    (1, 0),
    (0, 1),
    (-1, 0),
    (0, -1),
    (1, 1),
    (-1, 1),
    (-1, -1),
    (1, -1),
];

/// Opposite exchange direction.
pub const OPP_DIR: [usize; 8] = [2, 3, 0, 1, 6, 7, 4, 5];

/// Evenly divide `n` cells over `parts` blocks; remainder cells go to the
/// lowest block coordinates. Returns the half-open range of block `coord`.
pub fn block_range(n: usize, parts: usize, coord: usize) -> (usize, usize) {
    let base = n / parts;
    let rem = n % parts;
    let start = coord * base + coord.min(rem);
    let len = base + usize::from(coord < rem);
    (start, start + len)
}

/// Cartesian rank coordinates and per-direction neighbour ranks with
/// periodic wrap. Built once after the hierarchy is fixed; immutable
/// thereafter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankTopology {
    pub rank: usize,
    pub coords: [usize; 2],
    pub shape: [usize; 2],
    pub neighbors: [usize; 8],
}

impl RankTopology {
    /// Build the topology for `rank` in a `grid.px × grid.py` rank grid.
    ///
    /// # Errors
    /// `Topology` when the rank grid does not match the communicator size.
    pub fn build(rank: usize, size: usize, grid: RankGridConfig) -> Result<Self, CascadeError> {
        if grid.px == 0 || grid.py == 0 {
            return Err(CascadeError::Topology(
                "rank grid must be at least 1x1".into(),
            ));
        }
        if grid.px * grid.py != size {
            return Err(CascadeError::Topology(format!(
                "rank grid {}x{} does not match world size {size}",
                grid.px, grid.py
            )));
        }
        let cx = rank % grid.px;
        let cy = rank / grid.px;
        let wrap = |c: i64, n: usize| -> usize { (c.rem_euclid(n as i64)) as usize };
        let neighbors = std::array::from_fn(|d| {
            let (dx, dy) = DIRS[d];
            let nx = wrap(cx as i64 + dx, grid.px);
            let ny = wrap(cy as i64 + dy, grid.py);
            ny * grid.px + nx
        });
        Ok(Self {
            rank,
            coords: [cx, cy],
            shape: [grid.px, grid.py],
            neighbors,
        })
    }

    /// This rank's slab of a level-0 domain box.
    ///
    /// # Errors
    /// `Topology` when any rank's share along an axis would be empty.
    pub fn domain_slab(&self, nx: usize, ny: usize) -> Result<IndexBox, CascadeError> {
        if nx < self.shape[0] || ny < self.shape[1] {
            return Err(CascadeError::Topology(format!(
                "domain {nx}x{ny} too small for {}x{} ranks",
                self.shape[0], self.shape[1]
            )));
        }
        let (x0, x1) = block_range(nx, self.shape[0], self.coords[0]);
        let (y0, y1) = block_range(ny, self.shape[1], self.coords[1]);
        Ok(IndexBox::new(x0, x1, y0, y1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_ranges_cover_without_overlap() {
        let n = 10;
        let parts = 3;
        let mut next = 0;
        for c in 0..parts {
            let (s, e) = block_range(n, parts, c);
            assert_eq!(s, next);
            next = e;
        }
        assert_eq!(next, n);
        // remainder cells land on the lowest coordinate
        assert_eq!(block_range(n, parts, 0), (0, 4));
    }

    #[test]
    fn neighbors_wrap_periodically() {
        let topo = RankTopology::build(
            0,
            4,
            RankGridConfig { px: 2, py: 2 },
        )
        .unwrap();
        // east of rank 0 is rank 1, west wraps to rank 1 as well
        assert_eq!(topo.neighbors[0], 1);
        assert_eq!(topo.neighbors[2], 1);
        // north is rank 2, north-east is rank 3
        assert_eq!(topo.neighbors[1], 2);
        assert_eq!(topo.neighbors[4], 3);
    }

    #[test]
    fn mismatched_world_size_is_fatal() {
        let err = RankTopology::build(0, 3, RankGridConfig { px: 2, py: 2 }).unwrap_err();
        assert!(matches!(err, CascadeError::Topology(_)));
    }

    #[test]
    fn opposite_directions_invert() {
        for d in 0..8 {
            let (dx, dy) = DIRS[d];
            let (ox, oy) = DIRS[OPP_DIR[d]];
            assert_eq!((dx, dy), (-ox, -oy));
        }
    }
}
