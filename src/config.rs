//! Startup configuration consumed opaquely during hierarchy construction and
//! partitioning. Deserialization format is the caller's concern; the core
//! only requires `serde::Deserialize`.

use serde::{Deserialize, Serialize};

/// Global level-0 domain extents in lattice cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfig {
    pub nx: usize,
    pub ny: usize,
}

/// Shape of the Cartesian rank grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankGridConfig {
    pub px: usize,
    pub py: usize,
}

/// One refinement region: a rectangular box given in **parent-level** cell
/// indices, refined 2× per axis at `level`.
///
/// Regions with the same `region` id nest: the level-2 box of region 0 must
/// lie inside the level-1 box of region 0, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub level: usize,
    pub region: usize,
    pub x0: usize,
    pub x1: usize,
    pub y0: usize,
    pub y1: usize,
}

/// Immersed-boundary case selector. `None` runs plain multi-grid LBM.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BodyCase {
    None,
    /// Rigid circle: centre and radius in level-0 lattice units.
    Circle {
        centre: [f64; 2],
        radius: f64,
        markers: usize,
    },
    /// Rigid flat plate between two end points.
    Plate {
        start: [f64; 2],
        end: [f64; 2],
        markers: usize,
    },
    /// Flexible filament anchored at `start`, initially straight.
    Filament {
        start: [f64; 2],
        length: f64,
        markers: usize,
    },
}

/// Structural coefficients for flexible bodies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StructuralConfig {
    /// Tension stiffness along the marker chain.
    pub tension: f64,
    /// Bending stiffness of the marker chain.
    pub bending: f64,
}

impl Default for StructuralConfig {
    fn default() -> Self {
        Self {
            tension: 5.0e-2,
            bending: 1.0e-4,
        }
    }
}

/// Complete startup configuration for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    pub domain: DomainConfig,
    pub rank_grid: RankGridConfig,
    /// Physical kinematic viscosity; level-invariant by construction.
    pub viscosity: f64,
    /// Reference (inlet) velocity in lattice units.
    pub reference_velocity: f64,
    /// Static refinement regions; empty for a single-level run.
    #[serde(default)]
    pub regions: Vec<RegionConfig>,
    /// Immersed-boundary case.
    #[serde(default = "default_body_case")]
    pub body: BodyCase,
    /// Grid level hosting the immersed body.
    #[serde(default)]
    pub body_level: usize,
    /// Region id hosting the immersed body (ignored when `body_level == 0`).
    #[serde(default)]
    pub body_region: usize,
    #[serde(default)]
    pub structural: StructuralConfig,
    /// Total number of macro steps to run.
    pub steps: usize,
    /// Force accumulators reset once per this many macro steps.
    #[serde(default = "default_report_every")]
    pub report_every: usize,
    /// Whether this run resumes from an externally decoded snapshot.
    #[serde(default)]
    pub restart: bool,
}

fn default_body_case() -> BodyCase {
    BodyCase::None
}

fn default_report_every() -> usize {
    100
}

impl SolverConfig {
    /// Number of refinement levels below level 0.
    pub fn num_levels(&self) -> usize {
        self.regions.iter().map(|r| r.level).max().unwrap_or(0)
    }
}
