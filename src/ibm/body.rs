//! Bodies and markers: ordered Lagrangian point sets coupled to the lattice.
//!
//! A body is an ordered sequence of markers; the order defines open or
//! closed surface connectivity and is fixed after construction. Rigid
//! markers move only with prescribed rigid motion; flexible markers are
//! advanced every sub-step by the internal structural model.

use crate::config::StructuralConfig;
use crate::ibm::SupportPoint;

/// Capability of a body, selected at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BodyKind {
    /// Markers enforce a prescribed rigid velocity (zero for a held body).
    Rigid { velocity: [f64; 2] },
    /// Markers governed by the tension/bending chain model each sub-step,
    /// anchored at the first marker.
    Flexible,
}

/// One Lagrangian marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    /// Position in level-0 lattice units.
    pub position: [f64; 2],
    /// Previous position; drives the flexible desired velocity.
    pub position_old: [f64; 2],
    /// Interpolation/spreading support on the hosting grid. Empty when the
    /// marker is not owned by this rank.
    pub support: Vec<SupportPoint>,
    /// Restoring force computed by the last predictor pass.
    pub force: [f64; 2],
}

impl Marker {
    pub fn at(position: [f64; 2]) -> Self {
        Self {
            position,
            position_old: position,
            support: Vec::new(),
            force: [0.0; 2],
        }
    }
}

/// An immersed body: ordered markers plus per-body force statistics.
#[derive(Debug, Clone)]
pub struct Body {
    pub kind: BodyKind,
    pub markers: Vec<Marker>,
    /// Whether the marker chain closes on itself.
    pub closed: bool,
    /// Arc spacing between consecutive markers, level-0 units.
    pub spacing: f64,
    /// Net force accumulated since the last reporting reset.
    pub force_total: [f64; 2],
}

impl Body {
    /// Build a body from an ordered, already-rescaled point list (the
    /// geometry-ingestion contract).
    pub fn from_points(points: Vec<[f64; 2]>, kind: BodyKind, closed: bool) -> Self {
        let spacing = if points.len() > 1 {
            let a = points[0];
            let b = points[1];
            ((b[0] - a[0]).powi(2) + (b[1] - a[1]).powi(2)).sqrt()
        } else {
            1.0
        };
        Self {
            kind,
            markers: points.into_iter().map(Marker::at).collect(),
            closed,
            spacing,
            force_total: [0.0; 2],
        }
    }

    /// Desired velocity of every marker for the predictor pass.
    ///
    /// Rigid bodies prescribe their rigid velocity everywhere. Flexible
    /// bodies combine the old/new position velocity with the structural
    /// restoring force; the anchor marker stays pinned.
    pub fn desired_velocities(&self, structural: &StructuralConfig, dt: f64) -> Vec<[f64; 2]> {
        match self.kind {
            BodyKind::Rigid { velocity } => vec![velocity; self.markers.len()],
            BodyKind::Flexible => {
                let fs = self.structural_forces(structural);
                self.markers
                    .iter()
                    .enumerate()
                    .map(|(i, m)| {
                        if i == 0 {
                            return [0.0; 2]; // anchored
                        }
                        [
                            (m.position[0] - m.position_old[0]) / dt + dt * fs[i][0],
                            (m.position[1] - m.position_old[1]) / dt + dt * fs[i][1],
                        ]
                    })
                    .collect()
            }
        }
    }

    /// Tension + bending restoring force along the marker chain.
    fn structural_forces(&self, cfg: &StructuralConfig) -> Vec<[f64; 2]> {
        let n = self.markers.len();
        let ds2 = self.spacing * self.spacing;
        let ds4 = ds2 * ds2;
        let p = |i: isize| -> Option<[f64; 2]> {
            let idx = if self.closed {
                Some(i.rem_euclid(n as isize) as usize)
            } else if (0..n as isize).contains(&i) {
                Some(i as usize)
            } else {
                None
            };
            idx.map(|k| self.markers[k].position)
        };
        (0..n as isize)
            .map(|i| {
                let mut f = [0.0f64; 2];
                if let (Some(pm), Some(pc), Some(pp)) = (p(i - 1), p(i), p(i + 1)) {
                    for d in 0..2 {
                        f[d] += cfg.tension * (pp[d] - 2.0 * pc[d] + pm[d]) / ds2;
                    }
                }
                if let (Some(p2m), Some(pm), Some(pc), Some(pp), Some(p2p)) =
                    (p(i - 2), p(i - 1), p(i), p(i + 1), p(i + 2))
                {
                    for d in 0..2 {
                        f[d] -= cfg.bending
                            * (p2m[d] - 4.0 * pm[d] + 6.0 * pc[d] - 4.0 * pp[d] + p2p[d])
                            / ds4;
                    }
                }
                f
            })
            .collect()
    }
}
