//! `ObjectRegistry`: owns every immersed body, builds them from ingested
//! geometry, and exposes the state that external reporting and restart
//! encoding consume.

use crate::config::{BodyCase, SolverConfig};
use crate::error::CascadeError;
use crate::grid::hierarchy::GridHierarchy;
use crate::grid::node::NodeId;
use crate::grid::site::SiteType;
use crate::ibm::body::{Body, BodyKind};
use serde::{Deserialize, Serialize};

/// Registry of all bodies, mapped by body index. Built once at startup,
/// mutated by the predictor/corrector passes, and the only state persisted
/// across restarts (encoding owned externally).
#[derive(Debug, Clone, Default)]
pub struct ObjectRegistry {
    bodies: Vec<Body>,
    /// Grid hosting the immersed bodies.
    pub host: Option<NodeId>,
}

/// Marker state exposed for external snapshot encoding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerSnapshot {
    pub position: [f64; 2],
    pub position_old: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodySnapshot {
    pub markers: Vec<MarkerSnapshot>,
}

/// Registry state exposed on save; validated on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub bodies: Vec<BodySnapshot>,
}

impl ObjectRegistry {
    /// Build the registry from the configured immersed-boundary case.
    ///
    /// # Errors
    /// `Configuration` when the hosting (level, region) grid does not exist.
    pub fn from_config(cfg: &SolverConfig, hier: &GridHierarchy) -> Result<Self, CascadeError> {
        let mut reg = Self::default();
        if cfg.body == BodyCase::None {
            return Ok(reg);
        }
        let host = hier.find(cfg.body_level, cfg.body_region).ok_or_else(|| {
            CascadeError::Configuration(format!(
                "immersed body hosted on missing grid (level {}, region {})",
                cfg.body_level, cfg.body_region
            ))
        })?;
        reg.host = Some(host);
        match cfg.body {
            BodyCase::None => {}
            BodyCase::Circle {
                centre,
                radius,
                markers,
            } => {
                reg.ingest(
                    circle_points(centre, radius, markers),
                    BodyKind::Rigid { velocity: [0.0; 2] },
                    true,
                );
            }
            BodyCase::Plate {
                start,
                end,
                markers,
            } => {
                reg.ingest(
                    line_points(start, end, markers),
                    BodyKind::Rigid { velocity: [0.0; 2] },
                    false,
                );
            }
            BodyCase::Filament {
                start,
                length,
                markers,
            } => {
                reg.ingest(
                    line_points(start, [start[0] + length, start[1]], markers),
                    BodyKind::Flexible,
                    false,
                );
            }
        }
        log::info!(
            "object registry built: {} body(ies), {} marker(s) total",
            reg.bodies.len(),
            reg.bodies.iter().map(|b| b.markers.len()).sum::<usize>()
        );
        Ok(reg)
    }

    /// Add a body from an ordered, lattice-unit point list; returns its
    /// index.
    pub fn ingest(&mut self, points: Vec<[f64; 2]>, kind: BodyKind, closed: bool) -> usize {
        self.bodies.push(Body::from_points(points, kind, closed));
        self.bodies.len() - 1
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn bodies_mut(&mut self) -> &mut [Body] {
        &mut self.bodies
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Label lattice sites covered by an ingested solid point cloud.
    ///
    /// Each point marks the site containing it on the target grid; typing
    /// happens once at build time and stays fixed for steady-topology runs.
    pub fn label_solid_sites(
        points: &[[f64; 2]],
        hier: &mut GridHierarchy,
        node_id: NodeId,
    ) -> Result<usize, CascadeError> {
        let node = hier.node_mut(node_id)?;
        let mut labelled = 0;
        for p in points {
            let gx = (p[0] / node.dx).floor() as i64;
            let gy = (p[1] / node.dx).floor() as i64;
            if let Some(s) = node.local_index(gx, gy) {
                node.field.ty[s] = SiteType::Solid;
                labelled += 1;
            }
        }
        Ok(labelled)
    }

    /// Capture marker state for external snapshot encoding.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            bodies: self
                .bodies
                .iter()
                .map(|b| BodySnapshot {
                    markers: b
                        .markers
                        .iter()
                        .map(|m| MarkerSnapshot {
                            position: m.position,
                            position_old: m.position_old,
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    /// Restore marker state from a snapshot.
    ///
    /// # Errors
    /// `RestartMismatch` when body or per-body marker counts disagree with
    /// the live registry.
    pub fn restore(&mut self, snap: &RegistrySnapshot) -> Result<(), CascadeError> {
        if snap.bodies.len() != self.bodies.len() {
            return Err(CascadeError::RestartMismatch {
                what: "bodies",
                expected: self.bodies.len(),
                found: snap.bodies.len(),
            });
        }
        for (body, bs) in self.bodies.iter_mut().zip(&snap.bodies) {
            if bs.markers.len() != body.markers.len() {
                return Err(CascadeError::RestartMismatch {
                    what: "markers in a body",
                    expected: body.markers.len(),
                    found: bs.markers.len(),
                });
            }
            for (m, ms) in body.markers.iter_mut().zip(&bs.markers) {
                m.position = ms.position;
                m.position_old = ms.position_old;
                m.support.clear();
            }
        }
        Ok(())
    }

    /// Per-body aggregate force since the last reset, then zero the
    /// accumulators (called once per reporting period).
    pub fn take_force_report(&mut self) -> Vec<[f64; 2]> {
        self.bodies
            .iter_mut()
            .map(|b| std::mem::replace(&mut b.force_total, [0.0; 2]))
            .collect()
    }
}

/// Ordered points of a circle traversed counter-clockwise (closed body).
pub fn circle_points(centre: [f64; 2], radius: f64, n: usize) -> Vec<[f64; 2]> {
    (0..n)
        .map(|k| {
            let theta = 2.0 * std::f64::consts::PI * k as f64 / n as f64;
            [
                centre[0] + radius * theta.cos(),
                centre[1] + radius * theta.sin(),
            ]
        })
        .collect()
}

/// Ordered points along a straight segment, endpoints included.
pub fn line_points(start: [f64; 2], end: [f64; 2], n: usize) -> Vec<[f64; 2]> {
    (0..n)
        .map(|k| {
            let t = if n > 1 { k as f64 / (n - 1) as f64 } else { 0.0 };
            [
                start[0] + t * (end[0] - start[0]),
                start[1] + t * (end[1] - start[1]),
            ]
        })
        .collect()
}
