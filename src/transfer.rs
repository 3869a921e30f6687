//! Inter-level transfer: explosion (coarse→fine boundary injection) and
//! coalescence (fine→coarse conservative restriction).
//!
//! Explosion always precedes a fine sub-cycle; coalescence always follows
//! its final sub-step. Both transfers are rank-local by construction: a
//! rank's fine cells lie inside its own coarse slab, and a fine ghost cell
//! maps at worst onto the coarse halo ring, which the parent's exchange has
//! already refreshed.

use crate::error::CascadeError;
use crate::grid::node::GridNode;
use crate::grid::site::SiteType;
use crate::halo::HaloPlan;
use crate::model::Q;

/// Inject coarse state into the fine grid's region-edge ghost sites, acting
/// as the boundary condition for the upcoming fine sub-cycle.
pub fn explode(
    parent: &GridNode,
    child: &mut GridNode,
    child_plan: &HaloPlan,
) -> Result<(), CascadeError> {
    if !child.is_local() {
        return Ok(());
    }
    let stride = child.field.stride();
    for &s in &child_plan.explosion_sites {
        let (i, j) = (s % stride, s / stride);
        let (gx, gy) = child.global_of_local(i, j);
        let (px, py) = (gx.div_euclid(2), gy.div_euclid(2));
        let sp = parent.local_index(px, py).ok_or_else(|| {
            CascadeError::Configuration(format!(
                "fine ghost cell ({gx}, {gy}) at level {} maps outside the parent's halo",
                child.level
            ))
        })?;
        child.field.f[s] = parent.field.f[sp];
        child.field.rho[s] = parent.field.rho[sp];
        child.field.u[s] = parent.field.u[sp];
        child.field.force[s] = parent.field.force[sp];
    }
    Ok(())
}

/// Restrict fine-grid state back into the coincident coarse cells, strictly
/// after the fine sub-cycle's final sub-step.
///
/// Each covered coarse cell takes the average of its 2×2 fine cells, which
/// conserves the overlap region's mass and momentum; coarse moments are then
/// recomputed from the restricted distributions.
pub fn coalesce(child: &GridNode, parent: &mut GridNode) -> Result<(), CascadeError> {
    if !child.is_local() {
        return Ok(());
    }
    debug_assert!(child.owned.x0 % 2 == 0 && child.owned.y0 % 2 == 0);
    let (px0, px1) = (child.owned.x0 / 2, child.owned.x1 / 2);
    let (py0, py1) = (child.owned.y0 / 2, child.owned.y1 / 2);
    for py in py0..py1 {
        for px in px0..px1 {
            let sp = parent.local_index(px as i64, py as i64).ok_or_else(|| {
                CascadeError::Configuration(format!(
                    "coarse cell ({px}, {py}) under level-{} region not local to this rank",
                    child.level
                ))
            })?;
            if parent.field.ty[sp] == SiteType::Solid {
                continue;
            }
            let mut acc = [0.0f64; Q];
            for (ox, oy) in [(0i64, 0i64), (1, 0), (0, 1), (1, 1)] {
                let sc = child
                    .local_index(px as i64 * 2 + ox, py as i64 * 2 + oy)
                    .expect("fine cells of a covered coarse cell are local");
                for q in 0..Q {
                    acc[q] += child.field.f[sc][q];
                }
            }
            for q in 0..Q {
                parent.field.f[sp][q] = acc[q] * 0.25;
            }
            parent.field.recompute_moments(sp);
        }
    }
    Ok(())
}
