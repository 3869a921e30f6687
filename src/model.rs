//! D2Q9 velocity set: discrete velocities, quadrature weights, opposite
//! directions and the second-order equilibrium expansion.
//!
//! Directions 1..=8 are ordered east, north, west, south, then the four
//! diagonals; direction 0 is the rest particle. `OPPOSITE` is laid out so
//! bounce-back can reflect a population with a single lookup.

/// Number of discrete velocities.
pub const Q: usize = 9;

/// Discrete velocities (lattice units per sub-step).
pub const VELOCITIES: [[i32; 2]; Q] = [
    [0, 0],
    [1, 0],
    [0, 1],
    [-1, 0],
    [0, -1],
    [1, 1],
    [-1, 1],
    [-1, -1],
    [1, -1],
];

/// Quadrature weights for each direction.
pub const WEIGHTS: [f64; Q] = [
    4.0 / 9.0,
    1.0 / 9.0,
    1.0 / 9.0,
    1.0 / 9.0,
    1.0 / 9.0,
    1.0 / 36.0,
    1.0 / 36.0,
    1.0 / 36.0,
    1.0 / 36.0,
];

/// Opposite direction of each discrete velocity.
pub const OPPOSITE: [usize; Q] = [0, 3, 4, 1, 2, 7, 8, 5, 6];

/// Speed of sound squared in lattice units.
pub const CS2: f64 = 1.0 / 3.0;

/// Second-order equilibrium distribution for direction `q` at the given
/// macroscopic density and velocity.
#[inline]
pub fn equilibrium(q: usize, rho: f64, u: [f64; 2]) -> f64 {
    let c = VELOCITIES[q];
    let cu = c[0] as f64 * u[0] + c[1] as f64 * u[1];
    let uu = u[0] * u[0] + u[1] * u[1];
    WEIGHTS[q] * rho * (1.0 + cu / CS2 + cu * cu / (2.0 * CS2 * CS2) - uu / (2.0 * CS2))
}

/// First-order body-force source term for direction `q`.
///
/// Projects the accumulated site force onto the velocity set so the spread
/// immersed-boundary force enters the next relaxation.
#[inline]
pub fn force_source(q: usize, force: [f64; 2]) -> f64 {
    let c = VELOCITIES[q];
    let cf = c[0] as f64 * force[0] + c[1] as f64 * force[1];
    WEIGHTS[q] * cf / CS2
}
