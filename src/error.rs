//! CascadeError: unified error type for lbm-cascade public APIs.
//!
//! Every core-detected error is unrecoverable for the run: a malformed grid
//! or halo mismatch invalidates all subsequent steps, so callers are expected
//! to log the diagnostic and terminate. Nothing is retried.

use thiserror::Error;

/// Unified error type for lbm-cascade operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CascadeError {
    /// Hierarchy or refinement configuration inconsistent with the requested
    /// grid. Detected before the time loop starts.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Rank topology cannot satisfy the requested decomposition, or a halo
    /// partner disagrees about an exchange. Detected at startup.
    #[error("topology error: {0}")]
    Topology(String),

    /// A restart snapshot disagrees with the live hierarchy or registry.
    #[error("restart mismatch: expected {expected} {what}, snapshot has {found}")]
    RestartMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    /// A halo or collective exchange failed. All ranks must reach the same
    /// fatal decision; the communicator's `abort` hook exists so a rank-local
    /// failure cannot leave peers blocked on a collective.
    #[error("communication error with rank {peer}: {reason}")]
    Comm { peer: usize, reason: String },

    /// A node handle did not resolve in the hierarchy arena. The hierarchy is
    /// structurally static for the entire run, so this is a configuration
    /// error surfaced mid-traversal.
    #[error("missing expected grid node {0} during traversal")]
    MissingNode(usize),
}
