//! # lbm-cascade
//!
//! lbm-cascade is the core of a parallel, multi-resolution lattice Boltzmann
//! flow solver: a hierarchy of nested Cartesian grids distributed across
//! compute ranks, advanced by a recursive multi-rate scheduler (2× temporal
//! refinement per level) with halo exchange between ranks, explosion and
//! coalescence between levels, and optional two-way coupling to Lagrangian
//! immersed boundaries (rigid or flexible).
//!
//! ## Scope
//! File-format writers/readers, CLI handling, raw point-cloud rescaling and
//! log sinks are external collaborators: the core exposes snapshot and
//! reporting state as plain data and consumes configuration and geometry as
//! opaque inputs. It owns no network protocol or persisted byte layout.
//!
//! ## Determinism
//! Each rank is single-threaded and executes in program order. A kernel call
//! depends only on the node's own pre-step state and halo values from the
//! prior exchange; exchanges post every receive before any send, and
//! barriers bracket each macro step.
//!
//! ## Usage
//! Add `lbm-cascade` as a dependency and enable features as needed:
//!
//! ```toml
//! [dependencies]
//! lbm-cascade = "0.3"
//! # Optional features:
//! # features = ["mpi-support"]
//! ```
//!
//! Serial runs use [`comm::NoComm`]; multi-rank tests use
//! [`comm::LocalComm`]; production runs enable `mpi-support` and construct
//! an `MpiComm` per rank.

pub mod comm;
pub mod config;
pub mod decomp;
pub mod error;
pub mod grid;
pub mod halo;
pub mod ibm;
pub mod kernel;
pub mod model;
pub mod scheduler;
pub mod sim;
pub mod transfer;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    #[cfg(feature = "mpi-support")]
    pub use crate::comm::MpiComm;
    pub use crate::comm::{CommTag, Communicator, LocalComm, NoComm, Wait};
    pub use crate::config::{BodyCase, DomainConfig, RankGridConfig, RegionConfig, SolverConfig};
    pub use crate::decomp::RankTopology;
    pub use crate::error::CascadeError;
    pub use crate::grid::{GridHierarchy, GridNode, IndexBox, NodeId, SiteField, SiteType};
    pub use crate::halo::HaloPlan;
    pub use crate::ibm::{Body, BodyKind, Marker, ObjectRegistry, RegistrySnapshot};
    pub use crate::scheduler::TimeStepScheduler;
    pub use crate::sim::{RunSnapshot, Simulation};
}
