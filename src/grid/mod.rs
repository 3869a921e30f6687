//! Grid hierarchy: site storage, node records, and the arena that owns them.

pub mod hierarchy;
pub mod node;
pub mod site;

pub use hierarchy::{GridHierarchy, HierarchySnapshot};
pub use node::{GridNode, IndexBox, NodeId};
pub use site::{SiteField, SiteType};
