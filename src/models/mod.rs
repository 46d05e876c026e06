//! Content model for Infohub.
//!
//! # Core Concepts
//!
//! - [`ContentTree`]: arena owning every [`Node`] of one root folder's graph.
//!   Nodes are addressed by [`NodeId`]; the parent link is lookup-only and each
//!   container owns an ordered [`ChildList`] of child ids.
//! - [`NodeKind`]: the concrete kind of a node (root folder, folder, document,
//!   typed container, generic container/object, text line/block). Capabilities
//!   such as "has children" or "is a folder" are queries on the kind.
//! - Filesystem nodes (root, folders, documents) carry a name and a derived
//!   path. Only folders may parent filesystem nodes.
//! - Persistence boundaries (root folder, documents and typed containers by
//!   default) are the units that are added, activated and deleted as a whole;
//!   see [`crate::persist`].

mod children;
mod node;
mod property;
mod tree;

pub use children::*;
pub use node::*;
pub use property::*;
pub use tree::*;
