//! Persistence-boundary lifecycle.
//!
//! A lifecycle verb called on a boundary node walks the graph reachable from
//! it with the [`recursor`], stopping at other boundaries, at fields that are
//! not persisted and at fields whose cascade policy excludes the verb. Every
//! visited object gets `before_<verb>`, the physical operation on the
//! [`ObjectPersistor`] and `after_<verb>`, in pre-order.

mod boundary;
mod lifecycle;
mod memory;
mod persistor;
pub mod recursor;
mod schema;

pub use boundary::*;
pub use memory::*;
pub use persistor::*;
pub use recursor::{recurse_object_graph, recursively_do, FieldValue, ObjectFilter, ObjectGraph, Recursor};
pub use schema::*;
