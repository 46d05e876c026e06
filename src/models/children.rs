//! Ordered child collection owned by a single container node.
//!
//! The read API is public. Mutation is crate-private so that every insert or
//! removal goes through [`ContentTree`](super::ContentTree), which validates
//! the child's kind against the owner and keeps the parent links consistent.

use std::fmt;

use super::node::NodeId;
use crate::error::{ContentError, Result};

/// Backing storage for a child list, produced by a
/// [`CollectionFactory`](crate::persist::CollectionFactory).
pub trait ListStorage {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn as_slice(&self) -> &[NodeId];
    fn insert(&mut self, index: usize, id: NodeId);
    fn remove(&mut self, index: usize) -> NodeId;
    fn clear(&mut self);
}

/// Plain vector-backed list storage.
#[derive(Debug, Default, Clone)]
pub struct VecStorage {
    items: Vec<NodeId>,
}

impl VecStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }
}

impl ListStorage for VecStorage {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn as_slice(&self) -> &[NodeId] {
        &self.items
    }

    fn insert(&mut self, index: usize, id: NodeId) {
        self.items.insert(index, id);
    }

    fn remove(&mut self, index: usize) -> NodeId {
        self.items.remove(index)
    }

    fn clear(&mut self) {
        self.items.clear();
    }
}

pub struct ChildList {
    owner: NodeId,
    storage: Box<dyn ListStorage>,
}

impl ChildList {
    pub(crate) fn new(owner: NodeId, storage: Box<dyn ListStorage>) -> Self {
        Self { owner, storage }
    }

    /// The container that owns this list.
    pub fn owner(&self) -> NodeId {
        self.owner
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<NodeId> {
        self.storage.as_slice().get(index).copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.storage.as_slice().contains(&id)
    }

    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.storage.as_slice().iter().position(|c| *c == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.storage.as_slice().iter().copied()
    }

    pub fn as_slice(&self) -> &[NodeId] {
        self.storage.as_slice()
    }

    pub(crate) fn insert(&mut self, index: usize, id: NodeId) -> Result<()> {
        if index > self.len() {
            return Err(ContentError::OutOfRange {
                index,
                len: self.len(),
            });
        }
        if self.contains(id) {
            return Err(ContentError::invalid_argument(format!(
                "{id} is already a child of {}",
                self.owner
            )));
        }
        self.storage.insert(index, id);
        Ok(())
    }

    pub(crate) fn push(&mut self, id: NodeId) -> Result<()> {
        self.insert(self.len(), id)
    }

    /// Removes `id`, returning the index it occupied.
    pub(crate) fn remove(&mut self, id: NodeId) -> Option<usize> {
        let index = self.index_of(id)?;
        self.storage.remove(index);
        Some(index)
    }

    pub(crate) fn remove_at(&mut self, index: usize) -> Result<NodeId> {
        if index >= self.len() {
            return Err(ContentError::OutOfRange {
                index,
                len: self.len(),
            });
        }
        Ok(self.storage.remove(index))
    }

    pub(crate) fn clear(&mut self) {
        self.storage.clear();
    }
}

impl fmt::Debug for ChildList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.storage.as_slice()).finish()
    }
}
