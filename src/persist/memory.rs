//! Plain in-memory persistor.
//!
//! Useful for tests and for pipelines that only need lifecycle callbacks
//! without a database. Clones share the same store.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use anyhow::{anyhow, Result};

use super::boundary::LifecycleVerb;
use super::persistor::{CollectionFactory, NodeRecord, ObjectPersistor};
use super::schema::TypeSchema;
use crate::models::{HashPropertyMap, ListStorage, NodeId, PropertyMap, VecStorage};

/// Collection factory producing plain vectors and hash maps.
#[derive(Debug, Default, Clone, Copy)]
pub struct InMemoryCollections;

impl CollectionFactory for InMemoryCollections {
    fn create_list(&self, _owner: NodeId) -> Box<dyn ListStorage> {
        Box::new(VecStorage::new())
    }

    fn create_map(&self, _owner: NodeId) -> Box<dyn PropertyMap> {
        Box::new(HashPropertyMap::default())
    }
}

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<NodeId, NodeRecord>,
    activated: HashSet<NodeId>,
    operations: Vec<(LifecycleVerb, NodeId)>,
    schemas: Vec<&'static str>,
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Rc<RefCell<Inner>>,
    collections: InMemoryCollections,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn record(&self, id: NodeId) -> Option<NodeRecord> {
        self.inner.borrow().records.get(&id).cloned()
    }

    /// Every physical operation performed so far, in order.
    pub fn operations(&self) -> Vec<(LifecycleVerb, NodeId)> {
        self.inner.borrow().operations.clone()
    }

    pub fn clear_operations(&self) {
        self.inner.borrow_mut().operations.clear();
    }

    /// Kind tags passed to `process_schema`, in order.
    pub fn processed_schemas(&self) -> Vec<&'static str> {
        self.inner.borrow().schemas.clone()
    }

    fn load(&self, id: NodeId, verb: LifecycleVerb) -> Result<NodeRecord> {
        let mut inner = self.inner.borrow_mut();
        let record = inner
            .records
            .get(&id)
            .cloned()
            .ok_or_else(|| anyhow!("Node {} is not stored", id))?;
        inner.activated.insert(id);
        inner.operations.push((verb, id));
        Ok(record)
    }

    fn store(&self, record: &NodeRecord, verb: LifecycleVerb) {
        let mut inner = self.inner.borrow_mut();
        inner.records.insert(record.id, record.clone());
        inner.activated.insert(record.id);
        inner.operations.push((verb, record.id));
    }
}

impl ObjectPersistor for MemoryStore {
    fn collection_factory(&self) -> &dyn CollectionFactory {
        &self.collections
    }

    fn process_schema(&self, schema: &TypeSchema) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if !inner.schemas.contains(&schema.kind) {
            inner.schemas.push(schema.kind);
        }
        Ok(())
    }

    fn is_activated(&self, id: NodeId) -> bool {
        self.inner.borrow().activated.contains(&id)
    }

    fn is_stored(&self, id: NodeId) -> Result<bool> {
        Ok(self.inner.borrow().records.contains_key(&id))
    }

    fn fetch(&self, id: NodeId) -> Result<Option<NodeRecord>> {
        Ok(self.record(id))
    }

    fn activate(&self, id: NodeId) -> Result<NodeRecord> {
        self.load(id, LifecycleVerb::Activate)
    }

    fn deactivate(&self, id: NodeId) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.activated.remove(&id);
        inner.operations.push((LifecycleVerb::Deactivate, id));
        Ok(())
    }

    fn add(&self, record: &NodeRecord) -> Result<()> {
        self.store(record, LifecycleVerb::Add);
        Ok(())
    }

    fn update(&self, record: &NodeRecord) -> Result<()> {
        self.store(record, LifecycleVerb::Update);
        Ok(())
    }

    fn delete(&self, id: NodeId) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.records.remove(&id);
        inner.activated.remove(&id);
        inner.operations.push((LifecycleVerb::Delete, id));
        Ok(())
    }

    fn refresh(&self, id: NodeId) -> Result<NodeRecord> {
        self.load(id, LifecycleVerb::Refresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_then_activate() {
        let store = MemoryStore::new();
        let record = NodeRecord::new(NodeId::new(), "folder", None);
        store.add(&record).unwrap();
        assert!(store.is_stored(record.id).unwrap());
        store.deactivate(record.id).unwrap();
        assert!(!store.is_activated(record.id));
        assert_eq!(store.activate(record.id).unwrap(), record);
        assert!(store.is_activated(record.id));
    }

    #[test]
    fn test_activate_missing_fails() {
        let store = MemoryStore::new();
        assert!(store.activate(NodeId::new()).is_err());
        assert!(store.operations().is_empty());
    }

    #[test]
    fn test_clones_share_state() {
        let store = MemoryStore::new();
        let other = store.clone();
        let record = NodeRecord::new(NodeId::new(), "object", None);
        other.add(&record).unwrap();
        assert_eq!(store.len(), 1);
        store.delete(record.id).unwrap();
        assert!(other.is_empty());
        assert_eq!(
            other.operations(),
            vec![
                (LifecycleVerb::Add, record.id),
                (LifecycleVerb::Delete, record.id)
            ]
        );
    }
}
