//! Lifecycle verbs on a [`ContentTree`]: the persistor facade.

use std::collections::{BTreeMap, HashSet};

use serde_json::json;
use tracing::{debug, info, warn};

use super::boundary::{
    notify_after, notify_before, BoundaryState, LifecycleVerb, PersistenceNotification,
};
use super::persistor::NodeRecord;
use super::recursor::{recurse_object_graph, recursively_do, FieldValue, ObjectFilter, ObjectGraph, Recursor};
use super::schema::FieldSchema;
use crate::error::{ContentError, Result};
use crate::models::{ContentTree, Node, NodeId, PropertyValue};

/// Admits the objects one lifecycle verb on `boundary` cascades to.
///
/// Rejects every other boundary, the boundary's own parent, fields that are
/// not persisted and fields whose cascade policy excludes the verb.
pub(crate) struct LifecycleFilter {
    boundary: NodeId,
    boundary_parent: Option<NodeId>,
    verb: LifecycleVerb,
}

impl LifecycleFilter {
    pub(crate) fn new(boundary: NodeId, boundary_parent: Option<NodeId>, verb: LifecycleVerb) -> Self {
        Self {
            boundary,
            boundary_parent,
            verb,
        }
    }
}

impl ObjectFilter<ContentTree> for LifecycleFilter {
    fn admit(
        &mut self,
        tree: &ContentTree,
        field: Option<&FieldSchema>,
        object: NodeId,
        _referrer: Option<NodeId>,
    ) -> bool {
        if object == self.boundary {
            return true;
        }
        if Some(object) == self.boundary_parent {
            return false;
        }
        if let Some(field) = field {
            if !field.persisted || !field.cascade.unwrap_or_default().allows(self.verb) {
                return false;
            }
        }
        tree.nodes
            .get(&object)
            .is_some_and(|node| !tree.schemas.is_boundary(&node.kind))
    }
}

impl ObjectGraph for ContentTree {
    type Id = NodeId;

    /// Field cascade policies are reported already resolved against the
    /// type's default.
    fn fields(&self, object: NodeId) -> Vec<(FieldSchema, FieldValue<NodeId>)> {
        let Some(node) = self.nodes.get(&object) else {
            return Vec::new();
        };
        let Some(schema) = self.schemas.get(node.kind.tag()) else {
            return Vec::new();
        };
        schema
            .fields
            .iter()
            .map(|field| {
                let resolved = FieldSchema {
                    cascade: Some(schema.effective_cascade(field)),
                    ..*field
                };
                (resolved, self.field_value(node, field.name))
            })
            .collect()
    }
}

impl ContentTree {
    // ============================================================
    // Boundary queries
    // ============================================================

    pub fn is_boundary(&self, id: NodeId) -> Result<bool> {
        Ok(self.schemas.is_boundary(&self.node(id)?.kind))
    }

    /// Lifecycle state of `id`; erased nodes report `Deleted`.
    pub fn state(&self, id: NodeId) -> Result<BoundaryState> {
        if self.tombstones.contains(&id) {
            return Ok(BoundaryState::Deleted);
        }
        Ok(self.node(id)?.state)
    }

    /// The objects a verb on `boundary` would reach, in pre-order.
    pub fn bounded_set(&self, boundary: NodeId, verb: LifecycleVerb) -> Result<Vec<NodeId>> {
        let parent = self.node(boundary)?.parent;
        let mut filter = LifecycleFilter::new(boundary, parent, verb);
        Ok(recurse_object_graph(self, boundary, parent, &mut filter))
    }

    // ============================================================
    // Lifecycle verbs
    // ============================================================

    /// Loads a stored boundary and everything it holds.
    ///
    /// Objects are loaded while the walk proceeds, so the walk descends into
    /// the freshly loaded children. Nested boundaries come back as unloaded
    /// stubs. Returns the number of objects activated.
    pub fn activate(&mut self, id: NodeId) -> Result<usize> {
        self.require_boundary(id)?;
        if self.node(id)?.state == BoundaryState::Activated {
            return Err(ContentError::invalid_state(format!("{id} is already activated")));
        }
        if !self.persistor.is_stored(id)? {
            return Err(ContentError::invalid_state(format!("{id} has never been stored")));
        }

        let count = self.load_walk(id, LifecycleVerb::Activate)?;
        self.node_mut(id)?.state = BoundaryState::Activated;
        self.collect_unreachable()?;
        debug!(boundary = %id, objects = count, "Activated boundary");
        Ok(count)
    }

    /// Re-reads the stored state of an activated boundary.
    pub fn refresh(&mut self, id: NodeId) -> Result<usize> {
        self.require_activated(id)?;
        let count = self.load_walk(id, LifecycleVerb::Refresh)?;
        self.collect_unreachable()?;
        debug!(boundary = %id, objects = count, "Refreshed boundary");
        Ok(count)
    }

    /// Stores the boundary and every object it reaches, whether or not they
    /// were stored before. Leaves the boundary activated.
    pub fn add(&mut self, id: NodeId) -> Result<usize> {
        self.require_boundary(id)?;
        if !self.node(id)?.loaded {
            return Err(ContentError::invalid_state(format!(
                "{id} is stored but not loaded; activate it first"
            )));
        }
        let count = self.apply_verb(id, LifecycleVerb::Add)?;
        self.node_mut(id)?.state = BoundaryState::Activated;
        debug!(boundary = %id, objects = count, "Added boundary");
        Ok(count)
    }

    pub fn update(&mut self, id: NodeId) -> Result<usize> {
        self.require_activated(id)?;
        let count = self.apply_verb(id, LifecycleVerb::Update)?;
        debug!(boundary = %id, objects = count, "Updated boundary");
        Ok(count)
    }

    /// Unloads an activated boundary without deleting its stored state.
    ///
    /// The boundary stays in the tree as an unloaded stub; its content is
    /// dropped from memory.
    pub fn deactivate(&mut self, id: NodeId) -> Result<usize> {
        self.require_activated(id)?;
        let count = self.apply_verb(id, LifecycleVerb::Deactivate)?;

        let mut detached = Vec::new();
        if let Some(children) = self.node_mut(id)?.children.as_mut() {
            detached.extend(children.iter());
            children.clear();
        }
        for child in detached {
            if let Some(node) = self.nodes.get_mut(&child) {
                node.parent = None;
            }
        }
        let node = self.node_mut(id)?;
        node.references.clear();
        node.property_bag = None;
        node.loaded = false;
        node.state = BoundaryState::NotActivated;

        self.collect_unreachable()?;
        debug!(boundary = %id, objects = count, "Deactivated boundary");
        Ok(count)
    }

    /// Removes `id` from the tree and erases what the store holds for it.
    ///
    /// Every stored boundary in the removed subtree is erased as a whole
    /// (unloaded ones are activated first). A stored record of an enclosing
    /// boundary keeps listing `id` until that boundary is updated.
    pub fn delete(&mut self, id: NodeId) -> Result<usize> {
        if self.tombstones.contains(&id) {
            return Err(ContentError::invalid_state(format!("{id} is already deleted")));
        }
        let node = self.node(id)?;
        if node.kind.is_root() {
            return Err(ContentError::not_supported(
                "a root folder cannot be deleted from its own tree; destroy the tree instead",
            ));
        }
        if self.schemas.is_boundary(&node.kind) && !self.persistor.is_stored(id)? {
            return Err(ContentError::invalid_state(format!(
                "{id} is not known to the store"
            )));
        }

        let mut erased = Vec::new();
        let count = self.erase(id, &mut erased)?;

        if let Some(parent) = self.node(id)?.parent {
            self.child_list_mut(parent)?.remove(id);
        }
        self.node_mut(id)?.parent = None;
        self.collect_unreachable()?;
        let dropped: Vec<NodeId> = erased
            .into_iter()
            .filter(|object| !self.nodes.contains_key(object))
            .collect();
        self.tombstones.extend(dropped);

        info!(node = %id, objects = count, "Deleted node");
        Ok(count)
    }

    /// Erases every stored boundary of the tree and drops it.
    pub fn destroy(mut self) -> Result<usize> {
        let root = self.root;
        let mut erased = Vec::new();
        let count = self.erase(root, &mut erased)?;
        info!(root = %root, objects = count, "Destroyed content tree");
        Ok(count)
    }

    // ============================================================
    // Walks
    // ============================================================

    fn load_walk(&mut self, boundary: NodeId, verb: LifecycleVerb) -> Result<usize> {
        let parent = self.node(boundary)?.parent;
        let mut filter = LifecycleFilter::new(boundary, parent, verb);
        let mut recursor = Recursor::new(boundary, parent);
        let mut count = 0;
        while let Some(object) = recursor.next(&*self, &mut filter) {
            if self.apply_one(object, verb)? {
                count += 1;
            }
        }
        Ok(count)
    }

    fn apply_verb(&mut self, boundary: NodeId, verb: LifecycleVerb) -> Result<usize> {
        let objects = self.bounded_set(boundary, verb)?;
        recursively_do(objects, |object| self.apply_one(object, verb))
    }

    /// Before hook, physical operation, after hook for a single object.
    fn apply_one(&mut self, object: NodeId, verb: LifecycleVerb) -> Result<bool> {
        if !self.nodes.contains_key(&object) {
            return Ok(false);
        }
        self.fire(object, verb, notify_before);
        match verb {
            LifecycleVerb::Activate => {
                let record = self.persistor.activate(object)?;
                self.apply_record(record)?;
            }
            LifecycleVerb::Refresh => {
                let record = self.persistor.refresh(object)?;
                self.apply_record(record)?;
            }
            LifecycleVerb::Add => {
                let record = self.record(object)?;
                self.persistor.add(&record)?;
                self.tombstones.remove(&object);
            }
            LifecycleVerb::Update => {
                let record = self.record(object)?;
                self.persistor.update(&record)?;
                self.tombstones.remove(&object);
            }
            LifecycleVerb::Delete => self.persistor.delete(object)?,
            LifecycleVerb::Deactivate => self.persistor.deactivate(object)?,
        }
        self.fire(object, verb, notify_after);
        debug!(node = %object, verb = verb.as_str(), "Applied lifecycle verb");
        Ok(true)
    }

    fn fire(
        &mut self,
        object: NodeId,
        verb: LifecycleVerb,
        dispatch: fn(&mut dyn PersistenceNotification, LifecycleVerb, NodeId),
    ) {
        if let Some(callbacks) = self.nodes.get_mut(&object).and_then(|n| n.callbacks.as_mut()) {
            dispatch(&mut **callbacks, verb, object);
        }
    }

    /// Deletes the stored state of `id` and its descendants, then recurses
    /// into the boundaries below it. Objects reached only through references
    /// are left alone. Boundaries that were never stored are skipped, though
    /// stored boundaries below them are not.
    fn erase(&mut self, id: NodeId, erased: &mut Vec<NodeId>) -> Result<usize> {
        let node = self.node(id)?;
        let boundary = self.schemas.is_boundary(&node.kind);
        let loaded = node.loaded;
        let mut count = 0;

        if boundary && !self.persistor.is_stored(id)? {
            for nested in self.boundaries_below(id) {
                count += self.erase(nested, erased)?;
            }
            return Ok(count);
        }
        if !loaded {
            self.activate(id)?;
        }

        let objects: Vec<NodeId> = self
            .bounded_set(id, LifecycleVerb::Delete)?
            .into_iter()
            .filter(|object| *object == id || self.has_ancestor(*object, id))
            .collect();
        let within: HashSet<NodeId> = objects.iter().copied().collect();
        let mut nested = Vec::new();
        for object in &objects {
            for child in self.children(*object)? {
                if !within.contains(child) && self.is_boundary(*child)? {
                    nested.push(*child);
                }
            }
        }

        count += recursively_do(objects.iter().copied(), |object| {
            self.apply_one(object, LifecycleVerb::Delete)
        })?;
        if boundary {
            self.node_mut(id)?.state = BoundaryState::Deleted;
        }
        erased.extend(objects);

        for nested in nested {
            count += self.erase(nested, erased)?;
        }
        Ok(count)
    }

    /// Closest boundaries strictly below `id` through child links.
    fn boundaries_below(&self, id: NodeId) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).map(<[NodeId]>::to_vec).unwrap_or_default();
        stack.reverse();
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            if self.schemas.is_boundary(&node.kind) {
                found.push(current);
            } else if let Some(children) = node.children.as_ref() {
                stack.extend(children.as_slice().iter().rev().copied());
            }
        }
        found
    }

    /// Drops every node no longer reachable from the root through child
    /// links. Objects the store still holds activated are deactivated
    /// physically; no hooks fire for them.
    fn collect_unreachable(&mut self) -> Result<()> {
        let reachable: HashSet<NodeId> = self.subtree(self.root)?.into_iter().collect();
        let unreachable: Vec<NodeId> = self
            .nodes
            .keys()
            .copied()
            .filter(|id| !reachable.contains(id))
            .collect();
        if unreachable.is_empty() {
            return Ok(());
        }

        for id in &unreachable {
            if self.persistor.is_activated(*id) {
                self.persistor.deactivate(*id)?;
            }
            self.nodes.remove(id);
        }
        debug!(dropped = unreachable.len(), "Dropped unreachable nodes");
        Ok(())
    }

    fn require_boundary(&self, id: NodeId) -> Result<()> {
        if self.tombstones.contains(&id) {
            return Err(ContentError::invalid_state(format!("{id} has been deleted")));
        }
        let node = self.node(id)?;
        if !self.schemas.is_boundary(&node.kind) {
            return Err(ContentError::invalid_argument(format!(
                "a {} is not a persistence boundary",
                node.kind.tag()
            )));
        }
        Ok(())
    }

    fn require_activated(&self, id: NodeId) -> Result<()> {
        self.require_boundary(id)?;
        let state = self.node(id)?.state;
        if state != BoundaryState::Activated {
            return Err(ContentError::invalid_state(format!(
                "{id} is {}, not activated",
                state.as_str()
            )));
        }
        Ok(())
    }

    // ============================================================
    // Records
    // ============================================================

    /// Stored form of `id`: every persisted field except the parent link.
    pub fn record(&self, id: NodeId) -> Result<NodeRecord> {
        let node = self.node(id)?;
        let tag = node.kind.tag();
        let mut record = NodeRecord::new(id, tag, node.parent);
        let Some(schema) = self.schemas.get(tag) else {
            return Ok(record);
        };

        for field in schema.fields.iter().filter(|f| f.persisted) {
            let value = match field.name {
                "parent" | "observers" => continue,
                "children" => json!(node
                    .children
                    .as_ref()
                    .map(|c| c.iter().map(|id| id.to_string()).collect::<Vec<_>>())
                    .unwrap_or_default()),
                "references" => json!(node
                    .references
                    .iter()
                    .map(|(name, target)| (name.clone(), target.to_string()))
                    .collect::<BTreeMap<_, _>>()),
                "property_bag" => {
                    let entries: BTreeMap<&str, &PropertyValue> = node
                        .property_bag
                        .as_ref()
                        .map(|bag| bag.entries().into_iter().collect())
                        .unwrap_or_default();
                    serde_json::to_value(entries).map_err(anyhow::Error::from)?
                }
                "name" => json!(node.name),
                "path" => json!(self.path(id)?),
                "root" => json!(self.root_folder(id)?.map(|r| r.to_string())),
                "source" => json!(node.kind.source()),
                "mime_type" => json!(node.kind.mime_type()),
                "text" => json!(node.kind.text()),
                _ => continue,
            };
            record.fields.insert(field.name.to_string(), value);
        }
        Ok(record)
    }

    /// Replaces the in-memory state of a node with a stored record.
    ///
    /// Children missing from memory are created as unloaded stubs; listed
    /// children the store no longer holds are skipped. Stored properties are
    /// never read back.
    pub(crate) fn apply_record(&mut self, record: NodeRecord) -> Result<()> {
        let id = record.id;
        let kind = record.node_kind()?;
        let stored_children = record.children()?;
        let references = record.references()?;
        let bag = record.property_bag()?;

        let mut children = Vec::with_capacity(stored_children.len());
        for child in stored_children {
            if children.contains(&child) {
                continue;
            }
            if !self.nodes.contains_key(&child) {
                match self.persistor.fetch(child)? {
                    Some(child_record) => self.insert_stub(&child_record, Some(id))?,
                    None => {
                        warn!(node = %id, child = %child, "Skipping child missing from store");
                        continue;
                    }
                }
            }
            children.push(child);
        }

        let factory = self.persistor.collection_factory();
        let node = self.nodes.get_mut(&id).ok_or(ContentError::UnknownNode(id))?;
        if !node.kind.is_root() {
            node.name = record.str_field("name").map(str::to_string);
        }
        node.kind = kind;
        node.references = references;
        if let Some(bag) = bag {
            let mut map = factory.create_map(id);
            for (key, value) in bag {
                map.insert(key, value);
            }
            node.property_bag = Some(map);
        }
        node.loaded = true;

        let previous: Vec<NodeId> = match node.children.as_mut() {
            Some(list) => {
                let previous: Vec<NodeId> = list.iter().collect();
                list.clear();
                for child in &children {
                    list.push(*child)?;
                }
                previous
            }
            None => Vec::new(),
        };

        for child in previous {
            if !children.contains(&child) {
                if let Some(node) = self.nodes.get_mut(&child) {
                    node.parent = None;
                }
            }
        }
        for child in children {
            let old_parent = self.nodes.get(&child).and_then(|n| n.parent);
            if let Some(old_parent) = old_parent.filter(|p| *p != id) {
                if let Ok(list) = self.child_list_mut(old_parent) {
                    list.remove(child);
                }
            }
            if let Some(node) = self.nodes.get_mut(&child) {
                node.parent = Some(id);
            }
        }
        Ok(())
    }

    fn field_value(&self, node: &Node, field: &str) -> FieldValue<NodeId> {
        let present = |ids: Vec<NodeId>| {
            FieldValue::Sequence(ids.into_iter().filter(|id| self.nodes.contains_key(id)).collect())
        };
        match field {
            "parent" => node.parent.map_or(FieldValue::Empty, FieldValue::Object),
            "children" => match node.children.as_ref() {
                Some(children) => present(children.iter().collect()),
                None => FieldValue::Empty,
            },
            "references" => present(node.references.values().copied().collect()),
            "property_bag" => match node.property_bag.as_ref() {
                Some(bag) => present(
                    bag.entries()
                        .into_iter()
                        .filter_map(|(_, value)| value.as_node())
                        .collect(),
                ),
                None => FieldValue::Empty,
            },
            "root" => self
                .root_folder(node.id)
                .ok()
                .flatten()
                .map_or(FieldValue::Empty, FieldValue::Object),
            "observers" => FieldValue::Empty,
            _ => FieldValue::Scalar,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryStore;

    #[test]
    fn test_record_round_trip_fields() {
        let mut tree = ContentTree::new("src", Box::new(MemoryStore::new())).unwrap();
        let root = tree.root();
        let a = tree.create_folder(root, "A").unwrap();
        let d = tree.create_plain_text_document(a, "d").unwrap();

        let record = tree.record(d).unwrap();
        assert_eq!(record.kind, "plain_text_document");
        assert_eq!(record.parent, Some(a));
        assert_eq!(record.str_field("name"), Some("d"));
        assert_eq!(record.str_field("path"), Some("/A/d"));
        assert_eq!(record.str_field("root"), Some(root.to_string().as_str()));
        assert_eq!(record.str_field("mime_type"), Some("text/plain"));
        assert!(!record.fields.contains_key("property_bag"));
        assert!(!record.fields.contains_key("parent"));
    }

    #[test]
    fn test_fields_resolve_cascade() {
        let mut tree = ContentTree::new("src", Box::new(MemoryStore::new())).unwrap();
        let a = tree.create_folder(tree.root(), "A").unwrap();
        let fields = tree.fields(a);
        let root = fields.iter().find(|(f, _)| f.name == "root").unwrap();
        assert_eq!(root.0.cascade, Some(crate::persist::Cascade::NONE));
        assert_eq!(root.1, FieldValue::Object(tree.root()));
        let children = fields.iter().find(|(f, _)| f.name == "children").unwrap();
        assert_eq!(children.1, FieldValue::Sequence(vec![]));
    }

    #[test]
    fn test_filter_never_reenters_boundary_parent() {
        let mut tree = ContentTree::new("src", Box::new(MemoryStore::new())).unwrap();
        let a = tree.create_folder(tree.root(), "A").unwrap();
        let d = tree.create_plain_text_document(a, "d").unwrap();
        let line = tree.create_text_line(d).unwrap();
        tree.set_reference(line, "folder", a).unwrap();
        assert_eq!(tree.bounded_set(d, LifecycleVerb::Add).unwrap(), vec![d, line]);
    }
}
