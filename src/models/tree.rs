use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use super::children::ChildList;
use super::node::{
    Change, ChangeEvent, DocumentFormat, Node, NodeId, NodeKind, Observer, SubscriptionId,
    PATH_SEPARATOR,
};
use super::property::PropertyMap;
use crate::error::{ContentError, Result};
use crate::persist::{NodeRecord, ObjectPersistor, PersistenceNotification, SchemaRegistry};

/// Arena holding the content graph of one root folder.
///
/// Every node is created through the tree and attached to its parent at
/// construction. The tree owns the persistor for its subtree; lifecycle verbs
/// (`add`, `activate`, ...) are implemented in [`crate::persist`].
pub struct ContentTree {
    pub(crate) nodes: HashMap<NodeId, Node>,
    pub(crate) root: NodeId,
    pub(crate) schemas: Arc<SchemaRegistry>,
    pub(crate) persistor: Box<dyn ObjectPersistor>,
    /// Ids erased by `delete`; they report the terminal `Deleted` state.
    pub(crate) tombstones: HashSet<NodeId>,
    next_subscription: u64,
}

impl ContentTree {
    /// Creates a fresh, unsaved tree rooted at a root folder for `source`.
    pub fn new(source: impl Into<String>, persistor: Box<dyn ObjectPersistor>) -> Result<Self> {
        Self::with_schemas(source, persistor, Arc::new(SchemaRegistry::default()))
    }

    pub fn with_schemas(
        source: impl Into<String>,
        persistor: Box<dyn ObjectPersistor>,
        schemas: Arc<SchemaRegistry>,
    ) -> Result<Self> {
        let source = source.into();
        if source.trim().is_empty() {
            return Err(ContentError::invalid_argument(
                "a root folder needs a source identifier",
            ));
        }
        process_schemas(persistor.as_ref(), &schemas)?;

        let id = NodeId::new();
        let children = ChildList::new(id, persistor.collection_factory().create_list(id));
        let root = Node::new(
            id,
            NodeKind::RootFolder { source },
            Some(PATH_SEPARATOR.to_string()),
            None,
            Some(children),
        );

        let mut tree = Self::empty(id, persistor, schemas);
        tree.nodes.insert(id, root);
        debug!(root = %id, "Created root folder");
        Ok(tree)
    }

    /// Opens a stored tree by activating its root folder.
    pub fn open(
        root: NodeId,
        persistor: Box<dyn ObjectPersistor>,
        schemas: Arc<SchemaRegistry>,
    ) -> Result<Self> {
        process_schemas(persistor.as_ref(), &schemas)?;
        let record = persistor
            .fetch(root)?
            .ok_or(ContentError::UnknownNode(root))?;
        let kind = record.node_kind()?;
        if !kind.is_root() {
            return Err(ContentError::invalid_argument(format!(
                "{root} is a {}, not a root folder",
                kind.tag()
            )));
        }

        let mut tree = Self::empty(root, persistor, schemas);
        tree.insert_stub(&record, None)?;
        tree.activate(root)?;
        info!(root = %root, nodes = tree.len(), "Opened content tree");
        Ok(tree)
    }

    fn empty(root: NodeId, persistor: Box<dyn ObjectPersistor>, schemas: Arc<SchemaRegistry>) -> Self {
        Self {
            nodes: HashMap::new(),
            root,
            schemas,
            persistor,
            tombstones: HashSet::new(),
            next_subscription: 0,
        }
    }

    // ============================================================
    // Queries
    // ============================================================

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Source identifier of the root folder.
    pub fn source(&self) -> &str {
        self.nodes
            .get(&self.root)
            .and_then(|root| root.kind.source())
            .unwrap_or_default()
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    pub fn persistor(&self) -> &dyn ObjectPersistor {
        self.persistor.as_ref()
    }

    /// Number of nodes currently in memory.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(&id).ok_or(ContentError::UnknownNode(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(&id).ok_or(ContentError::UnknownNode(id))
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.node(id)?.parent)
    }

    /// Children in order; empty for leaf kinds.
    pub fn children(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(self
            .node(id)?
            .children
            .as_ref()
            .map(ChildList::as_slice)
            .unwrap_or(&[]))
    }

    /// `/`-separated path of a filesystem node; the root's path is `/`.
    pub fn path(&self, id: NodeId) -> Result<String> {
        let node = self.node(id)?;
        if !node.kind.is_file_system() {
            return Err(ContentError::invalid_argument(format!(
                "{id} is a {}, not a filesystem node",
                node.kind.tag()
            )));
        }

        let mut names = Vec::new();
        let mut current = node;
        while let Some(parent) = current.parent {
            names.push(current.name.as_deref().unwrap_or_default());
            current = self.node(parent)?;
        }
        names.reverse();
        Ok(format!("{PATH_SEPARATOR}{}", names.join(PATH_SEPARATOR)))
    }

    /// Nearest ancestor that is a filesystem node.
    pub fn file_system_parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        let mut current = self.node(id)?.parent;
        while let Some(ancestor) = current {
            let node = self.node(ancestor)?;
            if node.kind.is_file_system() {
                return Ok(Some(ancestor));
            }
            current = node.parent;
        }
        Ok(None)
    }

    /// The root folder `id` hangs off, if it is attached to one.
    pub fn root_folder(&self, id: NodeId) -> Result<Option<NodeId>> {
        let mut node = self.node(id)?;
        while let Some(parent) = node.parent {
            node = self.node(parent)?;
        }
        Ok(node.kind.is_root().then_some(node.id))
    }

    /// Whether folder `ancestor` strictly contains `descendant`.
    pub fn is_ancestor_of(&self, ancestor: NodeId, descendant: NodeId) -> Result<bool> {
        let folder = self.node(ancestor)?;
        self.node(descendant)?;
        Ok(folder.kind.is_folder() && self.has_ancestor(descendant, ancestor))
    }

    pub fn is_descendant_of(&self, descendant: NodeId, ancestor: NodeId) -> Result<bool> {
        self.is_ancestor_of(ancestor, descendant)
    }

    /// Resolves a `/`-separated path of names from the root folder.
    pub fn find_path(&self, path: &str) -> Option<NodeId> {
        let mut current = self.root;
        for segment in path.split(PATH_SEPARATOR).filter(|s| !s.is_empty()) {
            current = self
                .children(current)
                .ok()?
                .iter()
                .copied()
                .find(|child| self.nodes.get(child).and_then(Node::name) == Some(segment))?;
        }
        Some(current)
    }

    /// `id` and everything below it through child links, in pre-order.
    pub fn subtree(&self, id: NodeId) -> Result<Vec<NodeId>> {
        self.node(id)?;
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            order.push(current);
            if let Some(children) = self.nodes.get(&current).and_then(|n| n.children.as_ref()) {
                stack.extend(children.as_slice().iter().rev().copied());
            }
        }
        Ok(order)
    }

    pub(crate) fn has_ancestor(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut current = self.nodes.get(&id).and_then(|n| n.parent);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.nodes.get(&parent).and_then(|n| n.parent);
        }
        false
    }

    // ============================================================
    // Construction
    // ============================================================

    /// Creates a node of `kind` and appends it to `parent`'s children.
    ///
    /// Filesystem kinds need a `name`; other kinds must not have one.
    pub fn create_node(&mut self, parent: NodeId, kind: NodeKind, name: Option<&str>) -> Result<NodeId> {
        if kind.is_root() {
            return Err(ContentError::invalid_argument(
                "a root folder cannot be created under a parent",
            ));
        }
        let name = match (kind.is_file_system(), name) {
            (true, Some(name)) => Some(validate_name(name)?),
            (true, None) => {
                return Err(ContentError::invalid_argument(format!(
                    "a {} needs a name",
                    kind.tag()
                )))
            }
            (false, Some(_)) => {
                return Err(ContentError::invalid_argument(format!(
                    "a {} cannot be named",
                    kind.tag()
                )))
            }
            (false, None) => None,
        };
        self.check_accepts(parent, &kind)?;

        let id = NodeId::new();
        let children = kind
            .has_children()
            .then(|| ChildList::new(id, self.persistor.collection_factory().create_list(id)));
        let tag = kind.tag();
        self.nodes.insert(id, Node::new(id, kind, name, Some(parent), children));
        self.child_list_mut(parent)?.push(id)?;

        debug!(node = %id, parent = %parent, kind = tag, "Created node");
        Ok(id)
    }

    pub fn create_folder(&mut self, parent: NodeId, name: &str) -> Result<NodeId> {
        self.create_node(parent, NodeKind::Folder, Some(name))
    }

    pub fn create_document(&mut self, parent: NodeId, name: &str, mime_type: &str) -> Result<NodeId> {
        let kind = NodeKind::Document {
            mime_type: mime_type.to_string(),
            format: DocumentFormat::Generic,
        };
        self.create_node(parent, kind, Some(name))
    }

    pub fn create_plain_text_document(&mut self, parent: NodeId, name: &str) -> Result<NodeId> {
        let kind = NodeKind::Document {
            mime_type: "text/plain".to_string(),
            format: DocumentFormat::PlainText,
        };
        self.create_node(parent, kind, Some(name))
    }

    pub fn create_rich_text_document(
        &mut self,
        parent: NodeId,
        name: &str,
        mime_type: &str,
    ) -> Result<NodeId> {
        let kind = NodeKind::Document {
            mime_type: mime_type.to_string(),
            format: DocumentFormat::RichText,
        };
        self.create_node(parent, kind, Some(name))
    }

    pub fn create_typed_container(&mut self, parent: NodeId, mime_type: &str) -> Result<NodeId> {
        let kind = NodeKind::TypedContainer {
            mime_type: mime_type.to_string(),
        };
        self.create_node(parent, kind, None)
    }

    pub fn create_container(&mut self, parent: NodeId) -> Result<NodeId> {
        self.create_node(parent, NodeKind::Container, None)
    }

    pub fn create_object(&mut self, parent: NodeId) -> Result<NodeId> {
        self.create_node(parent, NodeKind::Object, None)
    }

    pub fn create_text_line(&mut self, parent: NodeId) -> Result<NodeId> {
        self.create_node(parent, NodeKind::TextLine, None)
    }

    pub fn create_text_block(&mut self, parent: NodeId, text: Option<&str>) -> Result<NodeId> {
        let kind = NodeKind::TextBlock {
            text: text.map(str::to_string),
        };
        self.create_node(parent, kind, None)
    }

    /// Adds a stored node as an unloaded stub.
    pub(crate) fn insert_stub(&mut self, record: &NodeRecord, parent: Option<NodeId>) -> Result<()> {
        let kind = record.node_kind()?;
        let id = record.id;
        let name = if kind.is_root() {
            Some(PATH_SEPARATOR.to_string())
        } else {
            record.str_field("name").map(str::to_string)
        };
        let children = kind
            .has_children()
            .then(|| ChildList::new(id, self.persistor.collection_factory().create_list(id)));

        let mut node = Node::new(id, kind, name, parent, children);
        node.loaded = false;
        self.nodes.insert(id, node);
        self.tombstones.remove(&id);
        Ok(())
    }

    // ============================================================
    // Mutation
    // ============================================================

    /// Moves `id` under `new_parent` at `index` (default: the end).
    ///
    /// A no-op when `new_parent` already is the parent. Observers of `id` get
    /// a single [`Change::Moved`].
    pub fn move_node(&mut self, id: NodeId, new_parent: NodeId, index: Option<usize>) -> Result<()> {
        if id == self.root {
            return Err(ContentError::not_supported("the root folder cannot be moved"));
        }
        let node = self.node(id)?;
        let from = node.parent.ok_or(ContentError::UnknownNode(id))?;
        let len = self.child_list(new_parent)?.len();
        let index = index.unwrap_or(len);
        if index > len {
            return Err(ContentError::OutOfRange { index, len });
        }
        let kind = node.kind.clone();
        self.check_accepts(new_parent, &kind)?;
        self.check_not_within(id, new_parent)?;
        if from == new_parent {
            return Ok(());
        }

        self.child_list_mut(from)?.remove(id);
        self.node_mut(id)?.parent = Some(new_parent);
        self.child_list_mut(new_parent)?.insert(index, id)?;

        debug!(node = %id, from = %from, to = %new_parent, index, "Moved node");
        self.notify(
            id,
            Change::Moved {
                from,
                to: new_parent,
                index,
            },
        );
        Ok(())
    }

    /// Relocates `length` children of `source`, starting at `source_index`,
    /// into `destination` starting at `destination_index`, keeping their order.
    ///
    /// The whole range is validated before anything moves. When `source` and
    /// `destination` are the same container the range is reordered in place;
    /// `destination_index` then counts positions once the range is taken out.
    pub fn carve_out(
        &mut self,
        source: NodeId,
        destination: NodeId,
        destination_index: usize,
        source_index: usize,
        length: usize,
    ) -> Result<()> {
        if source == destination {
            return self.reorder(source, destination_index, source_index, length);
        }
        let source_len = self.child_list(source)?.len();
        let end = source_index.saturating_add(length);
        if end > source_len {
            return Err(ContentError::OutOfRange {
                index: end,
                len: source_len,
            });
        }
        let destination_len = self.child_list(destination)?.len();
        if destination_index > destination_len {
            return Err(ContentError::OutOfRange {
                index: destination_index,
                len: destination_len,
            });
        }

        let moving = self.child_list(source)?.as_slice()[source_index..end].to_vec();
        for &id in &moving {
            let kind = self.node(id)?.kind.clone();
            self.check_accepts(destination, &kind)?;
            self.check_not_within(id, destination)?;
        }

        for (offset, id) in moving.into_iter().enumerate() {
            self.move_node(id, destination, Some(destination_index + offset))?;
        }
        Ok(())
    }

    fn reorder(
        &mut self,
        container: NodeId,
        destination_index: usize,
        source_index: usize,
        length: usize,
    ) -> Result<()> {
        let len = self.child_list(container)?.len();
        let end = source_index.saturating_add(length);
        if end > len {
            return Err(ContentError::OutOfRange { index: end, len });
        }
        if destination_index > len - length {
            return Err(ContentError::OutOfRange {
                index: destination_index,
                len: len - length,
            });
        }

        let list = self.child_list_mut(container)?;
        let mut moving = Vec::with_capacity(length);
        for _ in 0..length {
            moving.push(list.remove_at(source_index)?);
        }
        for (offset, id) in moving.into_iter().enumerate() {
            list.insert(destination_index + offset, id)?;
        }
        debug!(container = %container, from = source_index, to = destination_index, length, "Reordered children");
        Ok(())
    }

    /// Sets the text of a text block. Observers hear about it only when the
    /// text actually changes.
    pub fn set_text(&mut self, id: NodeId, text: &str) -> Result<bool> {
        let node = self.node_mut(id)?;
        let tag = node.kind.tag();
        let NodeKind::TextBlock { text: current } = &mut node.kind else {
            return Err(ContentError::invalid_argument(format!(
                "{id} is a {tag}, not a text block"
            )));
        };
        if current.as_deref() == Some(text) {
            return Ok(false);
        }
        *current = Some(text.to_string());
        self.notify(id, Change::Text);
        Ok(true)
    }

    /// Sets a named reference from `id` to `target`, returning the previous target.
    pub fn set_reference(&mut self, id: NodeId, name: &str, target: NodeId) -> Result<Option<NodeId>> {
        if name.is_empty() {
            return Err(ContentError::invalid_argument("reference name is empty"));
        }
        self.node(target)?;
        Ok(self.node_mut(id)?.references.insert(name.to_string(), target))
    }

    pub fn reference(&self, id: NodeId, name: &str) -> Result<Option<NodeId>> {
        Ok(self.node(id)?.references.get(name).copied())
    }

    pub fn remove_reference(&mut self, id: NodeId, name: &str) -> Result<Option<NodeId>> {
        Ok(self.node_mut(id)?.references.remove(name))
    }

    pub fn property_bag(&self, id: NodeId) -> Result<Option<&dyn PropertyMap>> {
        Ok(self.node(id)?.property_bag())
    }

    /// The node's property bag, created through the collection factory on first use.
    pub fn property_bag_mut(&mut self, id: NodeId) -> Result<&mut dyn PropertyMap> {
        let factory = self.persistor.collection_factory();
        let node = self.nodes.get_mut(&id).ok_or(ContentError::UnknownNode(id))?;
        Ok(&mut **node
            .property_bag
            .get_or_insert_with(|| factory.create_map(id)))
    }

    // ============================================================
    // Notification
    // ============================================================

    pub fn subscribe<F>(&mut self, id: NodeId, observer: F) -> Result<SubscriptionId>
    where
        F: FnMut(&ChangeEvent) + 'static,
    {
        let subscription = SubscriptionId(self.next_subscription);
        let observer: Observer = Box::new(observer);
        self.node_mut(id)?.observers.push((subscription, observer));
        self.next_subscription += 1;
        Ok(subscription)
    }

    pub fn unsubscribe(&mut self, id: NodeId, subscription: SubscriptionId) -> Result<bool> {
        let observers = &mut self.node_mut(id)?.observers;
        let before = observers.len();
        observers.retain(|(s, _)| *s != subscription);
        Ok(observers.len() != before)
    }

    /// Installs the lifecycle hooks of `id`, replacing any previous ones.
    pub fn set_callbacks<C>(&mut self, id: NodeId, callbacks: C) -> Result<()>
    where
        C: PersistenceNotification + 'static,
    {
        self.node_mut(id)?.callbacks = Some(Box::new(callbacks));
        Ok(())
    }

    pub fn clear_callbacks(&mut self, id: NodeId) -> Result<Option<Box<dyn PersistenceNotification>>> {
        Ok(self.node_mut(id)?.callbacks.take())
    }

    fn notify(&mut self, id: NodeId, change: Change) {
        let event = ChangeEvent { node: id, change };
        if let Some(node) = self.nodes.get_mut(&id) {
            for (_, observer) in node.observers.iter_mut() {
                observer(&event);
            }
        }
    }

    // ============================================================
    // Helpers
    // ============================================================

    fn child_list(&self, id: NodeId) -> Result<&ChildList> {
        let node = self.node(id)?;
        node.children.as_ref().ok_or_else(|| {
            ContentError::invalid_argument(format!("a {} has no children", node.kind.tag()))
        })
    }

    pub(crate) fn child_list_mut(&mut self, id: NodeId) -> Result<&mut ChildList> {
        let node = self.node_mut(id)?;
        let tag = node.kind.tag();
        node.children
            .as_mut()
            .ok_or_else(|| ContentError::invalid_argument(format!("a {tag} has no children")))
    }

    fn check_accepts(&self, parent: NodeId, child: &NodeKind) -> Result<()> {
        let node = self.node(parent)?;
        if !node.kind.accepts_child(child) {
            return Err(ContentError::invalid_argument(format!(
                "a {} cannot hold a {}",
                node.kind.tag(),
                child.tag()
            )));
        }
        if !node.loaded {
            return Err(ContentError::invalid_state(format!(
                "{parent} is not loaded; activate it first"
            )));
        }
        Ok(())
    }

    fn check_not_within(&self, id: NodeId, destination: NodeId) -> Result<()> {
        if id == destination || self.has_ancestor(destination, id) {
            return Err(ContentError::invalid_argument(format!(
                "{id} cannot be moved into itself or one of its descendants"
            )));
        }
        Ok(())
    }
}

fn process_schemas(persistor: &dyn ObjectPersistor, schemas: &SchemaRegistry) -> Result<()> {
    for schema in schemas.iter() {
        persistor.process_schema(schema)?;
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(ContentError::invalid_argument("name is empty"));
    }
    if name.contains(PATH_SEPARATOR) {
        return Err(ContentError::invalid_argument(format!(
            "name '{name}' contains the path separator"
        )));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryStore;

    fn tree() -> ContentTree {
        ContentTree::new("test", Box::new(MemoryStore::new())).unwrap()
    }

    #[test]
    fn test_paths() {
        let mut tree = tree();
        let root = tree.root();
        let a = tree.create_folder(root, "A").unwrap();
        let d = tree.create_document(a, "d", "text/plain").unwrap();
        assert_eq!(tree.path(root).unwrap(), "/");
        assert_eq!(tree.path(a).unwrap(), "/A");
        assert_eq!(tree.path(d).unwrap(), "/A/d");
        assert_eq!(tree.find_path("/A/d"), Some(d));
        assert_eq!(tree.find_path("/"), Some(root));
        assert_eq!(tree.find_path("/B"), None);
    }

    #[test]
    fn test_path_of_content_node_rejected() {
        let mut tree = tree();
        let d = tree.create_plain_text_document(tree.root(), "d").unwrap();
        let line = tree.create_text_line(d).unwrap();
        assert!(tree.path(line).unwrap_err().is_invalid_argument());
        assert_eq!(tree.file_system_parent(line).unwrap(), Some(d));
        assert_eq!(tree.root_folder(line).unwrap(), Some(tree.root()));
    }

    #[test]
    fn test_names_validated() {
        let mut tree = tree();
        let root = tree.root();
        assert!(tree.create_folder(root, "").is_err());
        assert!(tree.create_folder(root, "a/b").is_err());
        assert!(tree.create_node(root, NodeKind::Folder, None).is_err());
        let d = tree.create_plain_text_document(root, "d").unwrap();
        assert!(tree.create_node(d, NodeKind::Container, Some("c")).is_err());
    }

    #[test]
    fn test_root_kind_cannot_be_created() {
        let mut tree = tree();
        let kind = NodeKind::RootFolder {
            source: "x".to_string(),
        };
        assert!(tree.create_node(tree.root(), kind, Some("x")).is_err());
    }

    #[test]
    fn test_empty_source_rejected() {
        let err = ContentTree::new("  ", Box::new(MemoryStore::new())).err().unwrap();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_subtree_pre_order() {
        let mut tree = tree();
        let root = tree.root();
        let a = tree.create_folder(root, "A").unwrap();
        let b = tree.create_folder(a, "B").unwrap();
        let c = tree.create_folder(root, "C").unwrap();
        assert_eq!(tree.subtree(root).unwrap(), vec![root, a, b, c]);
    }

    #[test]
    fn test_set_text_notifies_only_on_change() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut tree = tree();
        let d = tree.create_plain_text_document(tree.root(), "d").unwrap();
        let line = tree.create_text_line(d).unwrap();
        let block = tree.create_text_block(line, Some("hello")).unwrap();

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        tree.subscribe(block, move |e: &ChangeEvent| sink.borrow_mut().push(e.clone()))
            .unwrap();

        assert!(!tree.set_text(block, "hello").unwrap());
        assert!(tree.set_text(block, "world").unwrap());
        assert_eq!(tree.node(block).unwrap().kind().text(), Some("world"));
        assert_eq!(events.borrow().len(), 1);
        assert_eq!(events.borrow()[0].change, Change::Text);
        assert!(tree.set_text(line, "x").is_err());
    }

    #[test]
    fn test_property_bag_is_lazy() {
        let mut tree = tree();
        let root = tree.root();
        assert!(tree.property_bag(root).unwrap().is_none());
        tree.property_bag_mut(root)
            .unwrap()
            .insert("seen".to_string(), true.into());
        let bag = tree.property_bag(root).unwrap().unwrap();
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn test_references() {
        let mut tree = tree();
        let root = tree.root();
        let a = tree.create_folder(root, "A").unwrap();
        assert_eq!(tree.set_reference(a, "self", a).unwrap(), None);
        assert_eq!(tree.reference(a, "self").unwrap(), Some(a));
        assert!(tree.set_reference(a, "ghost", NodeId::new()).is_err());
        assert_eq!(tree.remove_reference(a, "self").unwrap(), Some(a));
        assert_eq!(tree.reference(a, "self").unwrap(), None);
    }
}
