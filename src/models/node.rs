use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::children::ChildList;
use super::property::PropertyMap;
use crate::persist::{BoundaryState, PersistenceNotification};

/// Path separator used for filesystem node paths. The root folder's name and
/// path are the separator itself.
pub const PATH_SEPARATOR: &str = "/";

/// Stable identity of a node in the content graph.
///
/// Identity is what the recursor keys its visited set on, and what the
/// backing store uses as the primary key of a stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// The flavour of a document.
///
/// - `Generic`: any document, format unknown to the content model
/// - `PlainText`: underlying file is plain text (ASCII or Unicode)
/// - `RichText`: underlying file carries markup (RTF, HTML, word processor formats)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Generic,
    PlainText,
    RichText,
}

/// Concrete node kinds.
///
/// Capabilities that a class hierarchy would express through inheritance
/// (has children, has a name, is a folder, is the root) are answered by the
/// query methods below instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    /// The unique filesystem node without a parent.
    RootFolder { source: String },
    Folder,
    Document {
        mime_type: String,
        format: DocumentFormat,
    },
    /// A non-filesystem container tagged with a MIME type; an independent
    /// save/load unit by default.
    TypedContainer { mime_type: String },
    Container,
    /// Generic leaf content object.
    Object,
    TextLine,
    TextBlock { text: Option<String> },
}

impl NodeKind {
    pub const TAGS: &'static [&'static str] = &[
        "root_folder",
        "folder",
        "document",
        "plain_text_document",
        "rich_text_document",
        "typed_container",
        "container",
        "object",
        "text_line",
        "text_block",
    ];

    /// The tag under which this kind's schema is registered and its records stored.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::RootFolder { .. } => "root_folder",
            Self::Folder => "folder",
            Self::Document { format, .. } => match format {
                DocumentFormat::Generic => "document",
                DocumentFormat::PlainText => "plain_text_document",
                DocumentFormat::RichText => "rich_text_document",
            },
            Self::TypedContainer { .. } => "typed_container",
            Self::Container => "container",
            Self::Object => "object",
            Self::TextLine => "text_line",
            Self::TextBlock { .. } => "text_block",
        }
    }

    pub fn has_children(&self) -> bool {
        !matches!(self, Self::Object | Self::TextBlock { .. })
    }

    pub fn is_file_system(&self) -> bool {
        matches!(
            self,
            Self::RootFolder { .. } | Self::Folder | Self::Document { .. }
        )
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Self::RootFolder { .. } | Self::Folder)
    }

    pub fn is_root(&self) -> bool {
        matches!(self, Self::RootFolder { .. })
    }

    /// Kinds that are persistence boundaries unless a schema says otherwise.
    pub fn is_default_boundary(&self) -> bool {
        matches!(
            self,
            Self::RootFolder { .. } | Self::Document { .. } | Self::TypedContainer { .. }
        )
    }

    pub fn mime_type(&self) -> Option<&str> {
        match self {
            Self::Document { mime_type, .. } | Self::TypedContainer { mime_type } => {
                Some(mime_type)
            }
            _ => None,
        }
    }

    pub fn source(&self) -> Option<&str> {
        match self {
            Self::RootFolder { source } => Some(source),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::TextBlock { text } => text.as_deref(),
            _ => None,
        }
    }

    /// Whether a node of this kind may hold `child` in its child collection.
    ///
    /// Folders only hold filesystem nodes, and filesystem nodes only live in
    /// folders. Leaf kinds hold nothing, and the root is never a child.
    pub fn accepts_child(&self, child: &NodeKind) -> bool {
        if !self.has_children() || child.is_root() {
            return false;
        }
        if self.is_folder() {
            child.is_file_system()
        } else {
            !child.is_file_system()
        }
    }
}

/// Handle returned by [`ContentTree::subscribe`](super::ContentTree::subscribe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

/// What changed on a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Moved {
        from: NodeId,
        to: NodeId,
        index: usize,
    },
    Text,
}

/// Notification delivered synchronously to a node's observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub node: NodeId,
    pub change: Change,
}

/// Observers get the event only; they cannot reach back into the tree.
pub type Observer = Box<dyn FnMut(&ChangeEvent)>;

/// A single entry of the content graph arena.
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) kind: NodeKind,
    pub(crate) name: Option<String>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Option<ChildList>,
    pub(crate) references: BTreeMap<String, NodeId>,
    pub(crate) property_bag: Option<Box<dyn PropertyMap>>,
    pub(crate) observers: Vec<(SubscriptionId, Observer)>,
    pub(crate) callbacks: Option<Box<dyn PersistenceNotification>>,
    pub(crate) state: BoundaryState,
    /// False for a stub whose references and children have not been loaded yet.
    pub(crate) loaded: bool,
}

impl Node {
    pub(crate) fn new(
        id: NodeId,
        kind: NodeKind,
        name: Option<String>,
        parent: Option<NodeId>,
        children: Option<ChildList>,
    ) -> Self {
        Self {
            id,
            kind,
            name,
            parent,
            children,
            references: BTreeMap::new(),
            property_bag: None,
            observers: Vec::new(),
            callbacks: None,
            state: BoundaryState::NotActivated,
            loaded: true,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Name of a filesystem node. Set once at construction.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> Option<&ChildList> {
        self.children.as_ref()
    }

    pub fn references(&self) -> &BTreeMap<String, NodeId> {
        &self.references
    }

    pub fn property_bag(&self) -> Option<&dyn PropertyMap> {
        self.property_bag.as_deref()
    }

    pub fn state(&self) -> BoundaryState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("references", &self.references)
            .field("observers", &self.observers.len())
            .field("state", &self.state)
            .field("loaded", &self.loaded)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> NodeKind {
        NodeKind::Document {
            mime_type: "text/plain".to_string(),
            format: DocumentFormat::PlainText,
        }
    }

    #[test]
    fn test_folders_only_accept_file_system_children() {
        assert!(NodeKind::Folder.accepts_child(&document()));
        assert!(NodeKind::Folder.accepts_child(&NodeKind::Folder));
        assert!(!NodeKind::Folder.accepts_child(&NodeKind::Object));
        assert!(!NodeKind::Folder.accepts_child(&NodeKind::TextLine));
    }

    #[test]
    fn test_documents_hold_content_not_folders() {
        assert!(document().accepts_child(&NodeKind::TextLine));
        assert!(document().accepts_child(&NodeKind::Container));
        assert!(!document().accepts_child(&NodeKind::Folder));
        assert!(!document().accepts_child(&document()));
    }

    #[test]
    fn test_leaf_kinds_and_root() {
        let root = NodeKind::RootFolder {
            source: "x".to_string(),
        };
        assert!(!NodeKind::Object.accepts_child(&NodeKind::Object));
        assert!(!NodeKind::TextBlock { text: None }.accepts_child(&NodeKind::Object));
        assert!(!root.accepts_child(&root));
        assert!(root.accepts_child(&NodeKind::Folder));
    }

    #[test]
    fn test_tags_cover_every_kind() {
        assert_eq!(document().tag(), "plain_text_document");
        for tag in NodeKind::TAGS {
            assert!(!tag.is_empty());
        }
        assert!(NodeKind::TAGS.contains(&NodeKind::TextLine.tag()));
    }

    #[test]
    fn test_node_id_round_trips_through_string() {
        let id = NodeId::new();
        let parsed: NodeId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
