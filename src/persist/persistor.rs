//! The interface the content graph requires from a backing object store.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::schema::TypeSchema;
use crate::error::ContentError;
use crate::models::{DocumentFormat, ListStorage, NodeId, NodeKind, PropertyMap, PropertyValue};

/// Produces the list and map storage used for child collections and
/// property bags, so stored and plain in-memory variants are interchangeable.
pub trait CollectionFactory {
    fn create_list(&self, owner: NodeId) -> Box<dyn ListStorage>;
    fn create_map(&self, owner: NodeId) -> Box<dyn PropertyMap>;
}

/// Stored form of a single node.
///
/// `fields` holds every persisted field except the parent link, keyed by
/// field name, with node links written as id strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub kind: String,
    pub parent: Option<NodeId>,
    pub fields: BTreeMap<String, Value>,
}

impl NodeRecord {
    pub fn new(id: NodeId, kind: impl Into<String>, parent: Option<NodeId>) -> Self {
        Self {
            id,
            kind: kind.into(),
            parent,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn children(&self) -> Result<Vec<NodeId>> {
        match self.fields.get("children") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value.clone())
                .with_context(|| format!("Malformed children of {}", self.id)),
        }
    }

    pub fn references(&self) -> Result<BTreeMap<String, NodeId>> {
        match self.fields.get("references") {
            None | Some(Value::Null) => Ok(BTreeMap::new()),
            Some(value) => serde_json::from_value(value.clone())
                .with_context(|| format!("Malformed references of {}", self.id)),
        }
    }

    /// `None` when the bag was not stored at all.
    pub fn property_bag(&self) -> Result<Option<BTreeMap<String, PropertyValue>>> {
        match self.fields.get("property_bag") {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .with_context(|| format!("Malformed property bag of {}", self.id)),
        }
    }

    /// Rebuilds the node kind from the kind tag and the header fields.
    pub fn node_kind(&self) -> crate::error::Result<NodeKind> {
        let mime_type = || {
            self.str_field("mime_type")
                .unwrap_or("application/octet-stream")
                .to_string()
        };
        let document = |format| NodeKind::Document {
            mime_type: mime_type(),
            format,
        };

        let kind = match self.kind.as_str() {
            "root_folder" => NodeKind::RootFolder {
                source: self
                    .str_field("source")
                    .ok_or_else(|| {
                        ContentError::invalid_argument(format!("root folder {} has no source", self.id))
                    })?
                    .to_string(),
            },
            "folder" => NodeKind::Folder,
            "document" => document(DocumentFormat::Generic),
            "plain_text_document" => document(DocumentFormat::PlainText),
            "rich_text_document" => document(DocumentFormat::RichText),
            "typed_container" => NodeKind::TypedContainer {
                mime_type: mime_type(),
            },
            "container" => NodeKind::Container,
            "object" => NodeKind::Object,
            "text_line" => NodeKind::TextLine,
            "text_block" => NodeKind::TextBlock {
                text: self.str_field("text").map(str::to_string),
            },
            other => {
                return Err(ContentError::invalid_argument(format!(
                    "unknown node kind '{other}' for {}",
                    self.id
                )))
            }
        };
        Ok(kind)
    }
}

/// Single-object physical operations of a backing store.
///
/// None of these cascade; walking the graph is the caller's job.
pub trait ObjectPersistor {
    fn collection_factory(&self) -> &dyn CollectionFactory;

    /// Called once per registered type before any node of that type is stored.
    fn process_schema(&self, _schema: &TypeSchema) -> Result<()> {
        Ok(())
    }

    fn is_activated(&self, id: NodeId) -> bool;

    fn is_stored(&self, id: NodeId) -> Result<bool>;

    /// Reads a stored record without activating it.
    fn fetch(&self, id: NodeId) -> Result<Option<NodeRecord>>;

    /// Loads the stored record and marks the object activated.
    fn activate(&self, id: NodeId) -> Result<NodeRecord>;

    /// Unloads without deleting.
    fn deactivate(&self, id: NodeId) -> Result<()>;

    /// Create-or-replace.
    fn add(&self, record: &NodeRecord) -> Result<()>;

    fn update(&self, record: &NodeRecord) -> Result<()>;

    fn delete(&self, id: NodeId) -> Result<()>;

    /// Re-reads the stored record of an activated object.
    fn refresh(&self, id: NodeId) -> Result<NodeRecord>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_kind_from_record() {
        let record = NodeRecord::new(NodeId::new(), "plain_text_document", None)
            .with_field("mime_type", json!("text/plain"));
        assert_eq!(
            record.node_kind().unwrap(),
            NodeKind::Document {
                mime_type: "text/plain".to_string(),
                format: DocumentFormat::PlainText,
            }
        );
    }

    #[test]
    fn test_root_without_source_rejected() {
        let record = NodeRecord::new(NodeId::new(), "root_folder", None);
        assert!(record.node_kind().unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let record = NodeRecord::new(NodeId::new(), "spreadsheet", None);
        assert!(record.node_kind().is_err());
    }

    #[test]
    fn test_links_parse() {
        let (a, b) = (NodeId::new(), NodeId::new());
        let record = NodeRecord::new(NodeId::new(), "container", None)
            .with_field("children", json!([a.to_string(), b.to_string()]))
            .with_field("references", json!({ "next": b.to_string() }));
        assert_eq!(record.children().unwrap(), vec![a, b]);
        assert_eq!(record.references().unwrap().get("next"), Some(&b));
        assert_eq!(record.property_bag().unwrap(), None);
    }

    #[test]
    fn test_malformed_children() {
        let record =
            NodeRecord::new(NodeId::new(), "container", None).with_field("children", json!("x"));
        assert!(record.children().is_err());
    }
}
