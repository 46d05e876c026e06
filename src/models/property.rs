//! Per-node property bag: transient key/value state for pipeline-local use.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::node::NodeId;

/// A value stored in a property bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    Text(String),
    Integer(i64),
    Flag(bool),
    /// A reference to another node. Walked by the recursor only when the
    /// property bag field is classified as persisted.
    Node(NodeId),
}

impl PropertyValue {
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Self::Node(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for PropertyValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Flag(b)
    }
}

impl From<NodeId> for PropertyValue {
    fn from(id: NodeId) -> Self {
        Self::Node(id)
    }
}

/// Associative storage behind a property bag, produced by a
/// [`CollectionFactory`](crate::persist::CollectionFactory).
pub trait PropertyMap {
    fn get(&self, key: &str) -> Option<&PropertyValue>;
    fn insert(&mut self, key: String, value: PropertyValue) -> Option<PropertyValue>;
    fn remove(&mut self, key: &str) -> Option<PropertyValue>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries in the map's own iteration order.
    fn entries(&self) -> Vec<(&str, &PropertyValue)>;
}

/// Hash-backed bag; iteration order is unspecified.
#[derive(Debug, Default, Clone)]
pub struct HashPropertyMap {
    entries: HashMap<String, PropertyValue>,
}

impl PropertyMap for HashPropertyMap {
    fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.entries.get(key)
    }

    fn insert(&mut self, key: String, value: PropertyValue) -> Option<PropertyValue> {
        self.entries.insert(key, value)
    }

    fn remove(&mut self, key: &str) -> Option<PropertyValue> {
        self.entries.remove(key)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn entries(&self) -> Vec<(&str, &PropertyValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v)).collect()
    }
}

/// Key-ordered bag, so stored bags serialize deterministically.
#[derive(Debug, Default, Clone)]
pub struct OrderedPropertyMap {
    entries: BTreeMap<String, PropertyValue>,
}

impl PropertyMap for OrderedPropertyMap {
    fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.entries.get(key)
    }

    fn insert(&mut self, key: String, value: PropertyValue) -> Option<PropertyValue> {
        self.entries.insert(key, value)
    }

    fn remove(&mut self, key: &str) -> Option<PropertyValue> {
        self.entries.remove(key)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn entries(&self) -> Vec<(&str, &PropertyValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_map_iterates_by_key() {
        let mut bag = OrderedPropertyMap::default();
        bag.insert("zeta".to_string(), 1.into());
        bag.insert("alpha".to_string(), "a".into());
        let keys: Vec<_> = bag.entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_insert_replaces() {
        let mut bag = HashPropertyMap::default();
        assert_eq!(bag.insert("k".to_string(), true.into()), None);
        assert_eq!(
            bag.insert("k".to_string(), false.into()),
            Some(PropertyValue::Flag(true))
        );
        assert_eq!(bag.len(), 1);
        assert_eq!(bag.remove("k"), Some(PropertyValue::Flag(false)));
        assert!(bag.is_empty());
    }

    #[test]
    fn test_node_values() {
        let id = NodeId::new();
        assert_eq!(PropertyValue::from(id).as_node(), Some(id));
        assert_eq!(PropertyValue::from("x").as_node(), None);
    }
}
