//! Static per-kind field classification.
//!
//! Each node kind registers a [`TypeSchema`]: the ordered list of its fields
//! with persisted/indexed/stored-property flags and cascade overrides, plus
//! whether the kind is a persistence boundary. The recursor walks fields in
//! schema order; the backing store reads the indexed and stored flags.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::boundary::LifecycleVerb;
use crate::models::NodeKind;

/// Which lifecycle verbs cascade through a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cascade {
    pub add: bool,
    pub update: bool,
    pub delete: bool,
    pub load: bool,
}

impl Cascade {
    pub const ALL: Cascade = Cascade::uniform(true);
    pub const NONE: Cascade = Cascade::uniform(false);
    /// Everything but delete; a referenced object outlives its referrers.
    pub const KEEP_ON_DELETE: Cascade = Cascade::new(true, true, false, true);

    pub const fn uniform(cascade: bool) -> Self {
        Self {
            add: cascade,
            update: cascade,
            delete: cascade,
            load: cascade,
        }
    }

    pub const fn new(add: bool, update: bool, delete: bool, load: bool) -> Self {
        Self {
            add,
            update,
            delete,
            load,
        }
    }

    /// Activation, deactivation and refresh all count as loading.
    pub fn allows(&self, verb: LifecycleVerb) -> bool {
        match verb {
            LifecycleVerb::Add => self.add,
            LifecycleVerb::Update => self.update,
            LifecycleVerb::Delete => self.delete,
            LifecycleVerb::Activate | LifecycleVerb::Deactivate | LifecycleVerb::Refresh => {
                self.load
            }
        }
    }
}

impl Default for Cascade {
    fn default() -> Self {
        Self::ALL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSchema {
    pub name: &'static str,
    /// Cleared for fields excluded from both the graph walk and storage.
    pub persisted: bool,
    /// Ask the store for a fast-lookup index on this field.
    pub indexed: bool,
    /// Computed value materialized into the stored record; never loaded back.
    pub stored_property: bool,
    /// Per-field override of the type's cascade policy.
    pub cascade: Option<Cascade>,
}

impl FieldSchema {
    pub const fn persisted(name: &'static str) -> Self {
        Self {
            name,
            persisted: true,
            indexed: false,
            stored_property: false,
            cascade: None,
        }
    }

    pub const fn not_persisted(name: &'static str) -> Self {
        Self {
            name,
            persisted: false,
            indexed: false,
            stored_property: false,
            cascade: None,
        }
    }

    pub const fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    pub const fn stored_property(mut self) -> Self {
        self.stored_property = true;
        self
    }

    pub const fn with_cascade(mut self, cascade: Cascade) -> Self {
        self.cascade = Some(cascade);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSchema {
    pub kind: &'static str,
    pub boundary: bool,
    /// Default cascade policy for fields without an override.
    pub cascade: Cascade,
    pub fields: Vec<FieldSchema>,
}

impl TypeSchema {
    pub fn new(kind: &'static str, boundary: bool) -> Self {
        Self {
            kind,
            boundary,
            cascade: Cascade::ALL,
            fields: Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Replaces the field of the same name, or appends it.
    pub fn with_field(mut self, field: FieldSchema) -> Self {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
        self
    }

    pub fn with_cascade(mut self, cascade: Cascade) -> Self {
        self.cascade = cascade;
        self
    }

    pub fn effective_cascade(&self, field: &FieldSchema) -> Cascade {
        field.cascade.unwrap_or(self.cascade)
    }

    pub fn indexed_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(|f| f.indexed)
    }

    /// Built-in layout for one of [`NodeKind::TAGS`].
    pub fn builtin(tag: &'static str) -> Option<Self> {
        let (file_system, has_children, boundary) = match tag {
            "root_folder" => (true, true, true),
            "folder" => (true, true, false),
            "document" | "plain_text_document" | "rich_text_document" => (true, true, true),
            "typed_container" => (false, true, true),
            "container" | "text_line" => (false, true, false),
            "object" | "text_block" => (false, false, false),
            _ => return None,
        };

        let mut schema = Self::new(tag, boundary).with_field(FieldSchema::persisted("parent"));
        if has_children {
            schema = schema.with_field(FieldSchema::persisted("children"));
        }
        schema = schema
            .with_field(FieldSchema::persisted("references").with_cascade(Cascade::KEEP_ON_DELETE))
            .with_field(FieldSchema::not_persisted("property_bag"))
            .with_field(FieldSchema::not_persisted("observers"));

        if file_system {
            schema = schema
                .with_field(FieldSchema::persisted("name").indexed())
                .with_field(FieldSchema::persisted("path").indexed().stored_property())
                .with_field(
                    FieldSchema::persisted("root")
                        .indexed()
                        .stored_property()
                        .with_cascade(Cascade::NONE),
                );
        }
        match tag {
            "root_folder" => schema = schema.with_field(FieldSchema::persisted("source").indexed()),
            "document" | "plain_text_document" | "rich_text_document" | "typed_container" => {
                schema = schema.with_field(FieldSchema::persisted("mime_type"))
            }
            "text_block" => schema = schema.with_field(FieldSchema::persisted("text")),
            _ => {}
        }
        Some(schema)
    }
}

/// Registry of type schemas, keyed by node kind tag.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    types: HashMap<&'static str, TypeSchema>,
}

impl SchemaRegistry {
    /// An empty registry; kinds without a schema have no walkable fields.
    pub fn empty() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Registers `schema`, returning the one it replaced.
    pub fn register(&mut self, schema: TypeSchema) -> Option<TypeSchema> {
        self.types.insert(schema.kind, schema)
    }

    pub fn get(&self, kind: &str) -> Option<&TypeSchema> {
        self.types.get(kind)
    }

    pub fn is_boundary(&self, kind: &NodeKind) -> bool {
        self.get(kind.tag())
            .map(|s| s.boundary)
            .unwrap_or_else(|| kind.is_default_boundary())
    }

    /// Schemas in tag order.
    pub fn iter(&self) -> impl Iterator<Item = &TypeSchema> {
        let mut schemas: Vec<_> = self.types.values().collect();
        schemas.sort_by_key(|s| s.kind);
        schemas.into_iter()
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for tag in NodeKind::TAGS {
            if let Some(schema) = TypeSchema::builtin(tag) {
                registry.register(schema);
            }
        }
        registry
    }
}
