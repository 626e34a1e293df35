//! Typed schema model.
//!
//! One `SchemaIndex` is a whole-schema snapshot built by `ingest` from the
//! raw dictionary payload. Snapshots are immutable after construction; a
//! refresh builds a new index and swaps it in wholesale.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Scalar field type, normalized from the raw JSON-schema property shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Array,
    Boolean,
    Integer,
    Number,
    Object,
    String,
    Null,
    AnyOf,
    OneOf,
    Enum,
}

impl FieldType {
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "array" => Some(FieldType::Array),
            "boolean" => Some(FieldType::Boolean),
            "integer" => Some(FieldType::Integer),
            "number" => Some(FieldType::Number),
            "object" => Some(FieldType::Object),
            "string" => Some(FieldType::String),
            "null" => Some(FieldType::Null),
            _ => None,
        }
    }
}

/// A scalar field on an entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Allowed values when `field_type` is `Enum`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

/// How many records sit on each side of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Multiplicity {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl Multiplicity {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "one_to_one" => Some(Multiplicity::OneToOne),
            "one_to_many" => Some(Multiplicity::OneToMany),
            "many_to_one" => Some(Multiplicity::ManyToOne),
            "many_to_many" => Some(Multiplicity::ManyToMany),
            _ => None,
        }
    }

    /// Multiplicity as seen from the reverse (backref) side.
    pub fn reversed(self) -> Self {
        match self {
            Multiplicity::OneToMany => Multiplicity::ManyToOne,
            Multiplicity::ManyToOne => Multiplicity::OneToMany,
            other => other,
        }
    }
}

/// Semantic direction of a relationship edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelDirection {
    /// Explicit schema link: the owning entity is a child of the target.
    ChildOf,
    /// Backref-implied reverse edge: the owning entity is a parent.
    ParentOf,
}

/// A typed edge from one entity to another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipRef {
    /// Field name used in a query to traverse this edge (may be a plural or
    /// backref name that differs from the target entity's own name).
    pub link_field_name: String,
    pub target_entity: String,
    pub multiplicity: Multiplicity,
    pub direction: RelDirection,
    /// Reverse traversal name on the target entity, when the link declares one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backref: Option<String>,
}

/// Where an entity sits in the data model graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphPosition {
    Root,
    Intermediate,
    Leaf,
}

/// Descriptive summary attached to each entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntitySummary {
    pub title: String,
    pub description: String,
    pub category: String,
    pub enum_fields: Vec<String>,
    pub parent_count: usize,
    pub child_count: usize,
}

impl EntitySummary {
    pub fn position(&self) -> GraphPosition {
        if self.parent_count == 0 {
            GraphPosition::Root
        } else if self.child_count == 0 {
            GraphPosition::Leaf
        } else {
            GraphPosition::Intermediate
        }
    }
}

/// A named node type in the schema. Immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    /// Scalar fields in declared order.
    pub fields: Vec<Property>,
    /// Subset of field names required in a well-formed create/query context.
    pub required_fields: Vec<String>,
    /// Relationship links in declared order.
    pub relationships: Vec<RelationshipRef>,
    pub summary: EntitySummary,
}

impl Entity {
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&Property> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn relationship(&self, link_name: &str) -> Option<&RelationshipRef> {
        self.relationships
            .iter()
            .find(|r| r.link_field_name == link_name)
    }

    /// Every name valid in this entity's selection namespace.
    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .map(|f| f.name.as_str())
            .chain(self.relationships.iter().map(|r| r.link_field_name.as_str()))
    }
}

/// The whole-schema snapshot: entity name -> entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaIndex {
    pub entities: HashMap<String, Entity>,
    /// Structural problems found during ingestion. Diagnostics only;
    /// a defect never fails the refresh.
    pub defects: Vec<String>,
}

impl SchemaIndex {
    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    /// Entity names in sorted order, for deterministic listings.
    pub fn entity_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entities.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
