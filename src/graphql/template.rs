//! Template generator — emits a ready-to-run query for an entity.
//!
//! Output is deterministic for a given index: identity fields in a fixed
//! order, then priority and enum fields, then the remaining declared fields,
//! capped at `max_fields`; optional one-level relationship blocks. The text
//! always validates against the index it was generated from, so agents can
//! edit it incrementally and re-validate.

use serde::{Deserialize, Serialize};

use crate::schema::model::{Entity, SchemaIndex};
use crate::schema::FieldType;

use super::suggest::{suggest, Suggestion, SUGGESTION_LIMIT};

/// Identity fields every template leads with, in this order.
const IDENTITY_FIELDS: &[&str] = &["id", "submitter_id", "type"];

/// Commonly useful fields promoted ahead of the declared remainder.
const PRIORITY_FIELDS: &[&str] = &["created_datetime", "updated_datetime", "state"];

/// Default page size baked into the template's root argument.
const DEFAULT_FIRST: u64 = 10;

/// At most this many relationship blocks are appended.
const MAX_RELATIONSHIP_BLOCKS: usize = 5;

/// Result of template generation. An unknown entity yields `exists: false`,
/// never an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateResult {
    pub entity: String,
    pub exists: bool,
    pub template: Option<String>,
    /// Scalar field names included in the template body, in emitted order.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub fields: Vec<String>,
    /// Relationship link names included as nested blocks.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub relationships: Vec<String>,
    /// Required fields from the schema, for the caller's context.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub required_fields: Vec<String>,
    /// Entity-name suggestions when `exists` is false.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub suggestions: Vec<Suggestion>,
}

/// Generate a query template for `entity_name`.
pub fn generate_template(
    entity_name: &str,
    index: &SchemaIndex,
    include_relationships: bool,
    max_fields: usize,
) -> TemplateResult {
    let Some(entity) = index.entity(entity_name) else {
        return TemplateResult {
            entity: entity_name.to_string(),
            exists: false,
            template: None,
            fields: Vec::new(),
            relationships: Vec::new(),
            required_fields: Vec::new(),
            suggestions: suggest(entity_name, index.entity_names(), SUGGESTION_LIMIT),
        };
    };

    let fields = select_fields(entity, max_fields);
    // Links whose target never made it into the index stay on the entity
    // for validation reporting, but a template traversing them would fail
    // its own validation.
    let relationships: Vec<&str> = if include_relationships {
        entity
            .relationships
            .iter()
            .filter(|r| index.entity(&r.target_entity).is_some())
            .take(MAX_RELATIONSHIP_BLOCKS)
            .map(|r| r.link_field_name.as_str())
            .collect()
    } else {
        Vec::new()
    };

    let mut out = String::new();
    out.push_str("{\n");
    out.push_str(&format!("  {}(first: {}) {{\n", entity.name, DEFAULT_FIRST));
    for field in &fields {
        out.push_str(&format!("    {}\n", field));
    }
    for link in &relationships {
        out.push_str(&format!("    {} {{\n", link));
        out.push_str("      id\n");
        out.push_str("      submitter_id\n");
        out.push_str("    }\n");
    }
    out.push_str("  }\n");
    out.push('}');

    TemplateResult {
        entity: entity.name.clone(),
        exists: true,
        template: Some(out),
        fields: fields.iter().map(|s| s.to_string()).collect(),
        relationships: relationships.iter().map(|s| s.to_string()).collect(),
        required_fields: entity.required_fields.clone(),
        suggestions: Vec::new(),
    }
}

/// Pick the scalar fields for the body, in the documented fixed order.
///
/// Identity fields come first and are never dropped, even when `max_fields`
/// is smaller than their count; they do count toward the cap.
fn select_fields(entity: &Entity, max_fields: usize) -> Vec<&str> {
    let mut fields: Vec<&str> = Vec::new();

    for name in IDENTITY_FIELDS {
        if entity.has_field(name) {
            fields.push(name);
        }
    }

    for name in PRIORITY_FIELDS {
        if fields.len() >= max_fields {
            break;
        }
        if entity.has_field(name) && !fields.contains(name) {
            fields.push(name);
        }
    }

    // Enum fields usually drive filtering; promote them next.
    for prop in &entity.fields {
        if fields.len() >= max_fields {
            break;
        }
        if prop.field_type == FieldType::Enum && !fields.contains(&prop.name.as_str()) {
            fields.push(&prop.name);
        }
    }

    for prop in &entity.fields {
        if fields.len() >= max_fields {
            break;
        }
        let name = prop.name.as_str();
        if name.starts_with('_') || fields.contains(&name) {
            continue;
        }
        fields.push(name);
    }

    fields
}
