//! Schema ingestion — normalizes the raw dictionary payload into a typed
//! `SchemaIndex`.
//!
//! The remote payload is loosely-typed JSON: entity name -> definition with
//! `properties`, `links` (possibly nested under `subgroup`), `required`, and
//! descriptive keys. Everything is validated here, once; the rest of the
//! crate never re-interprets raw JSON shapes. Malformed entities or links
//! are skipped and recorded as defects, never fatal for the whole refresh.

use serde_json::Value;
use tracing::{debug, warn};

use super::model::{
    Entity, EntitySummary, FieldType, Multiplicity, Property, RelDirection, RelationshipRef,
    SchemaIndex,
};

/// Fields the commons GraphQL layer serves on every entity, whether or not
/// the dictionary declares them.
const SYSTEM_FIELDS: &[&str] = &[
    "id",
    "submitter_id",
    "type",
    "created_datetime",
    "updated_datetime",
];

/// Build a `SchemaIndex` from the raw dictionary payload.
///
/// Relationship targets are resolved against the same batch of keys, so
/// forward references are fine. Links naming a target entity absent from the
/// payload are kept on their owning entity (traversal into them fails
/// validation later) and recorded as defects.
pub fn build_index(payload: &Value) -> SchemaIndex {
    let mut index = SchemaIndex::default();

    let Some(root) = payload.as_object() else {
        index
            .defects
            .push("schema payload is not a JSON object".to_string());
        return index;
    };

    // Backref edges collected while walking entities, applied after every
    // entity exists so the reverse side can be attached.
    let mut backrefs: Vec<RelationshipRef> = Vec::new();
    let mut backref_owners: Vec<String> = Vec::new();

    for (entity_name, entity_def) in root {
        if entity_name.starts_with('_') || entity_name == "metaschema" {
            continue;
        }
        let Some(def) = entity_def.as_object() else {
            index.defects.push(format!(
                "entity '{}' definition is not an object",
                entity_name
            ));
            continue;
        };

        let links = flatten_links(def.get("links"));
        let mut relationships = Vec::new();
        for link in &links {
            match parse_link(entity_name, link, &mut index.defects) {
                Some(rel) => {
                    if !root.contains_key(&rel.target_entity) {
                        index.defects.push(format!(
                            "entity '{}' link '{}' targets unknown entity '{}'",
                            entity_name, rel.link_field_name, rel.target_entity
                        ));
                    } else if let Some(back) = &rel.backref {
                        backref_owners.push(rel.target_entity.clone());
                        backrefs.push(RelationshipRef {
                            link_field_name: back.clone(),
                            target_entity: entity_name.clone(),
                            multiplicity: rel.multiplicity.reversed(),
                            direction: RelDirection::ParentOf,
                            backref: Some(rel.link_field_name.clone()),
                        });
                    }
                    relationships.push(rel);
                }
                None => continue,
            }
        }
        let link_names: Vec<&str> = relationships
            .iter()
            .map(|r| r.link_field_name.as_str())
            .collect();

        let mut fields = Vec::new();
        let mut enum_fields = Vec::new();
        if let Some(props) = def.get("properties").and_then(|p| p.as_object()) {
            for (prop_name, prop_def) in props {
                // Link names own their slot in the entity's namespace; a
                // scalar property with the same name is dropped.
                if link_names.contains(&prop_name.as_str()) {
                    continue;
                }
                match parse_property(prop_name, prop_def) {
                    Some(prop) => {
                        if prop.field_type == FieldType::Enum {
                            enum_fields.push(prop.name.clone());
                        }
                        fields.push(prop);
                    }
                    None => {
                        index.defects.push(format!(
                            "entity '{}' property '{}' has an unrecognized shape",
                            entity_name, prop_name
                        ));
                    }
                }
            }
        }

        for system in SYSTEM_FIELDS {
            if !fields.iter().any(|f| f.name == *system) && !link_names.contains(system) {
                fields.push(Property {
                    name: system.to_string(),
                    field_type: FieldType::String,
                    enum_values: None,
                });
            }
        }
        if let Some(sys_props) = def.get("systemProperties").and_then(|v| v.as_array()) {
            for sp in sys_props.iter().filter_map(|v| v.as_str()) {
                if !fields.iter().any(|f| f.name == sp) && !link_names.contains(&sp) {
                    fields.push(Property {
                        name: sp.to_string(),
                        field_type: FieldType::String,
                        enum_values: None,
                    });
                }
            }
        }

        let required_fields = def
            .get("required")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let summary = EntitySummary {
            title: string_key(def, "title"),
            description: string_key(def, "description"),
            category: string_key(def, "category"),
            enum_fields,
            parent_count: 0,
            child_count: 0,
        };

        index.entities.insert(
            entity_name.clone(),
            Entity {
                name: entity_name.clone(),
                fields,
                required_fields,
                relationships,
                summary,
            },
        );
    }

    // Attach backref-implied reverse relationships.
    for (owner, rel) in backref_owners.into_iter().zip(backrefs) {
        let Some(entity) = index.entities.get_mut(&owner) else {
            index.defects.push(format!(
                "backref '{}' targets unknown entity '{}'",
                rel.link_field_name, owner
            ));
            continue;
        };
        if entity.relationship(&rel.link_field_name).is_some() {
            continue;
        }
        if entity.has_field(&rel.link_field_name) {
            index.defects.push(format!(
                "entity '{}' backref '{}' collides with a scalar field",
                owner, rel.link_field_name
            ));
            continue;
        }
        entity.relationships.push(rel);
    }

    // Parent/child counts for position summaries.
    let counts: Vec<(String, usize, usize)> = index
        .entities
        .values()
        .map(|e| {
            let parents = e
                .relationships
                .iter()
                .filter(|r| r.direction == RelDirection::ChildOf)
                .count();
            let children = e.relationships.len() - parents;
            (e.name.clone(), parents, children)
        })
        .collect();
    for (name, parents, children) in counts {
        if let Some(entity) = index.entities.get_mut(&name) {
            entity.summary.parent_count = parents;
            entity.summary.child_count = children;
        }
    }

    if !index.defects.is_empty() {
        warn!(
            defects = index.defects.len(),
            "schema ingested with structural defects"
        );
        for defect in &index.defects {
            debug!(%defect, "schema defect");
        }
    }

    index
}

/// Direct links plus any `subgroup` sublinks, flattened.
fn flatten_links(links: Option<&Value>) -> Vec<&serde_json::Map<String, Value>> {
    let mut out = Vec::new();
    let Some(arr) = links.and_then(|v| v.as_array()) else {
        return out;
    };
    for link in arr.iter().filter_map(|v| v.as_object()) {
        if let Some(sub) = link.get("subgroup").and_then(|v| v.as_array()) {
            out.extend(sub.iter().filter_map(|v| v.as_object()));
        } else {
            out.push(link);
        }
    }
    out
}

fn parse_link(
    entity_name: &str,
    link: &serde_json::Map<String, Value>,
    defects: &mut Vec<String>,
) -> Option<RelationshipRef> {
    let name = link.get("name").and_then(|v| v.as_str());
    let target = link.get("target_type").and_then(|v| v.as_str());
    let (Some(name), Some(target)) = (name, target) else {
        defects.push(format!(
            "entity '{}' has a link missing 'name' or 'target_type'",
            entity_name
        ));
        return None;
    };

    let multiplicity = match link.get("multiplicity").and_then(|v| v.as_str()) {
        Some(raw) => match Multiplicity::parse(raw) {
            Some(m) => m,
            None => {
                defects.push(format!(
                    "entity '{}' link '{}' has unrecognized multiplicity '{}', assuming many_to_one",
                    entity_name, name, raw
                ));
                Multiplicity::ManyToOne
            }
        },
        None => Multiplicity::ManyToOne,
    };

    let backref = link
        .get("backref")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(String::from);

    Some(RelationshipRef {
        link_field_name: name.to_string(),
        target_entity: target.to_string(),
        multiplicity,
        direction: RelDirection::ChildOf,
        backref,
    })
}

fn parse_property(name: &str, def: &Value) -> Option<Property> {
    let obj = def.as_object()?;

    if let Some(vals) = obj.get("enum").and_then(|v| v.as_array()) {
        let enum_values = vals
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        return Some(Property {
            name: name.to_string(),
            field_type: FieldType::Enum,
            enum_values: Some(enum_values),
        });
    }

    if let Some(type_val) = obj.get("type") {
        // "type" may be a single name or a list like ["string", "null"].
        let type_name = match type_val {
            Value::String(s) => Some(s.as_str()),
            Value::Array(arr) => arr
                .iter()
                .filter_map(|v| v.as_str())
                .find(|s| *s != "null"),
            _ => None,
        }?;
        return FieldType::from_type_name(type_name).map(|field_type| Property {
            name: name.to_string(),
            field_type,
            enum_values: None,
        });
    }

    if obj.contains_key("anyOf") {
        return Some(Property {
            name: name.to_string(),
            field_type: FieldType::AnyOf,
            enum_values: None,
        });
    }
    if obj.contains_key("oneOf") {
        return Some(Property {
            name: name.to_string(),
            field_type: FieldType::OneOf,
            enum_values: None,
        });
    }

    None
}

fn string_key(def: &serde_json::Map<String, Value>, key: &str) -> String {
    def.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::model::GraphPosition;
    use serde_json::json;

    fn sample_payload() -> Value {
        json!({
            "_definitions": {"ignored": true},
            "metaschema": {"ignored": true},
            "program": {
                "title": "Program",
                "category": "administrative",
                "properties": {
                    "name": {"type": "string"},
                    "dbgap_accession_number": {"type": "string"}
                },
                "required": ["name"]
            },
            "study": {
                "title": "Study",
                "category": "administrative",
                "links": [
                    {
                        "name": "programs",
                        "target_type": "program",
                        "backref": "studies",
                        "multiplicity": "many_to_one",
                        "required": true
                    }
                ],
                "properties": {
                    "study_description": {"type": "string"},
                    "data_type": {"enum": ["genomic", "clinical"]}
                },
                "required": ["submitter_id"]
            },
            "subject": {
                "title": "Subject",
                "category": "clinical",
                "links": [
                    {
                        "subgroup": [
                            {
                                "name": "studies",
                                "target_type": "study",
                                "backref": "subjects",
                                "multiplicity": "many_to_many"
                            }
                        ]
                    }
                ],
                "properties": {
                    "gender": {"enum": ["male", "female", "unknown"]},
                    "age_at_enrollment": {"type": "integer"},
                    "race": {"type": ["string", "null"]}
                },
                "systemProperties": ["project_id", "state"]
            }
        })
    }

    #[test]
    fn test_builds_entities_and_skips_meta_keys() {
        let index = build_index(&sample_payload());
        assert_eq!(index.len(), 3);
        assert!(index.entity("_definitions").is_none());
        assert!(index.entity("metaschema").is_none());
    }

    #[test]
    fn test_declared_field_order_preserved() {
        let index = build_index(&sample_payload());
        let subject = index.entity("subject").unwrap();
        let names: Vec<&str> = subject.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(&names[..3], &["gender", "age_at_enrollment", "race"]);
    }

    #[test]
    fn test_system_fields_injected() {
        let index = build_index(&sample_payload());
        let subject = index.entity("subject").unwrap();
        for f in ["id", "submitter_id", "type", "project_id", "state"] {
            assert!(subject.has_field(f), "missing system field {}", f);
        }
    }

    #[test]
    fn test_subgroup_links_and_backrefs() {
        let index = build_index(&sample_payload());

        let subject = index.entity("subject").unwrap();
        let rel = subject.relationship("studies").unwrap();
        assert_eq!(rel.target_entity, "study");
        assert_eq!(rel.direction, RelDirection::ChildOf);
        assert_eq!(rel.multiplicity, Multiplicity::ManyToMany);

        // Backref puts the reverse edge on the target.
        let study = index.entity("study").unwrap();
        let back = study.relationship("subjects").unwrap();
        assert_eq!(back.target_entity, "subject");
        assert_eq!(back.direction, RelDirection::ParentOf);
    }

    #[test]
    fn test_nullable_union_type() {
        let index = build_index(&sample_payload());
        let subject = index.entity("subject").unwrap();
        assert_eq!(subject.field("race").unwrap().field_type, FieldType::String);
    }

    #[test]
    fn test_enum_fields_recorded() {
        let index = build_index(&sample_payload());
        let subject = index.entity("subject").unwrap();
        assert_eq!(subject.summary.enum_fields, vec!["gender"]);
        let gender = subject.field("gender").unwrap();
        assert_eq!(gender.enum_values.as_ref().unwrap().len(), 3);
    }

    #[test]
    fn test_positions() {
        let index = build_index(&sample_payload());
        assert_eq!(
            index.entity("program").unwrap().summary.position(),
            GraphPosition::Root
        );
        assert_eq!(
            index.entity("study").unwrap().summary.position(),
            GraphPosition::Intermediate
        );
        assert_eq!(
            index.entity("subject").unwrap().summary.position(),
            GraphPosition::Leaf
        );
    }

    #[test]
    fn test_missing_link_target_is_defect_not_fatal() {
        let payload = json!({
            "sample": {
                "links": [
                    {"name": "ghosts", "target_type": "ghost", "multiplicity": "many_to_one"}
                ],
                "properties": {"sample_type": {"type": "string"}}
            }
        });
        let index = build_index(&payload);
        assert_eq!(index.len(), 1);
        // The link is kept on the entity; traversal fails at validation time.
        assert!(index.entity("sample").unwrap().relationship("ghosts").is_some());
        assert!(index.defects.iter().any(|d| d.contains("ghost")));
    }

    #[test]
    fn test_malformed_link_skipped_with_defect() {
        let payload = json!({
            "sample": {
                "links": [{"target_type": "subject"}],
                "properties": {"sample_type": {"type": "string"}}
            },
            "subject": {"properties": {}}
        });
        let index = build_index(&payload);
        assert!(index.entity("sample").unwrap().relationships.is_empty());
        assert!(!index.defects.is_empty());
    }

    #[test]
    fn test_unrecognized_multiplicity_coerced_with_defect() {
        let payload = json!({
            "sample": {
                "links": [
                    {"name": "subjects", "target_type": "subject",
                     "multiplicity": "lots_to_lots"}
                ],
                "properties": {"sample_type": {"type": "string"}}
            },
            "subject": {"properties": {}}
        });
        let index = build_index(&payload);
        let rel = index.entity("sample").unwrap().relationship("subjects").unwrap();
        assert_eq!(rel.multiplicity, Multiplicity::ManyToOne);
        assert!(index.defects.iter().any(|d| d.contains("lots_to_lots")));
    }

    #[test]
    fn test_unrecognized_property_shape_skipped() {
        let payload = json!({
            "sample": {
                "properties": {
                    "weird": {"$ref": "#/definitions/whatever"},
                    "fine": {"type": "number"}
                }
            }
        });
        let index = build_index(&payload);
        let sample = index.entity("sample").unwrap();
        assert!(!sample.has_field("weird"));
        assert!(sample.has_field("fine"));
        assert!(index.defects.iter().any(|d| d.contains("weird")));
    }

    #[test]
    fn test_non_object_payload() {
        let index = build_index(&json!([1, 2, 3]));
        assert!(index.is_empty());
        assert!(!index.defects.is_empty());
    }
}
