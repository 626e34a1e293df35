//! Field validator — walks a selection tree against the schema index.
//!
//! Every failure mode is data in the report, never an error: callers (and
//! the agents driving them) inspect a structured issue list. Issues are
//! reported in query-text order, depth-first, so repeated runs on the same
//! input produce identical reports.

use serde::{Deserialize, Serialize};

use crate::schema::model::{Entity, RelationshipRef, SchemaIndex};

use super::parser::{parse_query, ParseError, SelectionNode};
use super::suggest::{suggest, Suggestion, SUGGESTION_LIMIT};

/// What went wrong at one point in the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    UnknownEntity,
    UnknownField,
    UnknownRelationship,
    MalformedQuery,
}

/// One problem found during validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Names from the query root to the offending node.
    pub path: Vec<String>,
    pub kind: IssueKind,
    pub offending_name: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub suggestions: Vec<Suggestion>,
}

/// Result of validating one query against one schema snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// True iff `issues` is empty; warnings never affect validity.
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    fn from_walk(issues: Vec<ValidationIssue>, warnings: Vec<ValidationIssue>) -> Self {
        Self {
            valid: issues.is_empty(),
            issues,
            warnings,
        }
    }

    /// A report carrying a single `malformed_query` issue for text that
    /// never produced a selection tree.
    pub fn malformed(error: &ParseError) -> Self {
        Self {
            valid: false,
            issues: vec![ValidationIssue {
                path: Vec::new(),
                kind: IssueKind::MalformedQuery,
                offending_name: String::new(),
                message: error.to_string(),
                suggestions: Vec::new(),
            }],
            warnings: Vec::new(),
        }
    }
}

/// Parse and validate raw query text. Syntax errors become a
/// `malformed_query` report, never an `Err`.
pub fn validate_text(query: &str, index: &SchemaIndex) -> ValidationReport {
    match parse_query(query) {
        Ok(selections) => validate(&selections, index),
        Err(e) => ValidationReport::malformed(&e),
    }
}

/// Validate a parsed selection tree against the schema index.
pub fn validate(selections: &[SelectionNode], index: &SchemaIndex) -> ValidationReport {
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    for root in selections {
        let path = vec![root.name.clone()];
        match index.entity(&root.name) {
            Some(entity) => {
                if root.children.is_empty() {
                    warnings.push(ValidationIssue {
                        path: path.clone(),
                        kind: IssueKind::MalformedQuery,
                        offending_name: root.name.clone(),
                        message: format!("entity '{}' selected without any fields", root.name),
                        suggestions: Vec::new(),
                    });
                }
                walk_entity(entity, &root.children, &path, index, &mut issues, &mut warnings);
            }
            None => {
                let suggestions =
                    suggest(&root.name, index.entity_names(), SUGGESTION_LIMIT);
                issues.push(ValidationIssue {
                    path,
                    kind: IssueKind::UnknownEntity,
                    offending_name: root.name.clone(),
                    message: format!("entity '{}' does not exist in the schema", root.name),
                    suggestions,
                });
            }
        }
    }

    ValidationReport::from_walk(issues, warnings)
}

fn walk_entity(
    entity: &Entity,
    children: &[SelectionNode],
    path: &[String],
    index: &SchemaIndex,
    issues: &mut Vec<ValidationIssue>,
    warnings: &mut Vec<ValidationIssue>,
) {
    for child in children {
        let mut child_path = path.to_vec();
        child_path.push(child.name.clone());

        if entity.has_field(&child.name) {
            // A scalar cannot carry a nested selection.
            if !child.children.is_empty() {
                issues.push(ValidationIssue {
                    path: child_path,
                    kind: IssueKind::MalformedQuery,
                    offending_name: child.name.clone(),
                    message: format!(
                        "'{}' is a scalar field of '{}' and cannot have a nested selection",
                        child.name, entity.name
                    ),
                    suggestions: Vec::new(),
                });
            }
            continue;
        }

        if let Some(rel) = resolve_relationship(entity, &child.name) {
            if child.children.is_empty() {
                warnings.push(ValidationIssue {
                    path: child_path.clone(),
                    kind: IssueKind::MalformedQuery,
                    offending_name: child.name.clone(),
                    message: format!(
                        "relationship '{}' traversed without selecting any fields of '{}'",
                        child.name, rel.target_entity
                    ),
                    suggestions: Vec::new(),
                });
            }
            match index.entity(&rel.target_entity) {
                Some(target) => {
                    walk_entity(target, &child.children, &child_path, index, issues, warnings);
                }
                None => {
                    // The link exists but its target never made it into the
                    // schema snapshot; the traversal cannot be validated.
                    issues.push(ValidationIssue {
                        path: child_path,
                        kind: IssueKind::UnknownRelationship,
                        offending_name: child.name.clone(),
                        message: format!(
                            "relationship '{}' targets entity '{}' which is not in the schema",
                            child.name, rel.target_entity
                        ),
                        suggestions: Vec::new(),
                    });
                }
            }
            continue;
        }

        let suggestions = suggest(&child.name, entity.member_names(), SUGGESTION_LIMIT);
        issues.push(ValidationIssue {
            path: child_path,
            kind: IssueKind::UnknownField,
            offending_name: child.name.clone(),
            message: format!(
                "field '{}' does not exist in entity '{}'",
                child.name, entity.name
            ),
            suggestions,
        });
    }
}

/// Irregular plural traversal names seen in the wild.
const IRREGULAR_PLURALS: &[(&str, &str)] = &[
    ("child", "children"),
    ("person", "people"),
    ("datum", "data"),
    ("analysis", "analyses"),
    ("diagnosis", "diagnoses"),
];

/// Resolve a selection name to a relationship link.
///
/// Exact link names win; fall back to plural-of-target naming, which some
/// commons deployments expose alongside the declared link name.
fn resolve_relationship<'a>(entity: &'a Entity, name: &str) -> Option<&'a RelationshipRef> {
    if let Some(rel) = entity.relationship(name) {
        return Some(rel);
    }
    entity.relationships.iter().find(|rel| {
        let target = rel.target_entity.as_str();
        if name.len() == target.len() + 1 && name.starts_with(target) && name.ends_with('s') {
            return true;
        }
        IRREGULAR_PLURALS
            .iter()
            .any(|(singular, plural)| target == *singular && name == *plural)
    })
}
