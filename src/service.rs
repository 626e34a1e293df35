//! Service layer — the operations exposed to the MCP tool surface.
//!
//! Owns the schema cache and the query executor. Every operation takes the
//! current snapshot from the cache and runs the pure parse/validate/suggest/
//! template machinery over it; only `execute_graphql` and `field_sample`
//! ever touch the network beyond the schema fetch.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::client::QueryExecutor;
use crate::error::Result;
use crate::graphql::{generate_template, suggest, validate_text, SUGGESTION_LIMIT};
use crate::graphql::{Suggestion, TemplateResult, ValidationReport};
use crate::schema::model::{
    EntitySummary, GraphPosition, Multiplicity, Property, RelDirection, RelationshipRef,
};
use crate::schema::{SchemaCache, SchemaFetcher};

/// One row of the schema summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityOverview {
    pub name: String,
    pub field_count: usize,
    pub relationship_count: usize,
    pub category: String,
    pub position: GraphPosition,
}

/// Whole-schema overview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSummary {
    pub entity_count: usize,
    pub entities: Vec<EntityOverview>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub defects: Vec<String>,
}

/// Full detail for one entity, or `exists: false` with suggestions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDetail {
    pub entity: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub fields: Vec<Property>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub required_fields: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub relationships: Vec<RelationshipRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<EntitySummary>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub suggestions: Vec<Suggestion>,
}

/// One traversal edge in an entity's context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextLink {
    pub link_field_name: String,
    pub target_entity: String,
    pub multiplicity: Multiplicity,
}

/// Hierarchical context for one entity: where it sits in the data model and
/// how to traverse out of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityContext {
    pub entity: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<GraphPosition>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub parents: Vec<ContextLink>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<ContextLink>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub example_queries: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub suggestions: Vec<Suggestion>,
}

/// Ranked field suggestions for a (field, entity) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSuggestions {
    pub field_name: String,
    pub entity_name: String,
    pub entity_exists: bool,
    pub suggestions: Vec<Suggestion>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub entity_suggestions: Vec<Suggestion>,
    pub total_valid_fields: usize,
}

/// Outcome of validate-then-execute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// False when validation failed and no network call was made.
    pub executed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// Frequency sample of one field's values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSample {
    pub entity: String,
    pub field: String,
    pub total_records: usize,
    pub unique_values: usize,
    /// value -> occurrence count, most frequent first.
    pub values: Vec<(String, usize)>,
    pub query_used: String,
}

/// The core service: schema cache plus executor collaborator.
pub struct Service {
    cache: SchemaCache,
    executor: Arc<dyn QueryExecutor>,
}

impl Service {
    pub fn new(
        fetcher: Arc<dyn SchemaFetcher>,
        executor: Arc<dyn QueryExecutor>,
        schema_ttl: Duration,
    ) -> Self {
        Self {
            cache: SchemaCache::new(fetcher, schema_ttl),
            executor,
        }
    }

    /// Overview of every entity, sorted by name.
    pub async fn schema_summary(&self) -> Result<SchemaSummary> {
        let index = self.cache.get_index().await?;
        let entities = index
            .entity_names()
            .into_iter()
            .filter_map(|name| index.entity(name))
            .map(|entity| EntityOverview {
                name: entity.name.clone(),
                field_count: entity.fields.len(),
                relationship_count: entity.relationships.len(),
                category: entity.summary.category.clone(),
                position: entity.summary.position(),
            })
            .collect();
        Ok(SchemaSummary {
            entity_count: index.len(),
            entities,
            defects: index.defects.clone(),
        })
    }

    /// Sorted entity names.
    pub async fn entity_names(&self) -> Result<Vec<String>> {
        let index = self.cache.get_index().await?;
        Ok(index.entity_names().into_iter().map(String::from).collect())
    }

    /// Full schema detail for one entity.
    pub async fn entity_schema(&self, entity_name: &str) -> Result<EntityDetail> {
        let index = self.cache.get_index().await?;
        match index.entity(entity_name) {
            Some(entity) => Ok(EntityDetail {
                entity: entity.name.clone(),
                exists: true,
                fields: entity.fields.clone(),
                required_fields: entity.required_fields.clone(),
                relationships: entity.relationships.clone(),
                summary: Some(entity.summary.clone()),
                suggestions: Vec::new(),
            }),
            None => Ok(EntityDetail {
                entity: entity_name.to_string(),
                exists: false,
                fields: Vec::new(),
                required_fields: Vec::new(),
                relationships: Vec::new(),
                summary: None,
                suggestions: suggest(
                    entity_name,
                    index.entity_names(),
                    SUGGESTION_LIMIT,
                ),
            }),
        }
    }

    /// Where an entity sits in the model graph and how to traverse from it.
    pub async fn entity_context(&self, entity_name: &str) -> Result<EntityContext> {
        let index = self.cache.get_index().await?;
        let Some(entity) = index.entity(entity_name) else {
            return Ok(EntityContext {
                entity: entity_name.to_string(),
                exists: false,
                position: None,
                parents: Vec::new(),
                children: Vec::new(),
                example_queries: Vec::new(),
                suggestions: suggest(
                    entity_name,
                    index.entity_names(),
                    SUGGESTION_LIMIT,
                ),
            });
        };

        let link = |r: &RelationshipRef| ContextLink {
            link_field_name: r.link_field_name.clone(),
            target_entity: r.target_entity.clone(),
            multiplicity: r.multiplicity,
        };
        let parents: Vec<ContextLink> = entity
            .relationships
            .iter()
            .filter(|r| r.direction == RelDirection::ChildOf)
            .map(link)
            .collect();
        let children: Vec<ContextLink> = entity
            .relationships
            .iter()
            .filter(|r| r.direction == RelDirection::ParentOf)
            .map(link)
            .collect();

        // One worked traversal example per direction keeps the payload small
        // while showing the agent the exact link field names to use.
        let mut example_queries = Vec::new();
        example_queries.push(format!("{{ {}(first: 10) {{ id submitter_id }} }}", entity.name));
        if let Some(parent) = parents.first() {
            example_queries.push(format!(
                "{{ {} {{ id {} {{ id submitter_id }} }} }}",
                entity.name, parent.link_field_name
            ));
        }
        if let Some(child) = children.first() {
            example_queries.push(format!(
                "{{ {} {{ id {} {{ id submitter_id }} }} }}",
                entity.name, child.link_field_name
            ));
        }

        Ok(EntityContext {
            entity: entity.name.clone(),
            exists: true,
            position: Some(entity.summary.position()),
            parents,
            children,
            example_queries,
            suggestions: Vec::new(),
        })
    }

    /// Validate raw query text against the current schema snapshot.
    pub async fn validate_query(&self, query: &str) -> Result<ValidationReport> {
        let index = self.cache.get_index().await?;
        let report = validate_text(query, &index);
        debug!(valid = report.valid, issues = report.issues.len(), "query validated");
        Ok(report)
    }

    /// Ranked suggestions for a field name within an entity's namespace.
    pub async fn suggest_fields(
        &self,
        field_name: &str,
        entity_name: &str,
        limit: usize,
    ) -> Result<FieldSuggestions> {
        let index = self.cache.get_index().await?;
        match index.entity(entity_name) {
            Some(entity) => {
                let total_valid_fields =
                    entity.fields.len() + entity.relationships.len();
                Ok(FieldSuggestions {
                    field_name: field_name.to_string(),
                    entity_name: entity_name.to_string(),
                    entity_exists: true,
                    suggestions: suggest(field_name, entity.member_names(), limit),
                    entity_suggestions: Vec::new(),
                    total_valid_fields,
                })
            }
            None => Ok(FieldSuggestions {
                field_name: field_name.to_string(),
                entity_name: entity_name.to_string(),
                entity_exists: false,
                suggestions: Vec::new(),
                entity_suggestions: suggest(
                    entity_name,
                    index.entity_names(),
                    SUGGESTION_LIMIT,
                ),
                total_valid_fields: 0,
            }),
        }
    }

    /// Generate a query template for an entity.
    pub async fn query_template(
        &self,
        entity_name: &str,
        include_relationships: bool,
        max_fields: usize,
    ) -> Result<TemplateResult> {
        let index = self.cache.get_index().await?;
        Ok(generate_template(
            entity_name,
            &index,
            include_relationships,
            max_fields,
        ))
    }

    /// Validate, then execute. Validation failures short-circuit with the
    /// report and never reach the network.
    pub async fn execute_graphql(&self, query: &str) -> Result<ExecutionOutcome> {
        let report = self.validate_query(query).await?;
        if !report.valid {
            info!(issues = report.issues.len(), "rejecting query before execution");
            return Ok(ExecutionOutcome {
                executed: false,
                validation: Some(report),
                result: None,
            });
        }

        let mut result = self.executor.execute(query).await?;
        if result.get("errors").is_some() {
            // The remote accepted the transport but rejected the query;
            // point the agent back at the assistance tools.
            if let Some(obj) = result.as_object_mut() {
                obj.insert(
                    "guidance".to_string(),
                    Value::String(
                        "the remote rejected this query; re-run validate_query after edits, \
                         or start from query_template"
                            .to_string(),
                    ),
                );
            }
        }
        Ok(ExecutionOutcome {
            executed: true,
            validation: None,
            result: Some(result),
        })
    }

    /// Sample the values of one field across up to `limit` records.
    pub async fn field_sample(
        &self,
        entity_name: &str,
        field_name: &str,
        limit: u64,
    ) -> Result<ExecutionOutcome> {
        let query = format!(
            "{{\n  {}(first: {}) {{\n    {}\n  }}\n}}",
            entity_name, limit, field_name
        );
        let report = self.validate_query(&query).await?;
        if !report.valid {
            return Ok(ExecutionOutcome {
                executed: false,
                validation: Some(report),
                result: None,
            });
        }

        let result = self.executor.execute(&query).await?;
        let sample = tally_field_values(entity_name, field_name, &query, &result);
        Ok(ExecutionOutcome {
            executed: true,
            validation: None,
            result: Some(serde_json::to_value(sample)?),
        })
    }

    /// Mark the schema cache stale; the next operation refreshes it.
    pub async fn invalidate_schema_cache(&self) {
        self.cache.invalidate().await;
    }

    /// Force a refresh now and return the new summary.
    pub async fn refresh_schema(&self) -> Result<SchemaSummary> {
        self.cache.refresh().await?;
        self.schema_summary().await
    }
}

/// Count value occurrences in an execution result, most frequent first;
/// ties resolve by value text for stable output.
fn tally_field_values(
    entity_name: &str,
    field_name: &str,
    query: &str,
    result: &Value,
) -> FieldSample {
    let records = result
        .get("data")
        .and_then(|d| d.get(entity_name))
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    for record in &records {
        let Some(value) = record.get(field_name) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        *counts.entry(text).or_insert(0) += 1;
    }

    let mut values: Vec<(String, usize)> = counts.into_iter().collect();
    values.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    FieldSample {
        entity: entity_name.to_string(),
        field: field_name.to_string(),
        total_records: records.len(),
        unique_values: values.len(),
        values,
        query_used: query.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubFetcher;

    #[async_trait]
    impl SchemaFetcher for StubFetcher {
        async fn fetch_schema(&self) -> Result<Value> {
            Ok(json!({
                "study": {
                    "category": "administrative",
                    "properties": {"study_description": {"type": "string"}}
                },
                "subject": {
                    "category": "clinical",
                    "links": [
                        {"name": "studies", "target_type": "study", "backref": "subjects",
                         "multiplicity": "many_to_many"}
                    ],
                    "properties": {
                        "gender": {"enum": ["male", "female", "unknown"]},
                        "race": {"type": "string"}
                    }
                }
            }))
        }
    }

    struct StubExecutor {
        calls: AtomicUsize,
        response: Value,
    }

    impl StubExecutor {
        fn new(response: Value) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response,
            }
        }
    }

    #[async_trait]
    impl QueryExecutor for StubExecutor {
        async fn execute(&self, _query: &str) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    fn service_with(executor: Arc<StubExecutor>) -> Service {
        Service::new(Arc::new(StubFetcher), executor, Duration::from_secs(300))
    }

    fn service() -> Service {
        service_with(Arc::new(StubExecutor::new(json!({"data": {}}))))
    }

    #[tokio::test]
    async fn test_schema_summary_sorted() {
        let summary = service().schema_summary().await.unwrap();
        assert_eq!(summary.entity_count, 2);
        let names: Vec<&str> = summary.entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["study", "subject"]);
        assert_eq!(summary.entities[1].category, "clinical");
    }

    #[tokio::test]
    async fn test_entity_schema_found() {
        let detail = service().entity_schema("subject").await.unwrap();
        assert!(detail.exists);
        assert!(detail.fields.iter().any(|f| f.name == "gender"));
        assert_eq!(detail.relationships.len(), 1);
    }

    #[tokio::test]
    async fn test_entity_schema_missing_suggests() {
        let detail = service().entity_schema("subjct").await.unwrap();
        assert!(!detail.exists);
        assert_eq!(detail.suggestions[0].name, "subject");
    }

    #[tokio::test]
    async fn test_entity_context() {
        let context = service().entity_context("study").await.unwrap();
        assert!(context.exists);
        // study has a backref-implied child link to subject.
        assert_eq!(context.children.len(), 1);
        assert_eq!(context.children[0].target_entity, "subject");
        assert!(!context.example_queries.is_empty());
    }

    #[tokio::test]
    async fn test_suggest_fields() {
        let suggestions = service().suggest_fields("gander", "subject", 5).await.unwrap();
        assert!(suggestions.entity_exists);
        assert_eq!(suggestions.suggestions[0].name, "gender");
    }

    #[tokio::test]
    async fn test_suggest_fields_unknown_entity() {
        let suggestions = service().suggest_fields("gender", "subjects_", 5).await.unwrap();
        assert!(!suggestions.entity_exists);
        assert!(suggestions.suggestions.is_empty());
        assert_eq!(suggestions.entity_suggestions[0].name, "subject");
    }

    #[tokio::test]
    async fn test_execute_rejects_invalid_without_network() {
        let executor = Arc::new(StubExecutor::new(json!({"data": {}})));
        let service = service_with(Arc::clone(&executor));

        let outcome = service
            .execute_graphql("{ subject { id gander } }")
            .await
            .unwrap();
        assert!(!outcome.executed);
        assert!(!outcome.validation.unwrap().valid);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_execute_valid_query() {
        let executor = Arc::new(StubExecutor::new(json!({"data": {"subject": []}})));
        let service = service_with(Arc::clone(&executor));

        let outcome = service
            .execute_graphql("{ subject { id gender } }")
            .await
            .unwrap();
        assert!(outcome.executed);
        assert!(outcome.result.is_some());
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_execute_attaches_guidance_on_remote_errors() {
        let executor = Arc::new(StubExecutor::new(
            json!({"errors": [{"message": "Cannot query field"}]}),
        ));
        let service = service_with(executor);

        let outcome = service.execute_graphql("{ subject { id } }").await.unwrap();
        let result = outcome.result.unwrap();
        assert!(result.get("guidance").is_some());
    }

    #[tokio::test]
    async fn test_field_sample_tallies() {
        let executor = Arc::new(StubExecutor::new(json!({
            "data": {"subject": [
                {"gender": "female"},
                {"gender": "male"},
                {"gender": "female"},
                {"gender": null}
            ]}
        })));
        let service = service_with(executor);

        let outcome = service.field_sample("subject", "gender", 100).await.unwrap();
        assert!(outcome.executed);
        let sample: FieldSample = serde_json::from_value(outcome.result.unwrap()).unwrap();
        assert_eq!(sample.total_records, 4);
        assert_eq!(sample.unique_values, 2);
        assert_eq!(sample.values[0], ("female".to_string(), 2));
    }

    #[tokio::test]
    async fn test_field_sample_rejects_bad_field() {
        let executor = Arc::new(StubExecutor::new(json!({"data": {}})));
        let service = service_with(Arc::clone(&executor));

        let outcome = service.field_sample("subject", "gander", 100).await.unwrap();
        assert!(!outcome.executed);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    }
}
