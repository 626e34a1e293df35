//! MCP tool implementations — maps tool calls to service operations.

use serde_json::{json, Value};

use crate::service::Service;

use super::protocol::{ToolDefinition, ToolsCallResult};

const DEFAULT_SUGGESTION_LIMIT: usize = 5;
const DEFAULT_TEMPLATE_MAX_FIELDS: usize = 20;
const DEFAULT_SAMPLE_LIMIT: u64 = 100;

/// Return the list of all available tools with their JSON schemas.
pub fn list_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "schema_summary".to_string(),
            description: "Overview of every entity in the commons data model: name, \
                field count, relationship count, category, and graph position. \
                Start here when exploring an unfamiliar commons."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
        ToolDefinition {
            name: "schema_entity".to_string(),
            description: "Full schema for one entity: fields with types and enum values, \
                required fields, and relationships to other entities. Unknown entity \
                names return close-match suggestions."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "entity": {
                        "type": "string",
                        "description": "Entity name (e.g., 'subject', 'sample')"
                    }
                },
                "required": ["entity"]
            }),
        },
        ToolDefinition {
            name: "schema_entities".to_string(),
            description: "List every queryable entity name, sorted.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
        ToolDefinition {
            name: "entity_context".to_string(),
            description: "Where an entity sits in the data model: its parents, children, \
                position in the graph, and example traversal queries."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "entity": {
                        "type": "string",
                        "description": "Entity name to describe"
                    }
                },
                "required": ["entity"]
            }),
        },
        ToolDefinition {
            name: "validate_query".to_string(),
            description: "Validate a GraphQL query against the commons schema without \
                executing it. Returns a structured report of issues (unknown entities, \
                unknown fields, malformed syntax) with ranked fix suggestions."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "GraphQL query text to validate"
                    }
                },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: "suggest_fields".to_string(),
            description: "Fuzzy-match a field name against an entity's fields and \
                relationships. Use when a validation report flags an unknown field."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "field_name": {
                        "type": "string",
                        "description": "The (possibly misspelled) field name"
                    },
                    "entity_name": {
                        "type": "string",
                        "description": "Entity whose fields to match against"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum suggestions to return (default: 5)",
                        "default": 5
                    }
                },
                "required": ["field_name", "entity_name"]
            }),
        },
        ToolDefinition {
            name: "query_template".to_string(),
            description: "Generate a ready-to-run GraphQL query for an entity. The \
                template always validates against the current schema, so it is a safe \
                starting point for incremental editing."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "entity": {
                        "type": "string",
                        "description": "Entity to build a query for"
                    },
                    "include_relationships": {
                        "type": "boolean",
                        "description": "Append one-level nested blocks for related entities (default: true)",
                        "default": true
                    },
                    "max_fields": {
                        "type": "integer",
                        "description": "Cap on scalar fields in the body (default: 20)",
                        "default": 20
                    }
                },
                "required": ["entity"]
            }),
        },
        ToolDefinition {
            name: "execute_graphql".to_string(),
            description: "Validate and then execute a GraphQL query against the commons. \
                Queries that fail validation are rejected locally with the full report \
                and never reach the remote."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "GraphQL query text to run"
                    }
                },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: "field_sample".to_string(),
            description: "Sample the values of one field across records: frequency \
                counts, most common first. Useful before writing filters."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "entity": {
                        "type": "string",
                        "description": "Entity to sample from"
                    },
                    "field": {
                        "type": "string",
                        "description": "Field whose values to sample"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum records to sample (default: 100)",
                        "default": 100
                    }
                },
                "required": ["entity", "field"]
            }),
        },
        ToolDefinition {
            name: "refresh_schema".to_string(),
            description: "Force a schema refresh from the commons and return the new \
                summary. Use after the data dictionary is known to have changed."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
    ]
}

/// Dispatch a tool call to the appropriate handler.
pub async fn call_tool(service: &Service, name: &str, arguments: &Value) -> ToolsCallResult {
    match name {
        "schema_summary" => handle_schema_summary(service).await,
        "schema_entity" => handle_schema_entity(service, arguments).await,
        "schema_entities" => handle_schema_entities(service).await,
        "entity_context" => handle_entity_context(service, arguments).await,
        "validate_query" => handle_validate_query(service, arguments).await,
        "suggest_fields" => handle_suggest_fields(service, arguments).await,
        "query_template" => handle_query_template(service, arguments).await,
        "execute_graphql" => handle_execute_graphql(service, arguments).await,
        "field_sample" => handle_field_sample(service, arguments).await,
        "refresh_schema" => handle_refresh_schema(service).await,
        _ => ToolsCallResult::error(format!("Unknown tool: {}", name)),
    }
}

fn require_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolsCallResult> {
    args.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ToolsCallResult::error(format!("Missing required parameter: {}", key)))
}

async fn handle_schema_summary(service: &Service) -> ToolsCallResult {
    match service.schema_summary().await {
        Ok(summary) => ToolsCallResult::json(&summary),
        Err(e) => ToolsCallResult::error(e.to_string()),
    }
}

async fn handle_schema_entity(service: &Service, args: &Value) -> ToolsCallResult {
    let entity = match require_str(args, "entity") {
        Ok(e) => e,
        Err(err) => return err,
    };
    match service.entity_schema(entity).await {
        Ok(detail) => ToolsCallResult::json(&detail),
        Err(e) => ToolsCallResult::error(e.to_string()),
    }
}

async fn handle_schema_entities(service: &Service) -> ToolsCallResult {
    match service.entity_names().await {
        Ok(names) => ToolsCallResult::json(&json!({
            "count": names.len(),
            "entities": names,
        })),
        Err(e) => ToolsCallResult::error(e.to_string()),
    }
}

async fn handle_entity_context(service: &Service, args: &Value) -> ToolsCallResult {
    let entity = match require_str(args, "entity") {
        Ok(e) => e,
        Err(err) => return err,
    };
    match service.entity_context(entity).await {
        Ok(context) => ToolsCallResult::json(&context),
        Err(e) => ToolsCallResult::error(e.to_string()),
    }
}

async fn handle_validate_query(service: &Service, args: &Value) -> ToolsCallResult {
    let query = match require_str(args, "query") {
        Ok(q) => q,
        Err(err) => return err,
    };
    match service.validate_query(query).await {
        Ok(report) => ToolsCallResult::json(&report),
        Err(e) => ToolsCallResult::error(e.to_string()),
    }
}

async fn handle_suggest_fields(service: &Service, args: &Value) -> ToolsCallResult {
    let field_name = match require_str(args, "field_name") {
        Ok(f) => f,
        Err(err) => return err,
    };
    let entity_name = match require_str(args, "entity_name") {
        Ok(e) => e,
        Err(err) => return err,
    };
    let limit = args
        .get("limit")
        .and_then(|v| v.as_u64())
        .unwrap_or(DEFAULT_SUGGESTION_LIMIT as u64) as usize;

    match service.suggest_fields(field_name, entity_name, limit).await {
        Ok(suggestions) => ToolsCallResult::json(&suggestions),
        Err(e) => ToolsCallResult::error(e.to_string()),
    }
}

async fn handle_query_template(service: &Service, args: &Value) -> ToolsCallResult {
    let entity = match require_str(args, "entity") {
        Ok(e) => e,
        Err(err) => return err,
    };
    let include_relationships = args
        .get("include_relationships")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);
    let max_fields = args
        .get("max_fields")
        .and_then(|v| v.as_u64())
        .unwrap_or(DEFAULT_TEMPLATE_MAX_FIELDS as u64) as usize;

    match service
        .query_template(entity, include_relationships, max_fields)
        .await
    {
        Ok(template) => ToolsCallResult::json(&template),
        Err(e) => ToolsCallResult::error(e.to_string()),
    }
}

async fn handle_execute_graphql(service: &Service, args: &Value) -> ToolsCallResult {
    let query = match require_str(args, "query") {
        Ok(q) => q,
        Err(err) => return err,
    };
    match service.execute_graphql(query).await {
        Ok(outcome) => ToolsCallResult::json(&outcome),
        Err(e) => ToolsCallResult::error(e.to_string()),
    }
}

async fn handle_field_sample(service: &Service, args: &Value) -> ToolsCallResult {
    let entity = match require_str(args, "entity") {
        Ok(e) => e,
        Err(err) => return err,
    };
    let field = match require_str(args, "field") {
        Ok(f) => f,
        Err(err) => return err,
    };
    let limit = args
        .get("limit")
        .and_then(|v| v.as_u64())
        .unwrap_or(DEFAULT_SAMPLE_LIMIT);

    match service.field_sample(entity, field, limit).await {
        Ok(outcome) => ToolsCallResult::json(&outcome),
        Err(e) => ToolsCallResult::error(e.to_string()),
    }
}

async fn handle_refresh_schema(service: &Service) -> ToolsCallResult {
    match service.refresh_schema().await {
        Ok(summary) => ToolsCallResult::json(&summary),
        Err(e) => ToolsCallResult::error(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::QueryExecutor;
    use crate::error::Result;
    use crate::schema::SchemaFetcher;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    struct StubFetcher;

    #[async_trait]
    impl SchemaFetcher for StubFetcher {
        async fn fetch_schema(&self) -> Result<Value> {
            Ok(json!({
                "subject": {
                    "properties": {
                        "gender": {"enum": ["male", "female"]},
                        "race": {"type": "string"}
                    }
                }
            }))
        }
    }

    struct StubExecutor;

    #[async_trait]
    impl QueryExecutor for StubExecutor {
        async fn execute(&self, _query: &str) -> Result<Value> {
            Ok(json!({"data": {"subject": []}}))
        }
    }

    fn service() -> Service {
        Service::new(
            Arc::new(StubFetcher),
            Arc::new(StubExecutor),
            Duration::from_secs(300),
        )
    }

    #[test]
    fn test_every_tool_has_object_schema() {
        let tools = list_tools();
        assert_eq!(tools.len(), 10);
        for tool in &tools {
            assert_eq!(tool.input_schema["type"], "object", "{}", tool.name);
            assert!(!tool.description.is_empty());
        }
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let result = call_tool(&service(), "nope", &json!({})).await;
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn test_missing_parameter() {
        let result = call_tool(&service(), "schema_entity", &json!({})).await;
        assert!(result.is_error);
        assert!(result.content[0].text.contains("entity"));
    }

    #[tokio::test]
    async fn test_validate_query_tool() {
        let result = call_tool(
            &service(),
            "validate_query",
            &json!({"query": "{ subject { id gander } }"}),
        )
        .await;
        assert!(!result.is_error);
        let report: Value = serde_json::from_str(&result.content[0].text).unwrap();
        assert_eq!(report["valid"], false);
        assert_eq!(report["issues"][0]["kind"], "unknown_field");
    }

    #[tokio::test]
    async fn test_query_template_tool() {
        let result = call_tool(&service(), "query_template", &json!({"entity": "subject"})).await;
        assert!(!result.is_error);
        let template: Value = serde_json::from_str(&result.content[0].text).unwrap();
        assert_eq!(template["exists"], true);
        assert!(template["template"]
            .as_str()
            .unwrap()
            .contains("subject(first: 10)"));
    }

    #[tokio::test]
    async fn test_schema_summary_tool() {
        let result = call_tool(&service(), "schema_summary", &json!({})).await;
        assert!(!result.is_error);
        let summary: Value = serde_json::from_str(&result.content[0].text).unwrap();
        assert_eq!(summary["entity_count"], 1);
    }

    #[tokio::test]
    async fn test_execute_graphql_tool_rejects_invalid() {
        let result = call_tool(
            &service(),
            "execute_graphql",
            &json!({"query": "{ subject { bogus } }"}),
        )
        .await;
        assert!(!result.is_error);
        let outcome: Value = serde_json::from_str(&result.content[0].text).unwrap();
        assert_eq!(outcome["executed"], false);
    }
}
