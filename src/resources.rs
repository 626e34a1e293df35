//! Static MCP resources describing the connected commons.
//!
//! Resources are read-only documents an agent can pull into context before
//! issuing tool calls: what the server is, which endpoints it talks to, and
//! the recommended explore/validate/execute workflow.

use serde::{Deserialize, Serialize};

use crate::config::Config;

pub const INFO_URI: &str = "commons://info";
pub const ENDPOINTS_URI: &str = "commons://endpoints";
pub const WORKFLOW_URI: &str = "commons://workflow";

/// Descriptor for one resource, as listed to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

/// All resources this server exposes.
pub fn list_resources() -> Vec<ResourceDescriptor> {
    vec![
        ResourceDescriptor {
            uri: INFO_URI.to_string(),
            name: "Commons overview".to_string(),
            description: "What this server is and which data commons it fronts".to_string(),
            mime_type: "text/markdown".to_string(),
        },
        ResourceDescriptor {
            uri: ENDPOINTS_URI.to_string(),
            name: "Remote endpoints".to_string(),
            description: "The commons API endpoints this server calls".to_string(),
            mime_type: "text/markdown".to_string(),
        },
        ResourceDescriptor {
            uri: WORKFLOW_URI.to_string(),
            name: "Query workflow".to_string(),
            description: "Recommended explore, validate, execute workflow".to_string(),
            mime_type: "text/markdown".to_string(),
        },
    ]
}

/// Resolve a resource URI to its document, or `None` for unknown URIs.
pub fn read_resource(uri: &str, config: &Config) -> Option<String> {
    match uri {
        INFO_URI => Some(info_document(config)),
        ENDPOINTS_URI => Some(endpoints_document(config)),
        WORKFLOW_URI => Some(WORKFLOW_DOCUMENT.to_string()),
        _ => None,
    }
}

fn info_document(config: &Config) -> String {
    format!(
        "# Data commons query server\n\n\
         Schema-aware GraphQL assistance for the data commons at {}.\n\n\
         Queries are validated against the live schema dictionary before any\n\
         execution, so malformed or misspelled queries are caught locally with\n\
         actionable suggestions instead of opaque remote errors. The schema is\n\
         cached for {} seconds and can be refreshed on demand with the\n\
         `refresh_schema` tool.\n",
        config.base_url, config.schema_cache_ttl
    )
}

fn endpoints_document(config: &Config) -> String {
    format!(
        "# Remote endpoints\n\n\
         | Purpose | URL |\n\
         |---------|-----|\n\
         | Token exchange | {} |\n\
         | GraphQL execution | {} |\n\
         | Schema dictionary | {} |\n",
        config.auth_url(),
        config.graphql_url(),
        config.schema_url()
    )
}

const WORKFLOW_DOCUMENT: &str = "\
# Query workflow

1. **Explore** — call `schema_summary` for the entity list, then
   `schema_entity` or `entity_context` for the entity you care about.
2. **Draft** — call `query_template` to get a query that is guaranteed to
   validate, then edit it toward what you need.
3. **Validate** — call `validate_query` after every edit; fix issues using
   the suggestions in the report.
4. **Execute** — call `execute_graphql` only once validation passes.
   Invalid queries are rejected locally and never reach the commons.

Use `suggest_fields` when you know roughly what a field is called, and
`field_sample` to see the actual values a field takes before filtering on it.
";
