//! # datacommons-mcp
//!
//! Schema-aware GraphQL assistance for a data commons. MCP for biomedical data.
//!
//! The commons exposes its data model as a JSON schema dictionary and accepts
//! GraphQL queries against it. This crate fronts that API for AI agents: it
//! indexes the dictionary, validates queries locally before execution, turns
//! mistakes into ranked fix suggestions, and generates query templates that
//! are guaranteed to validate.
//!
//! ## Key Features
//!
//! - **Validate before execute**: malformed or misspelled queries never reach
//!   the remote; the agent gets a structured report instead
//! - **Fuzzy suggestions**: unknown entity and field names come back with
//!   close matches from the live schema
//! - **Templates**: ready-to-run queries per entity, safe to edit and re-check
//! - **Cached schema**: TTL cache with single-flight refresh and stale serving
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use datacommons::graphql::{generate_template, validate_text};
//! use datacommons::schema::build_index;
//!
//! # let dictionary = serde_json::json!({});
//! // Index the commons data dictionary
//! let index = build_index(&dictionary);
//!
//! // Validate a query against it
//! let report = validate_text("{ subject { id gender } }", &index);
//!
//! // Or start from a template that is known to validate
//! let template = generate_template("subject", &index, true, 20);
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod graphql;
pub mod mcp;
pub mod resources;
pub mod schema;
pub mod service;

// Re-exports for convenience
pub use error::{CommonsError, Result};

pub use client::{CommonsClient, QueryExecutor};
pub use config::Config;
pub use graphql::{
    generate_template, parse_query, suggest, validate, validate_text, IssueKind, ParseError,
    SelectionNode, Suggestion, TemplateResult, ValidationIssue, ValidationReport,
};
pub use schema::{build_index, Entity, SchemaCache, SchemaFetcher, SchemaIndex};
pub use service::Service;
