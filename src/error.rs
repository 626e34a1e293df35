//! Error types for the datacommons crate.
//!
//! Domain outcomes (unknown field, malformed query, missing template entity)
//! are data in report structs, never `Err`. This enum covers the genuinely
//! exceptional paths: transport failures, bad credentials, and a schema cache
//! that has never been populated.

use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum CommonsError {
    /// Configuration is missing or inconsistent.
    #[error("config error: {0}")]
    Config(String),

    /// Credentials file is missing or not valid JSON.
    #[error("credentials error: {0}")]
    Credentials(String),

    /// Token endpoint rejected the credentials or returned a bad payload.
    #[error("auth error: {0}")]
    Auth(String),

    /// The remote schema dictionary could not be fetched.
    #[error("schema fetch failed: {0}")]
    SchemaFetch(String),

    /// No usable schema index exists (never fetched and fetch failed).
    #[error("schema unavailable: {0}")]
    SchemaUnavailable(String),

    /// GraphQL execution failed at the transport level.
    #[error("query execution failed: {0}")]
    Execution(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using CommonsError.
pub type Result<T> = std::result::Result<T, CommonsError>;
