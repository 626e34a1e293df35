//! Configuration — environment variables, optional TOML file, and the
//! endpoint URLs derived from the commons base URL.
//!
//! Precedence: explicit overrides > `DATACOMMONS_*` environment variables >
//! TOML file > defaults.

use serde::{Deserialize, Serialize};

use crate::error::{CommonsError, Result};

/// Server configuration for one data commons instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the commons, e.g. "https://gen3.datacommons.io".
    pub base_url: String,
    /// Path to the credentials JSON file ("~" is expanded).
    pub credentials_file: String,
    /// HTTP request timeout in seconds.
    pub timeout_seconds: u64,
    /// Schema cache TTL in seconds.
    pub schema_cache_ttl: u64,
    /// Log filter, e.g. "info" or "datacommons=debug".
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://gen3.datacommons.io".to_string(),
            credentials_file: "~/credentials.json".to_string(),
            timeout_seconds: 30,
            schema_cache_ttl: 300,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load from an optional TOML file, then apply environment overrides.
    pub fn load(path: Option<&std::path::Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p)?;
                toml::from_str(&text)
                    .map_err(|e| CommonsError::Config(format!("invalid config file: {}", e)))?
            }
            None => Config::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("DATACOMMONS_BASE_URL") {
            self.base_url = v;
        }
        if let Ok(v) = std::env::var("DATACOMMONS_CREDENTIALS_FILE") {
            self.credentials_file = v;
        }
        if let Ok(v) = std::env::var("DATACOMMONS_TIMEOUT_SECONDS") {
            if let Ok(n) = v.parse() {
                self.timeout_seconds = n;
            }
        }
        if let Ok(v) = std::env::var("DATACOMMONS_SCHEMA_CACHE_TTL") {
            if let Ok(n) = v.parse() {
                self.schema_cache_ttl = n;
            }
        }
        if let Ok(v) = std::env::var("DATACOMMONS_LOG_LEVEL") {
            self.log_level = v;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(CommonsError::Config("base_url must not be empty".into()));
        }
        if self.timeout_seconds == 0 {
            return Err(CommonsError::Config(
                "timeout_seconds must be positive".into(),
            ));
        }
        Ok(())
    }

    /// URL for fetching access tokens.
    pub fn auth_url(&self) -> String {
        format!("{}/user/credentials/cdis/access_token", self.base_url())
    }

    /// URL for GraphQL queries.
    pub fn graphql_url(&self) -> String {
        format!("{}/api/v0/submission/graphql", self.base_url())
    }

    /// URL for the complete schema dictionary.
    pub fn schema_url(&self) -> String {
        format!("{}/api/v0/submission/_dictionary/_all", self.base_url())
    }

    /// Credentials file path with a leading "~" expanded to the home directory.
    pub fn credentials_path(&self) -> std::path::PathBuf {
        if let Some(rest) = self.credentials_file.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        std::path::PathBuf::from(&self.credentials_file)
    }

    fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}
