//! HTTP client for the remote data commons.
//!
//! Implements the two capabilities the core depends on: fetching the schema
//! dictionary and executing GraphQL queries. Authentication uses the
//! commons credentials-file flow: the API key JSON is exchanged for a
//! short-lived bearer token, cached and refreshed ahead of expiry. Token
//! refresh is serialized behind a mutex so concurrent requests never race
//! the auth endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{CommonsError, Result};
use crate::schema::SchemaFetcher;

const USER_AGENT: &str = concat!("datacommons-mcp/", env!("CARGO_PKG_VERSION"));

/// Seconds before expiry at which a token is refreshed.
const REFRESH_MARGIN_SECONDS: i64 = 300;

/// Default token lifetime when the auth response omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECONDS: i64 = 1800;

/// GraphQL execution, supplied to the service alongside the schema fetcher.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, query: &str) -> Result<Value>;
}

/// An access token and its refresh schedule.
#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub refresh_threshold: DateTime<Utc>,
}

impl TokenInfo {
    /// Build from the auth endpoint's response payload.
    pub fn from_response(payload: &Value) -> Result<Self> {
        let access_token = payload
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                CommonsError::Auth("token response missing 'access_token'".to_string())
            })?
            .to_string();
        let expires_in = payload
            .get("expires_in")
            .and_then(|v| v.as_i64())
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECONDS);

        let expires_at = Utc::now() + ChronoDuration::seconds(expires_in);
        let refresh_threshold = expires_at - ChronoDuration::seconds(REFRESH_MARGIN_SECONDS);
        Ok(Self {
            access_token,
            expires_at,
            refresh_threshold,
        })
    }

    pub fn needs_refresh(&self) -> bool {
        Utc::now() >= self.refresh_threshold
    }
}

/// Client for one commons instance.
pub struct CommonsClient {
    config: Config,
    http: reqwest::Client,
    token: Mutex<Option<TokenInfo>>,
}

impl CommonsClient {
    pub fn new(config: Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            config,
            http,
            token: Mutex::new(None),
        })
    }

    /// Wrap in an `Arc` for sharing between the cache and the service.
    pub fn shared(config: Config) -> Result<Arc<Self>> {
        Ok(Arc::new(Self::new(config)?))
    }

    /// A valid bearer token, refreshing through the auth endpoint when
    /// missing or close to expiry.
    async fn ensure_token(&self) -> Result<String> {
        let mut slot = self.token.lock().await;
        if let Some(token) = slot.as_ref() {
            if !token.needs_refresh() {
                return Ok(token.access_token.clone());
            }
        }

        let credentials = self.load_credentials()?;
        debug!(url = %self.config.auth_url(), "refreshing access token");
        let response = self
            .http
            .post(self.config.auth_url())
            .json(&credentials)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CommonsError::Auth(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }
        let payload: Value = response.json().await?;
        let token = TokenInfo::from_response(&payload)?;
        info!("access token refreshed");
        let access_token = token.access_token.clone();
        *slot = Some(token);
        Ok(access_token)
    }

    fn load_credentials(&self) -> Result<Value> {
        let path = self.config.credentials_path();
        let text = std::fs::read_to_string(&path).map_err(|e| {
            CommonsError::Credentials(format!(
                "cannot read credentials file {}: {}",
                path.display(),
                e
            ))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            CommonsError::Credentials(format!(
                "credentials file {} is not valid JSON: {}",
                path.display(),
                e
            ))
        })
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        let token = self.ensure_token().await?;
        debug!(%url, "GET");
        let response = self.http.get(url).bearer_auth(token).send().await?;
        if !response.status().is_success() {
            return Err(CommonsError::SchemaFetch(format!(
                "GET {} returned {}",
                url,
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        let token = self.ensure_token().await?;
        debug!(%url, "POST");
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CommonsError::Execution(format!(
                "POST {} returned {}",
                url,
                response.status()
            )));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl SchemaFetcher for CommonsClient {
    async fn fetch_schema(&self) -> Result<Value> {
        let url = self.config.schema_url();
        info!(%url, "fetching schema dictionary");
        self.get_json(&url)
            .await
            .map_err(|e| CommonsError::SchemaFetch(e.to_string()))
    }
}

#[async_trait]
impl QueryExecutor for CommonsClient {
    async fn execute(&self, query: &str) -> Result<Value> {
        let preview: String = query.chars().take(200).collect();
        debug!(query = %preview, "executing GraphQL query");
        self.post_json(
            &self.config.graphql_url(),
            &serde_json::json!({ "query": query }),
        )
        .await
    }
}
