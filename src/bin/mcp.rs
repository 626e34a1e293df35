//! datacommons-mcp - Schema-aware GraphQL assistance for a data commons.
//!
//! Usage:
//!   datacommons-mcp                                  # serve MCP on stdio
//!   datacommons-mcp --config commons.toml            # explicit config file
//!   datacommons-mcp --base-url https://commons.example.org

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use datacommons::client::CommonsClient;
use datacommons::config::Config;
use datacommons::mcp::McpServer;
use datacommons::service::Service;

#[derive(Parser)]
#[command(name = "datacommons-mcp")]
#[command(about = "Schema-aware GraphQL query assistance for a data commons", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (TOML); defaults are used when absent
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the commons base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Override the credentials file path
    #[arg(long)]
    credentials_file: Option<String>,

    /// Override the schema cache TTL in seconds
    #[arg(long)]
    schema_cache_ttl: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    if let Some(credentials_file) = cli.credentials_file {
        config.credentials_file = credentials_file;
    }
    if let Some(ttl) = cli.schema_cache_ttl {
        config.schema_cache_ttl = ttl;
    }

    // stdout carries the protocol; all diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(base_url = %config.base_url, "starting");

    let client = CommonsClient::shared(config.clone())?;
    let service = Arc::new(Service::new(
        Arc::clone(&client) as Arc<dyn datacommons::schema::SchemaFetcher>,
        client as Arc<dyn datacommons::client::QueryExecutor>,
        Duration::from_secs(config.schema_cache_ttl),
    ));

    McpServer::new(service, config).run().await
}
