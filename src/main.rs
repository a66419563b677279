//! Conversational Analytics API server
//!
//! Serves the auth, agents and chat routes for the analytics frontend.

use conv_analytics_api::{config::Config, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load configuration; missing required variables stop startup
    let config = Config::from_env()?;

    server::run(config).await
}
