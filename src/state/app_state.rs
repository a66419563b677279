//! Application state shared by all handlers
//!
//! The service keeps no per-user data: every request carries the user's
//! Google token. State holds configuration and the clients built from it,
//! all sharing one `reqwest::Client`.

use crate::analytics::DataAnalyticsClient;
use crate::auth::{GoogleOAuthClient, TokenVerifier};
use crate::config::Config;
use anyhow::Context as _;
use std::sync::Arc;
use std::time::Duration;

/// State handle passed to handlers
pub type SharedState = Arc<AppState>;

/// Main application state
#[derive(Debug, Clone)]
pub struct AppState {
    /// Loaded configuration
    pub config: Config,
    /// OAuth client for sign-in
    pub oauth: GoogleOAuthClient,
    /// Bearer token verifier
    pub verifier: TokenVerifier,
    /// Data Analytics API client
    pub analytics: DataAnalyticsClient,
}

impl AppState {
    /// Build state, creating the shared HTTP client
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.server.http_timeout_secs))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::with_client(config, http))
    }

    /// Build state around an existing HTTP client
    pub fn with_client(config: Config, http: reqwest::Client) -> Self {
        Self {
            oauth: GoogleOAuthClient::new(http.clone(), &config.oauth),
            verifier: TokenVerifier::new(http.clone(), &config.oauth),
            analytics: DataAnalyticsClient::new(http, &config.analytics),
            config,
        }
    }

    /// Wrap into the handle handlers receive
    pub fn shared(self) -> SharedState {
        Arc::new(self)
    }
}

/// State whose Google endpoints all point at `base_url` (a mock server)
#[cfg(test)]
pub(crate) fn test_state(base_url: &str) -> SharedState {
    let base_url = base_url.to_string();
    let config = Config::from_lookup(|key| {
        let value = match key {
            "GOOGLE_CLIENT_ID" => "client-123.apps.googleusercontent.com".to_string(),
            "GOOGLE_CLIENT_SECRET" => "secret".to_string(),
            "REDIRECT_URI" => "https://app.example.com/api/auth/callback".to_string(),
            "PROJECT_ID" => "demo-project".to_string(),
            "FRONTEND_URL" => "https://app.example.com".to_string(),
            "GOOGLE_AUTH_URL" => format!("{}/o/oauth2/v2/auth", base_url),
            "GOOGLE_TOKEN_URL" => format!("{}/token", base_url),
            "GOOGLE_TOKENINFO_URL" => format!("{}/tokeninfo", base_url),
            "GOOGLE_REVOKE_URL" => format!("{}/revoke", base_url),
            "DATA_ANALYTICS_API_URL" => format!("{}/v1beta", base_url),
            "OPERATION_POLL_INTERVAL_MS" => "1".to_string(),
            "OPERATION_MAX_POLLS" => "3".to_string(),
            _ => return None,
        };
        Some(value)
    })
    .expect("test config");
    AppState::with_client(config, reqwest::Client::new()).shared()
}
