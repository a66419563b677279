//! Application configuration
//!
//! Centralized configuration management with environment variable support
//! and sensible defaults. Google OAuth credentials and the GCP project are
//! required; everything else falls back to a default.

use std::env;
use thiserror::Error;

/// Environment variables that must be set before the server starts
pub const REQUIRED_ENV_VARS: [&str; 4] = [
    "GOOGLE_CLIENT_ID",
    "GOOGLE_CLIENT_SECRET",
    "REDIRECT_URI",
    "PROJECT_ID",
];

/// Environment variable holding the frontend origin
pub const FRONTEND_URL_VAR: &str = "FRONTEND_URL";

/// Path the OAuth provider redirects back to, relative to the API prefix
pub const OAUTH_CALLBACK_PATH: &str = "/auth/callback";

const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";
const DEFAULT_DATA_ANALYTICS_API_URL: &str = "https://geminidataanalytics.googleapis.com/v1beta";
const DEFAULT_GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const DEFAULT_GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
const DEFAULT_GOOGLE_REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";

/// Configuration loading errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// One or more required variables are unset or blank
    #[error("Missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<String>),
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Google OAuth client configuration
    pub oauth: OAuthConfig,
    /// Gemini Data Analytics configuration
    pub analytics: AnalyticsConfig,
    /// Origin of the browser frontend (used for CORS and redirects)
    pub frontend_url: String,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind the server to
    pub port: u16,
    /// Host address to bind to
    pub host: String,
    /// Prefix the auth/agents/chat routers are mounted under ("" for root)
    pub api_prefix: String,
    /// Timeout for outbound HTTP requests (in seconds)
    pub http_timeout_secs: u64,
}

/// Google OAuth client configuration
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// OAuth client ID; verified tokens must carry it as audience
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Redirect URI registered with Google
    pub redirect_uri: String,
    /// Authorization endpoint
    pub auth_url: String,
    /// Token exchange endpoint
    pub token_url: String,
    /// Token introspection endpoint
    pub tokeninfo_url: String,
    /// Token revocation endpoint
    pub revoke_url: String,
    /// How long a verified token stays cached (0 disables caching)
    pub token_cache_ttl_secs: u64,
}

/// Gemini Data Analytics configuration
#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    /// GCP project owning agents and conversations
    pub project_id: String,
    /// GCP location of the resources
    pub location: String,
    /// REST base URL of the Data Analytics API
    pub api_base_url: String,
    /// Looker OAuth client ID attached to chats with Looker agents
    pub looker_client_id: Option<String>,
    /// Looker OAuth client secret
    pub looker_client_secret: Option<String>,
    /// Delay between long-running operation polls (in milliseconds)
    pub operation_poll_interval_ms: u64,
    /// Maximum number of polls before an operation is reported as timed out
    pub operation_max_polls: u32,
}

impl AnalyticsConfig {
    /// Looker credentials, when both halves are configured
    pub fn looker_credentials(&self) -> Option<(&str, &str)> {
        match (&self.looker_client_id, &self.looker_client_secret) {
            (Some(id), Some(secret)) => Some((id.as_str(), secret.as_str())),
            _ => None,
        }
    }
}

impl Config {
    /// Load configuration from `.env` and environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is fine in production
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let missing: Vec<String> = REQUIRED_ENV_VARS
            .iter()
            .filter(|key| get(key).is_none())
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let required = |key: &str| get(key).unwrap_or_default();
        let or_default = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());
        let number = |key: &str, default: u64| {
            get(key)
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(default)
        };

        let redirect_uri = required("REDIRECT_URI");
        if !redirect_uri.trim_end_matches('/').ends_with(OAUTH_CALLBACK_PATH) {
            tracing::warn!(
                redirect_uri = %redirect_uri,
                "REDIRECT_URI does not point at {}",
                OAUTH_CALLBACK_PATH
            );
        }

        Ok(Self {
            server: ServerConfig {
                port: get("PORT").and_then(|p| p.parse().ok()).unwrap_or(8080),
                host: or_default("HOST", "0.0.0.0"),
                api_prefix: normalize_prefix(lookup("API_PREFIX").as_deref().unwrap_or("/api")),
                http_timeout_secs: number("HTTP_TIMEOUT_SECS", 60),
            },
            oauth: OAuthConfig {
                client_id: required("GOOGLE_CLIENT_ID"),
                client_secret: required("GOOGLE_CLIENT_SECRET"),
                redirect_uri,
                auth_url: or_default("GOOGLE_AUTH_URL", DEFAULT_GOOGLE_AUTH_URL),
                token_url: or_default("GOOGLE_TOKEN_URL", DEFAULT_GOOGLE_TOKEN_URL),
                tokeninfo_url: or_default("GOOGLE_TOKENINFO_URL", DEFAULT_GOOGLE_TOKENINFO_URL),
                revoke_url: or_default("GOOGLE_REVOKE_URL", DEFAULT_GOOGLE_REVOKE_URL),
                token_cache_ttl_secs: number("TOKEN_CACHE_TTL_SECS", 300),
            },
            analytics: AnalyticsConfig {
                project_id: required("PROJECT_ID"),
                location: or_default("GCP_LOCATION", "global"),
                api_base_url: or_default("DATA_ANALYTICS_API_URL", DEFAULT_DATA_ANALYTICS_API_URL)
                    .trim_end_matches('/')
                    .to_string(),
                looker_client_id: get("LOOKER_CLIENT_ID"),
                looker_client_secret: get("LOOKER_CLIENT_SECRET"),
                operation_poll_interval_ms: number("OPERATION_POLL_INTERVAL_MS", 500),
                operation_max_polls: get("OPERATION_MAX_POLLS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(120),
            },
            frontend_url: or_default(FRONTEND_URL_VAR, DEFAULT_FRONTEND_URL)
                .trim_end_matches('/')
                .to_string(),
        })
    }

    /// Get the server address as a string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Resource parent for agents and conversations
    pub fn parent(&self) -> String {
        format!(
            "projects/{}/locations/{}",
            self.analytics.project_id, self.analytics.location
        )
    }
}

/// Normalise a route prefix to `/segment` form, or "" for the root
fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}
