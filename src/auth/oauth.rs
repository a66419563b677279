//! Google OAuth 2.0 client
//!
//! Builds the consent-screen URL and exchanges authorization codes for
//! access tokens (authorization code grant, offline access).

use crate::config::OAuthConfig;
use crate::error::AppError;
use anyhow::anyhow;
use serde::Deserialize;

/// Scopes requested at sign-in
///
/// BigQuery, Drive and Workspace scopes are needed because the Data
/// Analytics API reads the user's data with the user's own token.
pub const SCOPES: [&str; 8] = [
    "openid",
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/userinfo.profile",
    "https://www.googleapis.com/auth/bigquery",
    "https://www.googleapis.com/auth/cloud-platform",
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/documents",
    "https://www.googleapis.com/auth/drive",
];

/// Google's default access token lifetime, used when the response omits it
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// Token endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Access token for Google APIs
    pub access_token: String,
    /// Token type (always "Bearer" for Google)
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime of the access token in seconds
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Refresh token, only returned on first consent with offline access
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Space-separated granted scopes
    #[serde(default)]
    pub scope: Option<String>,
    /// OpenID Connect ID token
    #[serde(default)]
    pub id_token: Option<String>,
}

/// OAuth client bound to this application's client credentials
#[derive(Debug, Clone)]
pub struct GoogleOAuthClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    auth_url: String,
    token_url: String,
    revoke_url: String,
}

impl GoogleOAuthClient {
    /// Create a client using the shared HTTP client
    pub fn new(http: reqwest::Client, config: &OAuthConfig) -> Self {
        Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
            revoke_url: config.revoke_url.clone(),
        }
    }

    /// URL of Google's consent screen for [`SCOPES`]
    pub fn authorization_url(&self, state: Option<&str>) -> Result<String, AppError> {
        let mut params = vec![
            ("response_type", "code".to_string()),
            ("client_id", self.client_id.clone()),
            ("redirect_uri", self.redirect_uri.clone()),
            ("scope", SCOPES.join(" ")),
            ("access_type", "offline".to_string()),
        ];
        if let Some(state) = state {
            params.push(("state", state.to_string()));
        }

        reqwest::Url::parse_with_params(&self.auth_url, &params)
            .map(|url| url.to_string())
            .map_err(|e| AppError::Internal(anyhow!("Failed to get auth URL: {}", e)))
    }

    /// Exchange an authorization code for tokens
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AppError> {
        let params = [
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                status_code = status.as_u16(),
                error_body = %body,
                "Authorization code exchange rejected"
            );
            return Err(AppError::TokenExchange(
                "Failed to get access token".to_string(),
            ));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            tracing::warn!(error = %e, "Token endpoint returned an unreadable body");
            AppError::TokenExchange("Failed to get access token".to_string())
        })?;
        if token.access_token.is_empty() {
            return Err(AppError::TokenExchange(
                "Failed to get access token".to_string(),
            ));
        }

        tracing::debug!(
            expires_in = ?token.expires_in,
            has_refresh_token = token.refresh_token.is_some(),
            "Exchanged authorization code"
        );
        Ok(token)
    }

    /// Revoke a token; failures are logged and swallowed
    pub async fn revoke(&self, token: &str) {
        let result = self
            .http
            .post(&self.revoke_url)
            .form(&[("token", token)])
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("Token revoked");
            }
            Ok(response) => {
                tracing::warn!(status_code = response.status().as_u16(), "Token revocation rejected");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token revocation failed");
            }
        }
    }
}
