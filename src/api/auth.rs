//! Authentication API handlers
//!
//! Google OAuth sign-in: authorization URL, the browser callback, code
//! exchange, logout and the current user's token info.

use crate::api::utils::{frontend_redirect_url, non_blank, MessageResponse};
use crate::auth::{oauth::DEFAULT_EXPIRES_IN_SECS, BearerToken, VerifiedToken};
use crate::error::AppError;
use crate::state::SharedState;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Json, Redirect, Response},
};
use serde::{Deserialize, Serialize};

/// Authorization URL response
#[derive(Debug, Serialize)]
pub struct AuthUrlResponse {
    /// Google consent screen URL
    pub auth_url: String,
}

/// Query parameters Google appends to the redirect URI
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    /// Authorization code
    pub code: Option<String>,
    /// Error reported by Google (e.g. `access_denied`)
    pub error: Option<String>,
    /// Opaque state round-tripped through Google
    pub state: Option<String>,
}

/// Code exchange request sent by the frontend
#[derive(Debug, Default, Deserialize)]
pub struct CodeExchangeRequest {
    /// Authorization code
    #[serde(default)]
    pub code: Option<String>,
    /// Error forwarded from the callback
    #[serde(default)]
    pub error: Option<String>,
}

/// Token handed to the frontend after a successful exchange
#[derive(Debug, Serialize)]
pub struct TokenExchangeResponse {
    /// Google access token
    pub access_token: String,
    /// Always "Bearer"
    pub token_type: String,
    /// Lifetime in seconds
    pub expires_in: u64,
    /// Refresh token, only on first consent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Current user response
#[derive(Debug, Serialize)]
pub struct MeResponse {
    /// Account email, when the email scope was granted
    pub email: Option<String>,
    /// Google account id
    pub sub: Option<String>,
    /// Granted scopes
    pub scopes: Vec<String>,
    /// Remaining token lifetime in seconds
    pub expires_in: Option<u64>,
}

/// GET /api/auth/google/url - Google authorization URL
pub async fn google_url(
    State(state): State<SharedState>,
) -> Result<Json<AuthUrlResponse>, AppError> {
    let auth_url = state.oauth.authorization_url(None)?;
    Ok(Json(AuthUrlResponse { auth_url }))
}

/// GET /api/auth/callback - Redirect target registered with Google
///
/// Forwards the code (or error) to the frontend, which completes the
/// exchange through `POST /api/auth/google/callback`.
pub async fn callback(
    State(state): State<SharedState>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect, AppError> {
    let frontend = &state.config.frontend_url;

    if let Some(error) = non_blank(&params.error) {
        tracing::warn!(error = %error, "OAuth callback returned an error");
        return Ok(Redirect::temporary(&frontend_redirect_url(
            frontend, "error", error,
        )));
    }

    let code = non_blank(&params.code)
        .ok_or_else(|| AppError::BadRequest("Authorization code is required".to_string()))?;

    tracing::debug!(has_state = params.state.is_some(), "OAuth callback received code");
    Ok(Redirect::temporary(&frontend_redirect_url(
        frontend, "code", code,
    )))
}

/// POST /api/auth/google/callback - Exchange an authorization code
pub async fn exchange_code(
    State(state): State<SharedState>,
    Json(request): Json<CodeExchangeRequest>,
) -> Result<Response, AppError> {
    if let Some(error) = non_blank(&request.error) {
        tracing::warn!(error = %error, "Code exchange called with an OAuth error");
        return Ok(Redirect::temporary(&frontend_redirect_url(
            &state.config.frontend_url,
            "error",
            error,
        ))
        .into_response());
    }

    let code = non_blank(&request.code)
        .ok_or_else(|| AppError::BadRequest("Authorization code is required".to_string()))?;

    let token = state.oauth.exchange_code(code).await?;
    tracing::info!(
        has_refresh_token = token.refresh_token.is_some(),
        "Exchanged authorization code"
    );

    Ok(Json(TokenExchangeResponse {
        access_token: token.access_token,
        token_type: "Bearer".to_string(),
        expires_in: token.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
        refresh_token: token.refresh_token,
    })
    .into_response())
}

/// GET /api/auth/logout - Sign out
///
/// Tokens live on the client, so there is nothing to clear server-side.
/// A Bearer token sent along is revoked with Google.
pub async fn logout(
    State(state): State<SharedState>,
    token: Option<BearerToken>,
) -> Json<MessageResponse> {
    if let Some(BearerToken(token)) = token {
        state.oauth.revoke(&token).await;
    }
    Json(MessageResponse::new("Logged out successfully"))
}

/// GET /api/auth/me - Info about the caller's verified token
pub async fn me(verified: VerifiedToken) -> Json<MeResponse> {
    let scopes = verified.info.scopes();
    Json(MeResponse {
        email: verified.info.email,
        sub: verified.info.sub,
        scopes,
        expires_in: verified.info.expires_in,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenInfo;
    use crate::state::app_state::test_state;
    use axum::http::{header::LOCATION, StatusCode};

    fn location(response: Response) -> String {
        response
            .headers()
            .get(LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_google_url() {
        let state = test_state("http://localhost:1");
        let Json(response) = google_url(State(state)).await.unwrap();
        assert!(response
            .auth_url
            .starts_with("http://localhost:1/o/oauth2/v2/auth?"));
        assert!(response.auth_url.contains("access_type=offline"));
    }

    #[tokio::test]
    async fn test_callback_redirects_code_to_frontend() {
        let state = test_state("http://localhost:1");
        let params = CallbackParams {
            code: Some("4/abc def".to_string()),
            ..Default::default()
        };
        let response = callback(State(state), Query(params))
            .await
            .unwrap()
            .into_response();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(response), "https://app.example.com/?code=4%2Fabc%20def");
    }

    #[tokio::test]
    async fn test_callback_forwards_error() {
        let state = test_state("http://localhost:1");
        let params = CallbackParams {
            error: Some("access_denied".to_string()),
            code: Some("ignored".to_string()),
            ..Default::default()
        };
        let response = callback(State(state), Query(params))
            .await
            .unwrap()
            .into_response();
        assert_eq!(location(response), "https://app.example.com/?error=access_denied");
    }

    #[tokio::test]
    async fn test_callback_without_code() {
        let state = test_state("http://localhost:1");
        let result = callback(State(state), Query(CallbackParams::default())).await;
        match result {
            Err(AppError::BadRequest(msg)) => assert_eq!(msg, "Authorization code is required"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_exchange_code() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"ya29.token","token_type":"Bearer","scope":"openid"}"#)
            .create_async()
            .await;

        let state = test_state(&server.url());
        let request = CodeExchangeRequest {
            code: Some("4/code".to_string()),
            error: None,
        };
        let response = exchange_code(State(state), Json(request)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["access_token"], "ya29.token");
        assert_eq!(body["token_type"], "Bearer");
        assert_eq!(body["expires_in"], DEFAULT_EXPIRES_IN_SECS);
        assert!(body.get("refresh_token").is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_exchange_code_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let state = test_state(&server.url());
        let request = CodeExchangeRequest {
            code: Some("stale".to_string()),
            error: None,
        };
        let result = exchange_code(State(state), Json(request)).await;
        assert!(matches!(result, Err(AppError::TokenExchange(_))));
    }

    #[tokio::test]
    async fn test_logout_without_token() {
        let state = test_state("http://localhost:1");
        let Json(response) = logout(State(state), None).await;
        assert_eq!(response.message, "Logged out successfully");
    }

    #[tokio::test]
    async fn test_me() {
        let verified = VerifiedToken {
            token: "ya29.token".to_string(),
            info: TokenInfo {
                email: Some("analyst@example.com".to_string()),
                sub: Some("1234".to_string()),
                scope: Some("openid email".to_string()),
                expires_in: Some(1200),
                ..Default::default()
            },
        };
        let Json(response) = me(verified).await;
        assert_eq!(response.email.as_deref(), Some("analyst@example.com"));
        assert_eq!(response.scopes, vec!["openid", "email"]);
        assert_eq!(response.expires_in, Some(1200));
    }
}
