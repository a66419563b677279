//! Error types and error handling for the application
//!
//! This module defines custom error types that can be converted to HTTP responses.
//! All errors implement `IntoResponse` to provide consistent error formatting:
//! `{"detail": <message>, "status": <code>}`.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error types
///
/// Each variant implements automatic conversion to HTTP responses via `IntoResponse`.
#[derive(Error, Debug)]
pub enum AppError {
    /// No usable Bearer token in the Authorization header
    #[error("Not authenticated")]
    MissingToken,

    /// Bearer token was rejected by Google or issued for another client
    #[error("{0}")]
    InvalidToken(String),

    /// Authorization code could not be exchanged for a token
    #[error("{0}")]
    TokenExchange(String),

    /// Request payload or parameters are invalid
    #[error("{0}")]
    BadRequest(String),

    /// Requested resource does not exist
    #[error("{0}")]
    NotFound(String),

    /// Google API answered with an error status
    #[error("{message}")]
    Upstream {
        /// HTTP status returned by the upstream API
        status: u16,
        /// Error message extracted from the upstream body
        message: String,
    },

    /// Outbound request failed before a response was received
    #[error("{0}")]
    Transport(String),

    /// Long-running operation did not finish in time
    #[error("Operation did not complete in time: {0}")]
    OperationTimeout(String),

    /// Internal server error (catch-all for unexpected errors)
    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Status code returned by the upstream API, if this error came from one
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            AppError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Prefix the message with context, keeping the variant
    ///
    /// Only upstream and transport failures are rewritten; client errors
    /// keep their message untouched.
    pub fn context(self, prefix: &str) -> Self {
        match self {
            AppError::Upstream { status, message } => AppError::Upstream {
                status,
                message: format!("{}: {}", prefix, message),
            },
            AppError::Transport(message) => AppError::Transport(format!("{}: {}", prefix, message)),
            other => other,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingToken => StatusCode::UNAUTHORIZED,
            AppError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AppError::TokenExchange(_) => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Upstream { status, .. } if *status >= 500 => StatusCode::BAD_GATEWAY,
            AppError::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::OperationTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Transport(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        }

        let body = Json(json!({
            "detail": self.to_string(),
            "status": status.as_u16(),
        }));

        match self {
            AppError::MissingToken => {
                (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
            }
            _ => (status, body).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::MissingToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Upstream {
                status: 403,
                message: "denied".into()
            }
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Upstream {
                status: 503,
                message: "unavailable".into()
            }
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::OperationTimeout("op".into()).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn test_context_only_rewrites_upstream_failures() {
        let err = AppError::Upstream {
            status: 404,
            message: "not found".into(),
        }
        .context("API error fetching agents");
        assert_eq!(err.to_string(), "API error fetching agents: not found");
        assert_eq!(err.upstream_status(), Some(404));

        let err = AppError::BadRequest("bad".into()).context("ignored");
        assert_eq!(err.to_string(), "bad");
    }

    #[test]
    fn test_missing_token_sets_www_authenticate() {
        let response = AppError::MissingToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }
}
