//! API utility functions
//!
//! Helpers shared by handlers: input validation, frontend redirects and
//! newline-delimited JSON streaming responses.

use crate::error::AppError;
use axum::{
    body::Body,
    http::{header, StatusCode},
    response::Response,
};
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;

/// Maximum chat message length in characters
pub const MAX_MESSAGE_LENGTH: usize = 10_000;

/// Generic message response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    /// Human-readable message
    pub message: String,
}

impl MessageResponse {
    /// Wrap a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Validate a chat message
///
/// # Returns
/// * `Ok(())` - Message is valid
/// * `Err(AppError)` - Message is empty or too long
pub fn validate_message(text: &str) -> Result<(), AppError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("Message text cannot be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(AppError::BadRequest(format!(
            "Message exceeds maximum length of {} characters",
            MAX_MESSAGE_LENGTH
        )));
    }
    Ok(())
}

/// Return the value if it is present and not blank
pub fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// URL on the frontend carrying a single query parameter
pub fn frontend_redirect_url(frontend_url: &str, key: &str, value: &str) -> String {
    format!(
        "{}/?{}={}",
        frontend_url.trim_end_matches('/'),
        key,
        urlencoding::encode(value)
    )
}

/// Build a streaming response writing one JSON value per line
///
/// The content type stays `text/event-stream` so proxies do not buffer the
/// body; clients read it line by line.
pub fn ndjson_response<S>(values: S) -> Result<Response, AppError>
where
    S: Stream<Item = Value> + Send + 'static,
{
    let body = values.map(|value| Ok::<_, std::io::Error>(format!("{}\n", value)));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(body))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build stream response: {}", e)))
}
