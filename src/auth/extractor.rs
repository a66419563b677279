//! Request extractors for Bearer authentication

use crate::auth::token::TokenInfo;
use crate::error::AppError;
use crate::state::SharedState;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

/// Raw Bearer token from the `Authorization` header
///
/// The token is not verified here; Google rejects bad tokens on the
/// proxied call.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

impl BearerToken {
    /// Parse an `Authorization` header value
    pub fn parse(header: &str) -> Option<Self> {
        let (scheme, token) = header.trim().split_once(' ')?;
        let token = token.trim();
        if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
            Some(Self(token.to_string()))
        } else {
            None
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(BearerToken::parse)
            .ok_or(AppError::MissingToken)
    }
}

/// Bearer token verified with Google, with its tokeninfo
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    /// The access token
    pub token: String,
    /// What Google reported about it
    pub info: TokenInfo,
}

#[async_trait]
impl FromRequestParts<SharedState> for VerifiedToken {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;
        let info = state.verifier.verify(&token).await?;
        tracing::debug!(sub = ?info.sub, "Verified bearer token");
        Ok(Self { token, info })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn test_parse_header() {
        assert_eq!(BearerToken::parse("Bearer abc").unwrap().0, "abc");
        assert_eq!(BearerToken::parse("bearer   abc ").unwrap().0, "abc");
        assert!(BearerToken::parse("Basic abc").is_none());
        assert!(BearerToken::parse("Bearer ").is_none());
        assert!(BearerToken::parse("abc").is_none());
    }

    #[tokio::test]
    async fn test_missing_header_is_rejected() {
        let (mut parts, _) = Request::builder().uri("/").body(()).unwrap().into_parts();
        let result = BearerToken::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::MissingToken)));
    }
}
