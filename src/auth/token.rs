//! Access token verification
//!
//! Bearer tokens are checked against Google's tokeninfo endpoint and must
//! have been issued to this application's OAuth client. Successful
//! verifications are cached for a short time so a chat session does not
//! hit tokeninfo on every request.

use crate::config::OAuthConfig;
use crate::error::AppError;
use lru::LruCache;
use serde::{Deserialize, Deserializer, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Upper bound on cached tokens; least recently used entries are evicted
pub const MAX_CACHED_TOKENS: usize = 10_000;

/// Fields of a tokeninfo response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// Client the token was issued to
    #[serde(default)]
    pub aud: Option<String>,
    /// Authorized party
    #[serde(default)]
    pub azp: Option<String>,
    /// Google account id
    #[serde(default)]
    pub sub: Option<String>,
    /// Account email, when the email scope was granted
    #[serde(default)]
    pub email: Option<String>,
    /// Space-separated granted scopes
    #[serde(default)]
    pub scope: Option<String>,
    /// Remaining lifetime in seconds
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub expires_in: Option<u64>,
}

impl TokenInfo {
    /// Granted scopes as a list
    pub fn scopes(&self) -> Vec<String> {
        self.scope
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

/// tokeninfo returns numbers as strings ("3599"); accept both
fn de_opt_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        String(String),
    }

    Ok(match Option::<NumberOrString>::deserialize(deserializer)? {
        Some(NumberOrString::Number(n)) => Some(n),
        Some(NumberOrString::String(s)) => s.parse().ok(),
        None => None,
    })
}

/// Verify a token with Google and check its audience
///
/// # Errors
/// * `AppError::Transport` - tokeninfo could not be reached
/// * `AppError::InvalidToken` - token rejected or issued for another client
pub async fn verify_access_token(
    http: &reqwest::Client,
    tokeninfo_url: &str,
    client_id: &str,
    token: &str,
) -> Result<TokenInfo, AppError> {
    let response = http
        .get(tokeninfo_url)
        .query(&[("access_token", token)])
        .send()
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "tokeninfo request failed");
            AppError::Transport("Failed to verify token with Google".to_string())
        })?;

    if response.status() != reqwest::StatusCode::OK {
        tracing::debug!(status_code = response.status().as_u16(), "Token rejected by tokeninfo");
        return Err(AppError::InvalidToken("Invalid or expired token".to_string()));
    }

    let info: TokenInfo = response
        .json()
        .await
        .map_err(|_| AppError::Transport("Failed to verify token with Google".to_string()))?;

    if info.aud.as_deref() != Some(client_id) {
        tracing::warn!(aud = ?info.aud, "Token audience mismatch");
        return Err(AppError::InvalidToken(
            "Token was not issued for this application".to_string(),
        ));
    }

    Ok(info)
}

/// Short-lived LRU cache of verified tokens
#[derive(Debug, Clone)]
pub struct TokenCache {
    ttl: Duration,
    entries: Arc<RwLock<LruCache<String, (TokenInfo, Instant)>>>,
}

impl TokenCache {
    /// Create a cache holding up to `MAX_CACHED_TOKENS`; a zero TTL disables it
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, MAX_CACHED_TOKENS)
    }

    /// Create a cache holding up to `max_entries` tokens
    pub fn with_capacity(ttl: Duration, max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            ttl,
            entries: Arc::new(RwLock::new(LruCache::new(capacity))),
        }
    }

    /// Cached info for a token that has not expired yet
    pub async fn get(&self, token: &str) -> Option<TokenInfo> {
        let mut entries = self.entries.write().await;
        let (info, expires_at) = entries.get(token)?;
        if *expires_at > Instant::now() {
            return Some(info.clone());
        }
        entries.pop(token);
        None
    }

    /// Cache a verified token until `min(ttl, expires_in)`
    pub async fn insert(&self, token: &str, info: &TokenInfo) {
        if self.ttl.is_zero() {
            return;
        }
        let lifetime = info
            .expires_in
            .map(Duration::from_secs)
            .map_or(self.ttl, |remaining| remaining.min(self.ttl));
        if lifetime.is_zero() {
            return;
        }

        let mut entries = self.entries.write().await;
        entries.put(token.to_string(), (info.clone(), Instant::now() + lifetime));
    }

    /// Number of cached entries, expired ones included
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// Verifies Bearer tokens, consulting the cache first
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    http: reqwest::Client,
    tokeninfo_url: String,
    client_id: String,
    cache: TokenCache,
}

impl TokenVerifier {
    /// Create a verifier using the shared HTTP client
    pub fn new(http: reqwest::Client, config: &OAuthConfig) -> Self {
        Self {
            http,
            tokeninfo_url: config.tokeninfo_url.clone(),
            client_id: config.client_id.clone(),
            cache: TokenCache::new(Duration::from_secs(config.token_cache_ttl_secs)),
        }
    }

    /// Verify a token, returning its tokeninfo
    pub async fn verify(&self, token: &str) -> Result<TokenInfo, AppError> {
        if let Some(info) = self.cache.get(token).await {
            return Ok(info);
        }
        let info =
            verify_access_token(&self.http, &self.tokeninfo_url, &self.client_id, token).await?;
        self.cache.insert(token, &info).await;
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[test]
    fn test_token_info_accepts_string_numbers() {
        let info: TokenInfo = serde_json::from_str(
            r#"{"aud": "c", "scope": "openid email", "expires_in": "3599", "exp": "1700000000"}"#,
        )
        .unwrap();
        assert_eq!(info.expires_in, Some(3599));
        assert_eq!(info.scopes(), vec!["openid", "email"]);

        let info: TokenInfo = serde_json::from_str(r#"{"expires_in": 12}"#).unwrap();
        assert_eq!(info.expires_in, Some(12));
    }

    #[tokio::test]
    async fn test_verify_access_token() {
        let mut server = Server::new_async().await;
        let _good = server
            .mock("GET", "/tokeninfo")
            .match_query(Matcher::UrlEncoded("access_token".into(), "good".into()))
            .with_status(200)
            .with_body(r#"{"aud": "client-id", "email": "a@example.com", "expires_in": "100"}"#)
            .create_async()
            .await;
        let _foreign = server
            .mock("GET", "/tokeninfo")
            .match_query(Matcher::UrlEncoded("access_token".into(), "foreign".into()))
            .with_status(200)
            .with_body(r#"{"aud": "someone-else"}"#)
            .create_async()
            .await;
        let _expired = server
            .mock("GET", "/tokeninfo")
            .match_query(Matcher::UrlEncoded("access_token".into(), "expired".into()))
            .with_status(400)
            .with_body(r#"{"error_description": "Invalid Value"}"#)
            .create_async()
            .await;

        let http = reqwest::Client::new();
        let url = format!("{}/tokeninfo", server.url());

        let info = verify_access_token(&http, &url, "client-id", "good").await.unwrap();
        assert_eq!(info.email.as_deref(), Some("a@example.com"));

        let err = verify_access_token(&http, &url, "client-id", "foreign")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Token was not issued for this application");

        let err = verify_access_token(&http, &url, "client-id", "expired")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid or expired token");
    }

    #[tokio::test]
    async fn test_verify_unreachable_tokeninfo() {
        let http = reqwest::Client::new();
        // Port 9 (discard) is not listening locally
        let err = verify_access_token(&http, "http://127.0.0.1:9/tokeninfo", "c", "t")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Transport(_)));
    }

    #[tokio::test]
    async fn test_cache_respects_ttl_and_expiry() {
        let cache = TokenCache::new(Duration::from_secs(60));
        let info = TokenInfo {
            aud: Some("c".to_string()),
            expires_in: Some(30),
            ..Default::default()
        };
        cache.insert("t1", &info).await;
        assert_eq!(cache.get("t1").await, Some(info.clone()));
        assert_eq!(cache.get("t2").await, None);

        let expired = TokenInfo {
            expires_in: Some(0),
            ..info.clone()
        };
        cache.insert("t3", &expired).await;
        assert_eq!(cache.get("t3").await, None);

        let disabled = TokenCache::new(Duration::ZERO);
        disabled.insert("t1", &info).await;
        assert_eq!(disabled.len().await, 0);
    }

    #[tokio::test]
    async fn test_cache_evicts_least_recently_used_at_capacity() {
        let cache = TokenCache::with_capacity(Duration::from_secs(60), 2);
        let info = TokenInfo {
            aud: Some("c".to_string()),
            ..Default::default()
        };
        cache.insert("t1", &info).await;
        cache.insert("t2", &info).await;
        // Touch t1 so t2 becomes the eviction candidate
        assert!(cache.get("t1").await.is_some());

        cache.insert("t3", &info).await;
        assert_eq!(cache.len().await, 2);
        assert!(cache.get("t1").await.is_some());
        assert!(cache.get("t2").await.is_none());
        assert!(cache.get("t3").await.is_some());
    }

    #[tokio::test]
    async fn test_full_cache_keeps_existing_entries() {
        let cache = TokenCache::new(Duration::from_secs(60));
        let info = TokenInfo::default();
        for i in 0..=MAX_CACHED_TOKENS {
            cache.insert(&format!("t{}", i), &info).await;
        }
        assert_eq!(cache.len().await, MAX_CACHED_TOKENS);
        assert!(cache.get(&format!("t{}", MAX_CACHED_TOKENS)).await.is_some());
        assert!(cache.get("t1").await.is_some());
        assert!(cache.get("t0").await.is_none());
    }

    #[tokio::test]
    async fn test_verifier_uses_cache() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/tokeninfo")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"aud": "client-id", "expires_in": "3599"}"#)
            .expect(1)
            .create_async()
            .await;

        let config = OAuthConfig {
            client_id: "client-id".to_string(),
            client_secret: "s".to_string(),
            redirect_uri: "r".to_string(),
            auth_url: "a".to_string(),
            token_url: "t".to_string(),
            tokeninfo_url: format!("{}/tokeninfo", server.url()),
            revoke_url: "v".to_string(),
            token_cache_ttl_secs: 300,
        };
        let verifier = TokenVerifier::new(reqwest::Client::new(), &config);
        verifier.verify("tok").await.unwrap();
        verifier.verify("tok").await.unwrap();

        mock.assert_async().await;
    }
}
