//! Token suppliers for authenticated gateway calls.
//!
//! The gateway accepts bearer tokens; where they come from is pluggable
//! via [`TokenProvider`]. The bridge never retries token acquisition
//! itself -- a failed supply surfaces as an auth error on the call that
//! needed it.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::RwLock;

/// Supplies a bearer token for an outbound gateway call.
///
/// Invoked lazily, once per call that needs credentials. Implementations
/// are expected to cache internally; callers never cache tokens.
#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    async fn supply(&self) -> Result<String, AuthError>;
}

/// Errors from token acquisition.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The token request itself failed (network, DNS, TLS).
    #[error("Token request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The auth server rejected the credentials.
    #[error("Auth server rejected token request ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// A fixed, never-refreshed token. Useful for tests and for deployments
/// where an external process manages token rotation.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait::async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn supply(&self) -> Result<String, AuthError> {
        Ok(self.token.clone())
    }
}

/// OAuth2 client-credentials token provider with in-memory caching.
///
/// Fetches a token from the configured auth server on first use and
/// reuses it until shortly before expiry.
pub struct OAuthTokenProvider {
    client: reqwest::Client,
    auth_server_url: String,
    client_id: String,
    client_secret: String,
    audience: String,
    cached: RwLock<Option<CachedToken>>,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Refresh this long before the reported expiry, so a token is never
/// used at the edge of its lifetime.
const EXPIRY_LEEWAY: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

impl OAuthTokenProvider {
    pub fn new(
        auth_server_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            auth_server_url: auth_server_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            audience: audience.into(),
            cached: RwLock::new(None),
        }
    }

    async fn fetch_token(&self) -> Result<CachedToken, AuthError> {
        let response = self
            .client
            .post(&self.auth_server_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("audience", self.audience.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response.json().await?;
        tracing::debug!(
            expires_in = token.expires_in,
            "Acquired access token from auth server",
        );

        Ok(CachedToken {
            token: token.access_token,
            expires_at: expiry_deadline(Instant::now(), token.expires_in),
        })
    }
}

#[async_trait::async_trait]
impl TokenProvider for OAuthTokenProvider {
    async fn supply(&self) -> Result<String, AuthError> {
        {
            let cached = self.cached.read().await;
            if let Some(entry) = cached.as_ref() {
                if entry.expires_at > Instant::now() {
                    return Ok(entry.token.clone());
                }
            }
        }

        // Expired or never fetched. Concurrent suppliers may race here;
        // the last writer wins and the extra fetches are harmless.
        let fresh = self.fetch_token().await?;
        let token = fresh.token.clone();
        *self.cached.write().await = Some(fresh);
        Ok(token)
    }
}

/// Compute the instant at which a token with the given lifetime should
/// be considered expired, applying [`EXPIRY_LEEWAY`].
fn expiry_deadline(now: Instant, expires_in_secs: u64) -> Instant {
    let lifetime = Duration::from_secs(expires_in_secs);
    now + lifetime.saturating_sub(EXPIRY_LEEWAY)
}
