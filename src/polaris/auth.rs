//! Polaris Authentication
//!
//! Handles password sessions, service-account client tokens and pre-issued
//! access tokens, with a shared token cache.

use super::http::PolarisHttpClient;
use super::service_account::ServiceAccount;
use crate::config::AuthMethod;
use crate::error::{PolarisError, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Token expiry buffer - refresh tokens this much before they actually expire
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Polaris does not report token lifetimes, assume a conservative 30 minutes
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Base URL of a Polaris account, e.g. `https://my-account.my.rubrik.com/api`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(String);

impl BaseUrl {
    pub fn new(url: &str) -> Self {
        Self(url.trim_end_matches('/').to_string())
    }

    pub fn from_domain(domain: &str, root_domain: &str) -> Self {
        Self(format!("https://{}.{}/api", domain, root_domain))
    }

    pub fn from_access_token_uri(uri: &str) -> Self {
        Self::new(&uri.replace("/client_token", ""))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn access_token_uri(&self) -> String {
        format!("{}/client_token", self.0)
    }

    pub fn session_url(&self) -> String {
        format!("{}/session", self.0)
    }

    pub fn graphql_url(&self) -> String {
        format!("{}/graphql", self.0)
    }
}

impl std::fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Polaris credentials holder with token caching
#[derive(Clone)]
pub struct PolarisCredentials {
    base_url: BaseUrl,
    method: AuthMethod,
    http: PolarisHttpClient,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

impl PolarisCredentials {
    pub fn new(base_url: BaseUrl, method: AuthMethod, http: PolarisHttpClient) -> Self {
        Self {
            base_url,
            method,
            http,
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    pub fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    /// The service account behind these credentials, if any
    pub fn service_account(&self) -> Option<&ServiceAccount> {
        match &self.method {
            AuthMethod::ServiceAccount(sa) => Some(sa),
            _ => None,
        }
    }

    /// Get an access token for API calls
    pub async fn get_token(&self) -> Result<String> {
        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let token = match &self.method {
            AuthMethod::Password { username, password } => {
                password_session(&self.http, &self.base_url, username, password).await?
            }
            AuthMethod::ServiceAccount(sa) => sa.get_token(&self.http).await?,
            AuthMethod::Token(token) => token.clone(),
        };

        let expires_at = Instant::now() + DEFAULT_TOKEN_TTL - TOKEN_EXPIRY_BUFFER;
        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(CachedToken {
                token: token.clone(),
                expires_at,
            });
        }

        tracing::debug!(
            "New token cached, expires in ~{} minutes",
            (DEFAULT_TOKEN_TTL - TOKEN_EXPIRY_BUFFER).as_secs() / 60
        );

        Ok(token)
    }

    /// Force refresh the token
    pub async fn refresh_token(&self) -> Result<String> {
        {
            let mut cache = self.token_cache.write().await;
            *cache = None;
        }

        self.get_token().await
    }
}

/// Open a password session and return its access token
pub async fn password_session(
    http: &PolarisHttpClient,
    base_url: &BaseUrl,
    username: &str,
    password: &str,
) -> Result<String> {
    let body = json!({ "username": username, "password": password });
    let session = http.post_json(&base_url.session_url(), None, &body, None).await?;

    session
        .get("access_token")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| PolarisError::Authentication("Authentication failed!".to_string()))
}
