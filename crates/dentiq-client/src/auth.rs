//! Credential cache for partner-API authentication
//!
//! The partner API accepts either a static API key or a session token
//! obtained from the identity endpoint with email/password. The static key
//! always wins when configured and never expires; session tokens are cached
//! here and refreshed one hour before the issuer-stated lifetime elapses.

use std::time::{Duration, Instant};

use reqwest::header::HeaderValue;
use tokio::sync::RwLock;
use url::Url;

use crate::config::ConnectionConfig;
use crate::error::{DentiqError, Result};
use crate::types::{AuthTokenRequest, AuthTokenResponse};

/// A cached session token with its computed expiry
#[derive(Debug, Clone)]
struct Credential {
    token: String,
    expires_at: Instant,
}

impl Credential {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Thread-safe cache around the bearer credential
///
/// One instance per client; never a global. Reads take a shared lock,
/// refresh takes the exclusive lock and re-checks validity first so that
/// concurrent callers racing past an expired token trigger a single
/// authentication call.
pub struct CredentialCache {
    connection: ConnectionConfig,
    base_url: Url,
    validity: Duration,
    http: reqwest::Client,
    cached: RwLock<Option<Credential>>,
}

impl std::fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCache")
            .field("base_url", &self.base_url.as_str())
            .field("has_api_key", &self.connection.api_key.is_some())
            .finish()
    }
}

impl CredentialCache {
    /// Create a cache over the given connection settings
    ///
    /// `validity` is the issuer token lifetime minus the safety margin
    /// (see [`crate::DentiqConfig::token_validity`]); `http` is the
    /// ordinary (30s-timeout) client used for the authentication call.
    pub fn new(
        connection: ConnectionConfig,
        base_url: Url,
        validity: Duration,
        http: reqwest::Client,
    ) -> Self {
        Self {
            connection,
            base_url,
            validity,
            http,
            cached: RwLock::new(None),
        }
    }

    /// Produce the `Authorization` header value for the next request
    ///
    /// Fails with [`DentiqError::NoCredentials`] when neither an API key
    /// nor an email/password pair is configured.
    pub async fn auth_header(&self) -> Result<HeaderValue> {
        // Static key bypasses the cache entirely
        if let Some(key) = &self.connection.api_key {
            return bearer(key);
        }

        {
            let cached = self.cached.read().await;
            if let Some(cred) = cached.as_ref().filter(|c| c.is_valid()) {
                return bearer(&cred.token);
            }
        }

        let (email, password) = match (&self.connection.email, &self.connection.password) {
            (Some(e), Some(p)) => (e.clone(), p.clone()),
            _ => return Err(DentiqError::NoCredentials),
        };

        let mut cached = self.cached.write().await;

        // Another caller may have refreshed while we waited for the lock
        if let Some(cred) = cached.as_ref().filter(|c| c.is_valid()) {
            return bearer(&cred.token);
        }

        tracing::info!(email = %email, "Authenticating with partner identity endpoint");

        let token = self.authenticate(email, password).await?;
        let value = bearer(&token)?;
        *cached = Some(Credential {
            token,
            expires_at: Instant::now() + self.validity,
        });

        Ok(value)
    }

    /// Drop any cached token, forcing the next call to re-authenticate
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }

    async fn authenticate(&self, email: String, password: String) -> Result<String> {
        let url = self.base_url.join("v2/auth/token")?;
        let body = AuthTokenRequest {
            client_host_id: self.connection.client_host_id.clone(),
            email,
            password,
        };

        let response = self.http.post(url).json(&body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DentiqError::AuthRejected {
                status: status.as_u16(),
                body,
            });
        }

        let decoded: AuthTokenResponse = response
            .json()
            .await
            .map_err(|e| DentiqError::decode("auth/token", e.to_string()))?;

        tracing::info!("Partner authentication successful");
        Ok(decoded.token)
    }
}

fn bearer(token: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|_| DentiqError::Config("credential contains invalid header bytes".into()))?;
    value.set_sensitive(true);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(api_key: Option<&str>) -> ConnectionConfig {
        ConnectionConfig {
            base_url: "http://localhost:9080".to_string(),
            api_key: api_key.map(String::from),
            email: None,
            password: None,
            client_host_id: "test".to_string(),
        }
    }

    fn cache(conn: ConnectionConfig) -> CredentialCache {
        CredentialCache::new(
            conn,
            Url::parse("http://localhost:9080").unwrap(),
            Duration::from_secs(3600),
            reqwest::Client::new(),
        )
    }

    #[tokio::test]
    async fn test_static_key_bypasses_cache() {
        let cache = cache(connection(Some("key-123")));
        let header = cache.auth_header().await.unwrap();
        assert_eq!(header.to_str().unwrap(), "Bearer key-123");
    }

    #[tokio::test]
    async fn test_no_credentials_rejected() {
        let cache = cache(connection(None));
        let err = cache.auth_header().await.unwrap_err();
        assert!(matches!(err, DentiqError::NoCredentials));
    }

    #[test]
    fn test_credential_expiry() {
        let valid = Credential {
            token: "t".to_string(),
            expires_at: Instant::now() + Duration::from_secs(60),
        };
        assert!(valid.is_valid());

        let expired = Credential {
            token: "t".to_string(),
            expires_at: Instant::now() - Duration::from_secs(1),
        };
        assert!(!expired.is_valid());
    }
}
