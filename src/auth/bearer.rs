//! Copilot bearer token exchange with a single-entry expiry cache

use crate::config::Config;
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tokio::sync::Mutex;

/// Short-lived Copilot API token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken {
    pub value: String,
    /// Unix timestamp (seconds)
    pub expires_at: u64,
}

impl BearerToken {
    pub fn is_expired_at(&self, now: u64) -> bool {
        now >= self.expires_at
    }
}

/// Token exchange response from GitHub
#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
    token: String,
    expires_at: u64,
}

struct CachedBearer {
    key: u64,
    token: BearerToken,
}

/// Exchanges the access token for a bearer token and keeps the result until
/// it expires.
///
/// Holds at most one token, keyed by the identity of the access token that
/// produced it. The lock is held across the exchange so concurrent callers
/// share a single request.
pub struct TokenCache {
    client: reqwest::Client,
    token_url: String,
    entry: Mutex<Option<CachedBearer>>,
    clock: fn() -> u64,
}

impl TokenCache {
    pub fn new(config: &Config, client: reqwest::Client) -> Self {
        Self {
            client,
            token_url: config.endpoints.copilot_token_url.clone(),
            entry: Mutex::new(None),
            clock: unix_now,
        }
    }

    /// Replace the wall clock (seconds since the epoch)
    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    /// Return a valid bearer token for `access_token`, exchanging it on a
    /// miss or once the cached token has expired
    pub async fn get_bearer_token(&self, access_token: &str) -> Result<String> {
        let key = credential_key(access_token);
        let mut entry = self.entry.lock().await;

        if let Some(cached) = entry.as_ref() {
            if cached.key == key && !cached.token.is_expired_at((self.clock)()) {
                return Ok(cached.token.value.clone());
            }
            tracing::debug!("Copilot token expired or credential changed, exchanging again");
        }

        let token = self.exchange(access_token).await?;
        let value = token.value.clone();
        *entry = Some(CachedBearer { key, token });
        Ok(value)
    }

    /// Drop the cached token so the next call exchanges again
    pub async fn refresh(&self) {
        self.entry.lock().await.take();
    }

    /// Expiry of the cached token, if any
    pub async fn cached_expiry(&self) -> Option<u64> {
        self.entry.lock().await.as_ref().map(|c| c.token.expires_at)
    }

    async fn exchange(&self, access_token: &str) -> Result<BearerToken> {
        let response = self
            .client
            .get(&self.token_url)
            .header("Authorization", format!("token {}", access_token))
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| Error::TokenExchange(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            tracing::warn!("Copilot token exchange failed ({}): {}", status, text);
            return Err(Error::token_exchange_status(status, &text));
        }

        let body: TokenExchangeResponse = response
            .json()
            .await
            .map_err(|e| Error::TokenExchange(format!("invalid response: {}", e)))?;

        tracing::debug!(
            "Obtained Copilot token valid until {}",
            chrono::DateTime::from_timestamp(body.expires_at as i64, 0)
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| body.expires_at.to_string())
        );

        Ok(BearerToken {
            value: body.token,
            expires_at: body.expires_at,
        })
    }
}

fn credential_key(access_token: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    access_token.hash(&mut hasher);
    hasher.finish()
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointsConfig;
    use std::sync::atomic::{AtomicU64, Ordering};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    static NOW: AtomicU64 = AtomicU64::new(1_000);

    fn fake_now() -> u64 {
        NOW.load(Ordering::SeqCst)
    }

    fn cache_for(server: &MockServer) -> TokenCache {
        let config = Config {
            endpoints: EndpointsConfig::with_base_url(&server.uri()),
            ..Config::default()
        };
        TokenCache::new(&config, reqwest::Client::new()).with_clock(fake_now)
    }

    #[test]
    fn test_bearer_expiry_boundary() {
        let token = BearerToken {
            value: "tid=1".into(),
            expires_at: 100,
        };
        assert!(!token.is_expired_at(99));
        assert!(token.is_expired_at(100));
        assert!(token.is_expired_at(101));
    }

    #[tokio::test]
    async fn test_exchange_once_within_validity_then_again_after_expiry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/copilot_internal/v2/token"))
            .and(header("Authorization", "token gho_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token": "tid=abc;exp=2000",
                "expires_at": 2_000,
                "refresh_in": 1500
            })))
            .expect(2)
            .mount(&server)
            .await;

        let cache = cache_for(&server);

        NOW.store(1_000, Ordering::SeqCst);
        assert_eq!(cache.get_bearer_token("gho_test").await.unwrap(), "tid=abc;exp=2000");
        assert_eq!(cache.get_bearer_token("gho_test").await.unwrap(), "tid=abc;exp=2000");
        assert_eq!(cache.cached_expiry().await, Some(2_000));

        NOW.store(2_000, Ordering::SeqCst);
        cache.get_bearer_token("gho_test").await.unwrap();

        server.verify().await;
    }

    #[tokio::test]
    async fn test_refresh_forces_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/copilot_internal/v2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token": "tid=1",
                "expires_at": u64::MAX / 2
            })))
            .expect(2)
            .mount(&server)
            .await;

        let cache = cache_for(&server);
        cache.get_bearer_token("gho_test").await.unwrap();
        cache.refresh().await;
        assert!(cache.cached_expiry().await.is_none());
        cache.get_bearer_token("gho_test").await.unwrap();

        server.verify().await;
    }

    #[tokio::test]
    async fn test_new_access_token_replaces_entry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/copilot_internal/v2/token"))
            .and(header("Authorization", "token gho_a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token": "tid=a",
                "expires_at": u64::MAX / 2
            })))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/copilot_internal/v2/token"))
            .and(header("Authorization", "token gho_b"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token": "tid=b",
                "expires_at": u64::MAX / 2
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cache = cache_for(&server);
        assert_eq!(cache.get_bearer_token("gho_a").await.unwrap(), "tid=a");
        assert_eq!(cache.get_bearer_token("gho_b").await.unwrap(), "tid=b");
        assert_eq!(cache.get_bearer_token("gho_b").await.unwrap(), "tid=b");
        // Only one entry is kept, so going back to the first token exchanges again
        assert_eq!(cache.get_bearer_token("gho_a").await.unwrap(), "tid=a");

        server.verify().await;
    }

    #[tokio::test]
    async fn test_connection_failure_is_token_exchange_error() {
        let config = Config {
            endpoints: EndpointsConfig::with_base_url("http://127.0.0.1:9"),
            ..Config::default()
        };
        let cache = TokenCache::new(&config, reqwest::Client::new());

        let err = cache.get_bearer_token("gho_test").await.unwrap_err();
        assert!(matches!(err, Error::TokenExchange(_)));
        assert!(err.degrades_to_no_suggestion());
        assert!(cache.cached_expiry().await.is_none());
    }

    #[tokio::test]
    async fn test_unauthorized_is_token_exchange_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/copilot_internal/v2/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
            .mount(&server)
            .await;

        let cache = cache_for(&server);
        let err = cache.get_bearer_token("gho_bad").await.unwrap_err();
        assert!(matches!(err, Error::TokenExchange(ref msg) if msg.contains("401")));
        assert!(cache.cached_expiry().await.is_none());
    }
}
