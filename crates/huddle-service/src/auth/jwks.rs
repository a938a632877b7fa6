//! Identity provider key set client.
//!
//! Fetches `/.well-known/jwks.json` and caches the keys by `kid`. The cache
//! is refreshed when it expires, and early when a token names a key the
//! cache has not seen (provider key rotation). Early refreshes are rate
//! limited so unknown `kid` values cannot be used to hammer the provider.

use crate::errors::HuddleError;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::instrument;

/// Default cache TTL (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Minimum age of the cache before an unknown `kid` forces a refetch.
pub const MIN_ROTATION_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// One key of the provider's key set.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type ("OKP" for Ed25519).
    pub kty: String,

    pub kid: String,

    #[serde(default)]
    pub crv: Option<String>,

    /// Public key (base64url).
    #[serde(default)]
    pub x: Option<String>,

    #[serde(default)]
    pub alg: Option<String>,

    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    pub keys: Vec<Jwk>,
}

struct CachedKeys {
    keys: HashMap<String, Jwk>,
    fetched_at: Instant,
}

/// Caching key set client. Safe to share across tasks.
pub struct JwksClient {
    jwks_url: String,
    http_client: reqwest::Client,
    cache: RwLock<Option<CachedKeys>>,
    cache_ttl: Duration,
}

impl JwksClient {
    pub fn new(jwks_url: String) -> Self {
        Self::with_ttl(jwks_url, DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl(jwks_url: String, cache_ttl: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "huddle.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
            cache: RwLock::new(None),
            cache_ttl,
        }
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Look up a key by id, fetching the key set when needed.
    ///
    /// # Errors
    ///
    /// - `ServiceUnavailable` - key set could not be fetched
    /// - `InvalidToken` - no key with this id
    #[instrument(skip(self), name = "huddle.auth.jwks.get_key", fields(kid = %kid))]
    pub async fn get_key(&self, kid: &str) -> Result<Jwk, HuddleError> {
        let must_refresh = {
            let cache = self.cache.read().await;
            match cache.as_ref() {
                Some(cached) => {
                    let age = cached.fetched_at.elapsed();
                    if age < self.cache_ttl {
                        if let Some(key) = cached.keys.get(kid) {
                            tracing::debug!(target: "huddle.auth.jwks", "JWKS cache hit");
                            return Ok(key.clone());
                        }
                        age >= MIN_ROTATION_REFRESH_INTERVAL
                    } else {
                        true
                    }
                }
                None => true,
            }
        };

        if must_refresh {
            self.refresh().await?;
        }

        let cache = self.cache.read().await;
        if let Some(key) = cache.as_ref().and_then(|c| c.keys.get(kid)) {
            return Ok(key.clone());
        }

        tracing::warn!(target: "huddle.auth.jwks", kid = %kid, "Key not found in JWKS");
        Err(HuddleError::InvalidToken(
            "The access token is invalid or expired".to_string(),
        ))
    }

    /// Fetch the key set and replace the cache.
    ///
    /// # Errors
    ///
    /// `ServiceUnavailable` when the provider is unreachable, answers with a
    /// non-success status, or returns an unparseable body.
    #[instrument(skip(self), name = "huddle.auth.jwks.refresh")]
    pub async fn refresh(&self) -> Result<(), HuddleError> {
        tracing::debug!(target: "huddle.auth.jwks", url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "huddle.auth.jwks", error = %e, "Failed to fetch JWKS");
                unavailable()
            })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "huddle.auth.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            return Err(unavailable());
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            tracing::error!(target: "huddle.auth.jwks", error = %e, "Failed to parse JWKS response");
            unavailable()
        })?;

        let keys: HashMap<String, Jwk> = jwks
            .keys
            .into_iter()
            .map(|key| (key.kid.clone(), key))
            .collect();

        tracing::info!(
            target: "huddle.auth.jwks",
            key_count = keys.len(),
            "JWKS cache refreshed"
        );

        *self.cache.write().await = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });

        Ok(())
    }

    /// True once a key set has been fetched successfully.
    pub async fn is_warm(&self) -> bool {
        self.cache.read().await.is_some()
    }
}

fn unavailable() -> HuddleError {
    HuddleError::ServiceUnavailable("Identity provider unavailable".to_string())
}
