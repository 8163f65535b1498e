//! JWKS (JSON Web Key Set) fetching and caching
//!
//! Keys are cached for a TTL (default 10 minutes). A `kid` missing from the
//! cache triggers one refresh, and refreshes are rate limited so a stream of
//! tokens with unknown key IDs cannot hammer the key server.
//!
//! Every failure to obtain a usable key set is a
//! [`VerifyError::KeyServerUnavailable`]. Only a `kid` that is absent from a
//! successfully fetched set is the token's fault.

use jsonwebtoken::jwk::{Jwk, JwkSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::VerifierConfig;
use crate::error::{AuthError, AuthResult, VerifyError};

/// JWKS cache entry with metadata
#[derive(Debug, Clone)]
struct CachedJwks {
    jwks: JwkSet,
    fetched_at: Instant,
}

impl CachedJwks {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// JWKS client for fetching and caching JSON Web Key Sets
///
/// # Example
///
/// ```rust,no_run
/// # use prometheus_auth::jwt::JwksClient;
/// # tokio_test::block_on(async {
/// let client = JwksClient::new(
///     reqwest::Client::new(),
///     "https://auth.example.com/.well-known/jwks.json",
/// )?;
///
/// let key = client.signing_key("key-id-123").await?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct JwksClient {
    /// JWKS endpoint URL
    jwks_uri: Url,
    /// Cached JWKS
    cache: Arc<RwLock<Option<CachedJwks>>>,
    /// HTTP client
    http_client: reqwest::Client,
    /// Cache TTL (default: 10 minutes)
    cache_ttl: Duration,
    /// Minimum interval between fetches
    min_refresh_interval: Duration,
}

impl JwksClient {
    /// Create a client with the default cache settings.
    ///
    /// Plain `http` is accepted only for loopback hosts.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidUrl`] if `jwks_uri` does not parse
    /// - [`AuthError::Configuration`] if it is not https (or loopback http)
    pub fn new(http_client: reqwest::Client, jwks_uri: &str) -> AuthResult<Self> {
        let jwks_uri = Url::parse(jwks_uri).map_err(|e| AuthError::invalid_url(jwks_uri, e))?;
        ensure_secure_transport(&jwks_uri)?;

        Ok(Self {
            jwks_uri,
            cache: Arc::new(RwLock::new(None)),
            http_client,
            cache_ttl: Duration::from_secs(600),
            min_refresh_interval: Duration::from_secs(5),
        })
    }

    /// Create a client from verifier configuration
    ///
    /// # Errors
    ///
    /// Same as [`JwksClient::new`], plus [`AuthError::Transport`] if the HTTP
    /// client cannot be built.
    pub fn from_config(config: &VerifierConfig) -> AuthResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self::new(http_client, &config.resolved_jwks_uri())?
            .with_cache_ttl(config.jwks_cache_ttl)
            .with_min_refresh_interval(config.jwks_min_refresh_interval))
    }

    /// Set the cache time-to-live
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set the minimum interval between fetches
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// JWKS endpoint
    pub fn jwks_uri(&self) -> &Url {
        &self.jwks_uri
    }

    /// Get JWKS from cache, fetching if the cache is empty or stale
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::KeyServerUnavailable`] if the endpoint is
    /// unreachable, returns a non-2xx status, or serves something other than a
    /// JWK Set.
    pub async fn get_jwks(&self) -> Result<JwkSet, VerifyError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref()
                && cached.is_fresh(self.cache_ttl)
            {
                debug!(jwks_uri = %self.jwks_uri, "Using cached JWKS");
                return Ok(cached.jwks.clone());
            }
        }

        self.fetch_and_cache().await
    }

    /// Force a fetch, unless the last one was within the minimum interval
    ///
    /// # Errors
    ///
    /// Same as [`JwksClient::get_jwks`].
    pub async fn refresh(&self) -> Result<JwkSet, VerifyError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref()
                && cached.fetched_at.elapsed() < self.min_refresh_interval
            {
                warn!(
                    jwks_uri = %self.jwks_uri,
                    since_last_ms = cached.fetched_at.elapsed().as_millis(),
                    "JWKS refresh rate limited, using cache"
                );
                return Ok(cached.jwks.clone());
            }
        }

        self.fetch_and_cache().await
    }

    /// The JWK with `kid`, refreshing once if the cache does not know it
    ///
    /// # Errors
    ///
    /// - [`VerifyError::KeyServerUnavailable`] if no key set can be obtained
    /// - [`VerifyError::InvalidToken`] if the fetched set has no such key
    pub async fn signing_key(&self, kid: &str) -> Result<Jwk, VerifyError> {
        if let Some(jwk) = self.get_jwks().await?.find(kid) {
            return Ok(jwk.clone());
        }

        debug!(jwks_uri = %self.jwks_uri, kid, "Key ID not cached, refreshing JWKS");
        self.refresh().await?.find(kid).cloned().ok_or_else(|| {
            warn!(jwks_uri = %self.jwks_uri, kid, "Key ID not found in JWKS");
            VerifyError::InvalidToken(format!("unknown signing key \"{kid}\""))
        })
    }

    async fn fetch_and_cache(&self) -> Result<JwkSet, VerifyError> {
        info!(jwks_uri = %self.jwks_uri, "Fetching JWKS from endpoint");

        let response = self
            .http_client
            .get(self.jwks_uri.clone())
            .send()
            .await
            .map_err(|e| {
                error!(jwks_uri = %self.jwks_uri, error = %e, "Failed to fetch JWKS");
                VerifyError::KeyServerUnavailable(format!("JWKS fetch failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            error!(jwks_uri = %self.jwks_uri, status = %status, "JWKS endpoint returned error status");
            return Err(VerifyError::KeyServerUnavailable(format!(
                "JWKS endpoint returned status {status}"
            )));
        }

        let jwks: JwkSet = response.json().await.map_err(|e| {
            error!(jwks_uri = %self.jwks_uri, error = %e, "Failed to parse JWKS JSON");
            VerifyError::KeyServerUnavailable(format!("Invalid JWKS format: {e}"))
        })?;

        info!(
            jwks_uri = %self.jwks_uri,
            key_count = jwks.keys.len(),
            "Fetched JWKS"
        );

        *self.cache.write().await = Some(CachedJwks {
            jwks: jwks.clone(),
            fetched_at: Instant::now(),
        });

        Ok(jwks)
    }
}

fn ensure_secure_transport(url: &Url) -> AuthResult<()> {
    match (url.scheme(), url.host_str()) {
        ("https", _) => Ok(()),
        ("http", Some("localhost" | "127.0.0.1" | "[::1]")) => Ok(()),
        _ => Err(AuthError::Configuration(format!(
            "JWKS endpoint must use HTTPS (HTTP only allowed for localhost): {url}"
        ))),
    }
}
