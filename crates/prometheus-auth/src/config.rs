//! Configuration Types
//!
//! Configuration for the OAuth client engine ([`ClientConfig`]) and the
//! resource-server side bearer verifier ([`VerifierConfig`]).

use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{AuthError, AuthResult};

/// Header carrying the protocol version on discovery requests
pub const PROTOCOL_VERSION_HEADER: &str = "MCP-Protocol-Version";

/// What to do when protected resource metadata cannot be discovered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceDiscoveryPolicy {
    /// Log a warning and treat the resource server as its own authorization server
    #[default]
    Lenient,
    /// Surface the discovery failure to the caller
    Strict,
}

/// OAuth client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Timeout applied to every outbound request (default: 30 seconds)
    pub request_timeout: Duration,

    /// User agent for HTTP requests
    pub user_agent: String,

    /// Protocol version sent in the `MCP-Protocol-Version` header during discovery
    pub protocol_version: Option<String>,

    /// Handling of protected resource metadata discovery failures
    pub resource_discovery: ResourceDiscoveryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            user_agent: default_user_agent(),
            protocol_version: None,
            resource_discovery: ResourceDiscoveryPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Set the per-request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Send a protocol version header on discovery requests
    pub fn with_protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = Some(version.into());
        self
    }

    /// Choose how resource metadata discovery failures are handled
    pub fn with_resource_discovery(mut self, policy: ResourceDiscoveryPolicy) -> Self {
        self.resource_discovery = policy;
        self
    }

    /// Build the HTTP client used for discovery, registration and token requests.
    ///
    /// Redirects are never followed.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Transport`] if the TLS backend cannot be initialized.
    pub fn build_http_client(&self) -> AuthResult<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .user_agent(&self.user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(AuthError::from)
    }
}

/// Bearer verifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Expected `iss` claim
    pub issuer_url: String,

    /// Expected `aud` claim, also reported as the context resource
    pub audience_url: String,

    /// JWKS endpoint override (default: `<issuer>/.well-known/jwks.json`)
    #[serde(default)]
    pub jwks_uri: Option<String>,

    /// Accepted signing algorithms (default: ES256)
    #[serde(default = "default_algorithms")]
    pub algorithms: Vec<Algorithm>,

    /// Clock skew tolerance (default: 60 seconds)
    #[serde(default = "default_leeway")]
    pub leeway: Duration,

    /// JWKS cache lifetime (default: 10 minutes)
    #[serde(default = "default_jwks_cache_ttl")]
    pub jwks_cache_ttl: Duration,

    /// Minimum interval between JWKS fetches (default: 5 seconds)
    #[serde(default = "default_jwks_min_refresh_interval")]
    pub jwks_min_refresh_interval: Duration,

    /// JWKS request timeout (default: 10 seconds)
    #[serde(default = "default_jwks_timeout")]
    pub request_timeout: Duration,
}

impl VerifierConfig {
    /// Configuration with defaults for the given issuer and audience
    pub fn new(issuer_url: impl Into<String>, audience_url: impl Into<String>) -> Self {
        Self {
            issuer_url: issuer_url.into(),
            audience_url: audience_url.into(),
            jwks_uri: None,
            algorithms: default_algorithms(),
            leeway: default_leeway(),
            jwks_cache_ttl: default_jwks_cache_ttl(),
            jwks_min_refresh_interval: default_jwks_min_refresh_interval(),
            request_timeout: default_jwks_timeout(),
        }
    }

    /// Use an explicit JWKS endpoint
    pub fn with_jwks_uri(mut self, jwks_uri: impl Into<String>) -> Self {
        self.jwks_uri = Some(jwks_uri.into());
        self
    }

    /// Replace the accepted algorithms
    pub fn with_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.algorithms = algorithms;
        self
    }

    /// Set clock skew tolerance
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Set the minimum interval between JWKS fetches
    pub fn with_jwks_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.jwks_min_refresh_interval = interval;
        self
    }

    /// The JWKS endpoint to query
    pub fn resolved_jwks_uri(&self) -> String {
        self.jwks_uri.clone().unwrap_or_else(|| {
            format!(
                "{}/.well-known/jwks.json",
                self.issuer_url.trim_end_matches('/')
            )
        })
    }

    /// Configured algorithms with every symmetric algorithm removed.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if no asymmetric algorithm remains.
    pub fn asymmetric_algorithms(&self) -> AuthResult<Vec<Algorithm>> {
        let allowed: Vec<Algorithm> = self
            .algorithms
            .iter()
            .copied()
            .filter(|alg| !matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512))
            .collect();

        if allowed.is_empty() {
            return Err(AuthError::Configuration(
                "at least one asymmetric signing algorithm is required".to_string(),
            ));
        }
        Ok(allowed)
    }
}

fn default_user_agent() -> String {
    format!("prometheus-auth/{}", env!("CARGO_PKG_VERSION"))
}

fn default_algorithms() -> Vec<Algorithm> {
    vec![Algorithm::ES256]
}

fn default_leeway() -> Duration {
    Duration::from_secs(60)
}

fn default_jwks_cache_ttl() -> Duration {
    Duration::from_secs(600)
}

fn default_jwks_min_refresh_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_jwks_timeout() -> Duration {
    Duration::from_secs(10)
}
