//! Bearer token verification against the issuer's JWKS
//!
//! Verification order:
//! 1. Decode the header; a missing `kid` fails before any network call
//! 2. Restrict the algorithm to the configured asymmetric set
//! 3. Look up the signing key (server fault if the key server misbehaves)
//! 4. Verify signature, `iss`, `aud` and expiry
//! 5. Require `azp`/`client_id`, `scope`, `exp` and `sub`

use chrono::DateTime;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::jwks::JwksClient;
use crate::config::VerifierConfig;
use crate::context::AuthContext;
use crate::error::{AuthError, AuthResult, VerifyError};

/// Claims the verifier consumes; everything else is ignored
#[derive(Debug, Clone, Deserialize)]
struct AccessTokenClaims {
    #[serde(default)]
    azp: Option<String>,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    exp: Option<i64>,
    #[serde(default)]
    sub: Option<String>,
}

fn non_empty(claim: Option<String>) -> Option<String> {
    claim.filter(|value| !value.is_empty())
}

fn missing_claim(claim: &str) -> VerifyError {
    VerifyError::InvalidToken(format!("Access token is missing {claim} claim."))
}

/// JWKS-backed bearer token verifier
///
/// # Example
///
/// ```rust,no_run
/// use prometheus_auth::{BearerVerifier, VerifierConfig};
///
/// # tokio_test::block_on(async {
/// let verifier = BearerVerifier::new(VerifierConfig::new(
///     "https://auth.example.com",
///     "https://mcp.example.com",
/// ))?;
///
/// match verifier.verify("eyJ0eXAi...").await {
///     Ok(ctx) => println!("Caller: {}", ctx.subject),
///     Err(e) => println!("Rejected with {}: {e}", e.status_code()),
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct BearerVerifier {
    issuer: String,
    audience: String,
    resource: Url,
    algorithms: Vec<Algorithm>,
    leeway: Duration,
    jwks_client: Arc<JwksClient>,
}

impl BearerVerifier {
    /// Create a verifier with its own JWKS client
    ///
    /// # Errors
    ///
    /// - [`AuthError::Configuration`] if no asymmetric algorithm is allowed
    ///   or the audience is not a URL
    /// - any error from [`JwksClient::from_config`]
    pub fn new(config: VerifierConfig) -> AuthResult<Self> {
        let jwks_client = Arc::new(JwksClient::from_config(&config)?);
        let algorithms = config.asymmetric_algorithms()?;
        let resource = Url::parse(&config.audience_url).map_err(|e| {
            AuthError::Configuration(format!(
                "audience {} is not a valid resource URL: {e}",
                config.audience_url
            ))
        })?;

        Ok(Self {
            issuer: config.issuer_url,
            audience: config.audience_url,
            resource,
            algorithms,
            leeway: config.leeway,
            jwks_client,
        })
    }

    /// Share a JWKS client (and its cache) with other verifiers
    pub fn with_jwks_client(mut self, jwks_client: Arc<JwksClient>) -> Self {
        self.jwks_client = jwks_client;
        self
    }

    /// Expected issuer
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Expected audience
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Verify a raw bearer token
    ///
    /// # Errors
    ///
    /// - [`VerifyError::InvalidToken`] for anything wrong with the token itself,
    ///   including a `kid` the key server does not know
    /// - [`VerifyError::KeyServerUnavailable`] if the key set cannot be fetched
    ///   or the matching key is unusable
    pub async fn verify(&self, token: &str) -> Result<AuthContext, VerifyError> {
        let header = decode_header(token).map_err(|e| {
            debug!(error = %e, "Failed to decode JWT header");
            VerifyError::InvalidToken(format!("Invalid JWT format: {e}"))
        })?;

        let kid = header.kid.as_deref().ok_or_else(|| {
            VerifyError::InvalidToken(
                "Access token is missing a \"kid\" (Key ID) in the header.".to_string(),
            )
        })?;

        if !self.algorithms.contains(&header.alg) {
            warn!(algorithm = ?header.alg, allowed = ?self.algorithms, "JWT algorithm not allowed");
            return Err(VerifyError::InvalidToken(format!(
                "Algorithm {:?} not allowed",
                header.alg
            )));
        }

        let jwk = self.jwks_client.signing_key(kid).await?;
        let decoding_key = DecodingKey::from_jwk(&jwk).map_err(|e| {
            warn!(kid, error = %e, "Unusable JWK");
            VerifyError::KeyServerUnavailable(format!("Invalid JWK \"{kid}\": {e}"))
        })?;

        let mut validation = Validation::new(header.alg);
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);
        validation.leeway = self.leeway.as_secs();
        // Presence is checked below so each missing claim gets its own message
        validation.required_spec_claims = HashSet::new();

        let claims = decode::<AccessTokenClaims>(token, &decoding_key, &validation)
            .map_err(|e| {
                debug!(error = %e, issuer = %self.issuer, audience = %self.audience, "JWT validation failed");
                VerifyError::InvalidToken(format!("JWT validation failed: {e}"))
            })?
            .claims;

        // Empty strings count as missing
        let client_id = non_empty(claims.azp)
            .or(non_empty(claims.client_id))
            .ok_or_else(|| missing_claim("\"azp\" or \"client_id\""))?;
        let scope = non_empty(claims.scope).ok_or_else(|| missing_claim("\"scope\""))?;
        let exp = claims.exp.ok_or_else(|| missing_claim("\"exp\""))?;
        let subject = non_empty(claims.sub).ok_or_else(|| missing_claim("\"sub\""))?;

        let expires_at = DateTime::from_timestamp(exp, 0).ok_or_else(|| {
            VerifyError::InvalidToken("Access token has an out-of-range \"exp\" claim.".to_string())
        })?;

        debug!(subject = %subject, client_id = %client_id, kid, "Bearer token verified");

        Ok(AuthContext {
            token: token.to_string(),
            client_id,
            scopes: scope.split_whitespace().map(str::to_string).collect(),
            expires_at,
            resource: self.resource.clone(),
            subject,
        })
    }
}
