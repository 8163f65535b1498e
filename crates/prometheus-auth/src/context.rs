//! Authentication Context
//!
//! The result of a successful bearer verification, handed to request
//! handlers as the caller's identity.

use chrono::{DateTime, Utc};
use std::fmt;
use url::Url;

/// Verified caller identity extracted from an access token
#[derive(Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// The raw bearer token
    pub token: String,
    /// Authorized party (`azp`), else `client_id`
    pub client_id: String,
    /// `scope` split on whitespace
    pub scopes: Vec<String>,
    /// Expiry from the `exp` claim
    pub expires_at: DateTime<Utc>,
    /// The protected resource the token was issued for
    pub resource: Url,
    /// Caller identity from the `sub` claim
    pub subject: String,
}

impl AuthContext {
    /// Check if the token grants `scope`
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// Check if the token grants every scope in `required`
    pub fn has_all_scopes(&self, required: &[&str]) -> bool {
        required.iter().all(|scope| self.has_scope(scope))
    }

    /// Whether `exp` has passed
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("token", &"[REDACTED]")
            .field("client_id", &self.client_id)
            .field("scopes", &self.scopes)
            .field("expires_at", &self.expires_at)
            .field("resource", &self.resource.as_str())
            .field("subject", &self.subject)
            .finish()
    }
}
