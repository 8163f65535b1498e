//! # Discovery Document Types
//!
//! OAuth 2.0 Authorization Server Metadata (RFC 8414) and Protected Resource
//! Metadata (RFC 9728) documents.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use url::Url;

/// Metadata document schema violations
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Invalid field value
    #[error("Invalid field value for {field}: {reason}")]
    InvalidField { field: String, reason: String },
}

/// Well-known metadata document kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WellKnown {
    /// `/.well-known/oauth-authorization-server` (RFC 8414)
    AuthorizationServer,
    /// `/.well-known/oauth-protected-resource` (RFC 9728)
    ProtectedResource,
}

impl WellKnown {
    /// The path segment after `/.well-known/`
    pub fn segment(&self) -> &'static str {
        match self {
            Self::AuthorizationServer => "oauth-authorization-server",
            Self::ProtectedResource => "oauth-protected-resource",
        }
    }
}

/// OAuth 2.0 Authorization Server Metadata (RFC 8414)
///
/// ```json
/// {
///   "issuer": "https://server.example.com",
///   "authorization_endpoint": "https://server.example.com/authorize",
///   "token_endpoint": "https://server.example.com/token",
///   "registration_endpoint": "https://server.example.com/register",
///   "response_types_supported": ["code"],
///   "code_challenge_methods_supported": ["S256"]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthorizationServerMetadata {
    /// REQUIRED. The authorization server's issuer identifier
    pub issuer: String,

    /// REQUIRED. URL of the authorization endpoint
    pub authorization_endpoint: String,

    /// REQUIRED. URL of the token endpoint
    pub token_endpoint: String,

    /// URL of the authorization server's JWK Set document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,

    /// URL of the dynamic client registration endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_endpoint: Option<String>,

    /// Supported scope values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,

    /// REQUIRED. Supported `response_type` values
    pub response_types_supported: Vec<String>,

    /// Supported `response_mode` values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_modes_supported: Option<Vec<String>>,

    /// Supported `grant_type` values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_types_supported: Option<Vec<String>>,

    /// Supported token endpoint client authentication methods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint_auth_methods_supported: Option<Vec<String>>,

    /// URL of service documentation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_documentation: Option<String>,

    /// URL of the revocation endpoint (RFC 7009)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_endpoint: Option<String>,

    /// URL of the introspection endpoint (RFC 7662)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introspection_endpoint: Option<String>,

    /// PKCE code challenge methods supported (RFC 7636)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge_methods_supported: Option<Vec<String>>,

    /// Additional metadata fields
    #[serde(flatten)]
    pub additional_fields: HashMap<String, serde_json::Value>,
}

impl AuthorizationServerMetadata {
    /// Validate the authorization server metadata
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] if an endpoint is not a URL or
    /// `response_types_supported` is empty
    pub fn validate(&self) -> Result<(), DiscoveryError> {
        validate_url("authorization_endpoint", &self.authorization_endpoint)?;
        validate_url("token_endpoint", &self.token_endpoint)?;

        for (field, value) in [
            ("registration_endpoint", &self.registration_endpoint),
            ("jwks_uri", &self.jwks_uri),
            ("revocation_endpoint", &self.revocation_endpoint),
            ("introspection_endpoint", &self.introspection_endpoint),
        ] {
            if let Some(url) = value {
                validate_url(field, url)?;
            }
        }

        if self.response_types_supported.is_empty() {
            return Err(DiscoveryError::MissingField(
                "response_types_supported cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether the server supports the `code` response type
    pub fn supports_response_type(&self, response_type: &str) -> bool {
        self.response_types_supported
            .iter()
            .any(|t| t == response_type)
    }

    /// Check if a specific PKCE method is supported
    pub fn supports_pkce_method(&self, method: &str) -> bool {
        self.code_challenge_methods_supported
            .as_ref()
            .map(|methods| methods.iter().any(|m| m == method))
            .unwrap_or(false)
    }

    /// Whether a grant type is usable. An absent list places no restriction.
    pub fn supports_grant_type(&self, grant_type: &str) -> bool {
        self.grant_types_supported
            .as_ref()
            .map(|grants| grants.iter().any(|g| g == grant_type))
            .unwrap_or(true)
    }

    /// Advertised client authentication methods, empty when not published
    pub fn token_endpoint_auth_methods(&self) -> &[String] {
        self.token_endpoint_auth_methods_supported
            .as_deref()
            .unwrap_or_default()
    }
}

/// OAuth 2.0 Protected Resource Metadata (RFC 9728)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProtectedResourceMetadata {
    /// REQUIRED. The protected resource's identifier
    pub resource: String,

    /// Authorization servers that issue tokens for this resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_servers: Option<Vec<String>>,

    /// URL of the resource's JWK Set document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,

    /// Scopes used to request access to this resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,

    /// Supported bearer token presentation methods (`header`, `body`, `query`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_methods_supported: Option<Vec<String>>,

    /// Human-readable resource name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,

    /// URL of developer documentation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_documentation: Option<String>,

    /// Additional metadata fields
    #[serde(flatten)]
    pub additional_fields: HashMap<String, serde_json::Value>,
}

impl ProtectedResourceMetadata {
    /// Validate the protected resource metadata
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] if `resource` or an authorization server is not a URL
    pub fn validate(&self) -> Result<(), DiscoveryError> {
        validate_url("resource", &self.resource)?;
        for server in self.authorization_servers.iter().flatten() {
            validate_url("authorization_servers", server)?;
        }
        Ok(())
    }

    /// The first advertised authorization server
    pub fn primary_authorization_server(&self) -> Option<&str> {
        self.authorization_servers
            .as_ref()
            .and_then(|servers| servers.first())
            .map(String::as_str)
    }
}

fn validate_url(field: &str, value: &str) -> Result<(), DiscoveryError> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|e| DiscoveryError::InvalidField {
            field: field.to_string(),
            reason: format!("Invalid URL: {}", e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> AuthorizationServerMetadata {
        serde_json::from_value(serde_json::json!({
            "issuer": "https://auth.example.com",
            "authorization_endpoint": "https://auth.example.com/authorize",
            "token_endpoint": "https://auth.example.com/token",
            "response_types_supported": ["code"],
            "code_challenge_methods_supported": ["S256"],
            "x-vendor": "extra"
        }))
        .unwrap()
    }

    #[test]
    fn test_authorization_server_metadata_validation() {
        let mut meta = metadata();
        assert!(meta.validate().is_ok());
        assert_eq!(meta.additional_fields["x-vendor"], "extra");

        meta.token_endpoint = "not a url".to_string();
        assert!(matches!(
            meta.validate(),
            Err(DiscoveryError::InvalidField { ref field, .. }) if field == "token_endpoint"
        ));
    }

    #[test]
    fn test_missing_required_field_fails_to_parse() {
        let result = serde_json::from_value::<AuthorizationServerMetadata>(serde_json::json!({
            "issuer": "https://auth.example.com",
            "authorization_endpoint": "https://auth.example.com/authorize",
            "response_types_supported": ["code"]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_capability_checks() {
        let mut meta = metadata();
        assert!(meta.supports_response_type("code"));
        assert!(meta.supports_pkce_method("S256"));
        assert!(!meta.supports_pkce_method("plain"));
        assert!(meta.supports_grant_type("refresh_token"));
        assert!(meta.token_endpoint_auth_methods().is_empty());

        meta.grant_types_supported = Some(vec!["client_credentials".to_string()]);
        assert!(!meta.supports_grant_type("authorization_code"));
    }

    #[test]
    fn test_protected_resource_metadata() {
        let prm: ProtectedResourceMetadata = serde_json::from_value(serde_json::json!({
            "resource": "https://api.example.com/mcp",
            "authorization_servers": ["https://auth.example.com", "https://backup.example.com"]
        }))
        .unwrap();

        assert!(prm.validate().is_ok());
        assert_eq!(
            prm.primary_authorization_server(),
            Some("https://auth.example.com")
        );
    }
}
