//! Resource server helpers
//!
//! - Protected Resource Metadata documents (RFC 9728)
//! - `WWW-Authenticate` challenges pointing clients at that document
//! - Mapping a [`VerifyError`] onto a status code and challenge

use http::StatusCode;
use std::collections::HashMap;

use crate::discovery::ProtectedResourceMetadata;
use crate::error::{AuthResult, VerifyError};
use crate::oauth2::canonical_resource_uri;

/// Protected Resource Metadata document builder
///
/// The resource identifier is canonicalized on [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct ProtectedResourceMetadataBuilder {
    resource: String,
    authorization_servers: Vec<String>,
    scopes: Vec<String>,
    bearer_methods: Vec<String>,
    resource_name: Option<String>,
    documentation_uri: Option<String>,
}

impl ProtectedResourceMetadataBuilder {
    /// Start a document for `resource`, issued for by `authorization_server`
    pub fn new(resource: impl Into<String>, authorization_server: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            authorization_servers: vec![authorization_server.into()],
            scopes: Vec::new(),
            bearer_methods: vec!["header".to_string()],
            resource_name: None,
            documentation_uri: None,
        }
    }

    /// Advertise another authorization server
    pub fn with_authorization_server(mut self, server: impl Into<String>) -> Self {
        self.authorization_servers.push(server.into());
        self
    }

    /// Set supported scopes
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Set bearer token presentation methods (default: `header`)
    pub fn with_bearer_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bearer_methods = methods.into_iter().map(Into::into).collect();
        self
    }

    /// Set a human-readable name
    pub fn with_resource_name(mut self, name: impl Into<String>) -> Self {
        self.resource_name = Some(name.into());
        self
    }

    /// Set documentation URI
    pub fn with_documentation(mut self, uri: impl Into<String>) -> Self {
        self.documentation_uri = Some(uri.into());
        self
    }

    /// Build the document
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidUrl`](crate::AuthError::InvalidUrl) if the
    /// resource is not a valid resource identifier.
    pub fn build(self) -> AuthResult<ProtectedResourceMetadata> {
        Ok(ProtectedResourceMetadata {
            resource: canonical_resource_uri(&self.resource)?,
            authorization_servers: Some(self.authorization_servers),
            jwks_uri: None,
            scopes_supported: (!self.scopes.is_empty()).then_some(self.scopes),
            bearer_methods_supported: Some(self.bearer_methods),
            resource_name: self.resource_name,
            resource_documentation: self.documentation_uri,
            additional_fields: HashMap::new(),
        })
    }
}

/// `WWW-Authenticate` header builder for 401 responses (RFC 9728 §5.1)
#[derive(Debug, Clone)]
pub struct WwwAuthenticateBuilder {
    metadata_uri: String,
    scope: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl WwwAuthenticateBuilder {
    /// Challenge pointing at the metadata document
    pub fn new(metadata_uri: impl Into<String>) -> Self {
        Self {
            metadata_uri: metadata_uri.into(),
            scope: None,
            error: None,
            error_description: None,
        }
    }

    /// Set required scope
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Set error code and description (RFC 6750 §3.1)
    pub fn with_error(mut self, error: impl Into<String>, description: Option<String>) -> Self {
        self.error = Some(error.into());
        self.error_description = description;
        self
    }

    /// Build the header value
    ///
    /// ```text
    /// Bearer resource_metadata="https://api.example.com/.well-known/oauth-protected-resource", scope="openid profile"
    /// ```
    pub fn build(self) -> String {
        let mut parts = vec![format!(
            "Bearer resource_metadata=\"{}\"",
            quote(&self.metadata_uri)
        )];

        if let Some(scope) = self.scope {
            parts.push(format!("scope=\"{}\"", quote(&scope)));
        }
        if let Some(error) = self.error {
            parts.push(format!("error=\"{}\"", quote(&error)));
        }
        if let Some(description) = self.error_description {
            parts.push(format!("error_description=\"{}\"", quote(&description)));
        }

        parts.join(", ")
    }
}

fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Extract the token from an `Authorization: Bearer <token>` header value
///
/// # Errors
///
/// Returns [`VerifyError::InvalidToken`] for any other scheme or shape.
pub fn extract_bearer_token(authorization_header: &str) -> Result<&str, VerifyError> {
    let mut parts = authorization_header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(VerifyError::InvalidToken(
            "Authorization header must have format: Bearer <token>".to_string(),
        )),
    }
}

/// Status code and `WWW-Authenticate` value for a failed verification.
///
/// A bad token gets 401 with `error="invalid_token"`. A key server outage
/// gets 503 and a plain challenge, since the client did nothing wrong.
pub fn challenge_for(error: &VerifyError, metadata_uri: &str) -> (StatusCode, String) {
    let challenge = WwwAuthenticateBuilder::new(metadata_uri);
    let challenge = match error {
        VerifyError::InvalidToken(reason) => {
            challenge.with_error("invalid_token", Some(reason.clone()))
        }
        VerifyError::KeyServerUnavailable(_) => challenge,
    };
    (error.status_code(), challenge.build())
}
