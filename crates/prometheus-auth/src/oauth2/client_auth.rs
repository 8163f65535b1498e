//! Token endpoint client authentication (RFC 6749 §2.3)
//!
//! Selects one of `client_secret_basic`, `client_secret_post` or `none`
//! from what the server advertises and what credentials the client holds.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use http::HeaderMap;
use http::header::{AUTHORIZATION, HeaderValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::discovery::AuthorizationServerMetadata;
use crate::error::{AuthError, AuthResult};
use crate::types::ClientInformation;

/// Client authentication methods in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
    /// `Authorization: Basic base64(client_id:client_secret)`
    ClientSecretBasic,
    /// `client_id` and `client_secret` form fields
    ClientSecretPost,
    /// Public client, `client_id` form field only
    None,
}

impl ClientAuthMethod {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientSecretBasic => "client_secret_basic",
            Self::ClientSecretPost => "client_secret_post",
            Self::None => "none",
        }
    }
}

impl fmt::Display for ClientAuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A token endpoint request under construction
///
/// Form parameters keep insertion order; setting an existing name replaces it.
#[derive(Debug, Clone, Default)]
pub struct TokenRequest {
    /// Request headers
    pub headers: HeaderMap,
    params: Vec<(String, String)>,
}

impl TokenRequest {
    /// Empty request
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a form parameter, replacing any previous value
    pub fn set_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.params.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.params.push((name, value)),
        }
    }

    /// Look up a form parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// All form parameters in insertion order
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}

/// Custom token endpoint authentication supplied by a credential provider.
///
/// When present it replaces method selection entirely.
#[async_trait]
pub trait ClientAuthenticator: Send + Sync {
    /// Add authentication to `request`
    async fn authenticate(
        &self,
        request: &mut TokenRequest,
        authorization_server_url: &Url,
        metadata: Option<&AuthorizationServerMetadata>,
    ) -> AuthResult<()>;
}

/// Pick the strongest method both sides support.
///
/// With no advertised methods, RFC 6749 defaults apply: `client_secret_post`
/// when a secret exists, otherwise `none`.
pub fn select_client_auth_method(
    client: &ClientInformation,
    supported: &[String],
) -> ClientAuthMethod {
    let has_secret = client.has_secret();
    let fallback = if has_secret {
        ClientAuthMethod::ClientSecretPost
    } else {
        ClientAuthMethod::None
    };

    if supported.is_empty() {
        return fallback;
    }

    let offers = |method: ClientAuthMethod| supported.iter().any(|m| m == method.as_str());

    if has_secret && offers(ClientAuthMethod::ClientSecretBasic) {
        ClientAuthMethod::ClientSecretBasic
    } else if has_secret && offers(ClientAuthMethod::ClientSecretPost) {
        ClientAuthMethod::ClientSecretPost
    } else if offers(ClientAuthMethod::None) {
        ClientAuthMethod::None
    } else {
        fallback
    }
}

/// Write `method`'s credentials into `request`
///
/// # Errors
///
/// Returns [`AuthError::CredentialState`] if a secret-based method is chosen
/// for a client without a secret.
pub fn apply_client_auth(
    method: ClientAuthMethod,
    client: &ClientInformation,
    request: &mut TokenRequest,
) -> AuthResult<()> {
    match method {
        ClientAuthMethod::ClientSecretBasic => {
            let secret = require_secret(method, client)?;
            let credentials = STANDARD.encode(format!("{}:{}", client.client_id, secret));
            let value = HeaderValue::from_str(&format!("Basic {credentials}"))
                .map_err(|e| AuthError::CredentialState(format!("Invalid client credentials: {e}")))?;
            request.headers.insert(AUTHORIZATION, value);
        }
        ClientAuthMethod::ClientSecretPost => {
            let secret = require_secret(method, client)?;
            request.set_param("client_id", client.client_id.clone());
            request.set_param("client_secret", secret);
        }
        ClientAuthMethod::None => {
            request.set_param("client_id", client.client_id.clone());
        }
    }
    Ok(())
}

fn require_secret<'a>(method: ClientAuthMethod, client: &'a ClientInformation) -> AuthResult<&'a str> {
    client.expose_secret().ok_or_else(|| {
        AuthError::CredentialState(format!("{method} authentication requires a client_secret"))
    })
}
