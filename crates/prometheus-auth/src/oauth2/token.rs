//! Token endpoint exchanges
//!
//! Authorization-code exchange and refresh-token exchange share one request
//! path: grant check, client authentication, resource indicator, POST, then
//! either an OAuth error or a schema-checked [`OAuthTokens`].

use http::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::client_auth::{
    ClientAuthenticator, TokenRequest, apply_client_auth, select_client_auth_method,
};
use crate::discovery::AuthorizationServerMetadata;
use crate::error::{AuthError, AuthResult, OAuthErrorCode, OAuthProtocolError};
use crate::types::{ClientInformation, OAuthTokens};

const GRANT_AUTHORIZATION_CODE: &str = "authorization_code";
const GRANT_REFRESH_TOKEN: &str = "refresh_token";

/// OAuth error document (RFC 6749 §5.2)
#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error_uri: Option<String>,
}

/// Turn a non-2xx token or registration response into an [`AuthError`].
///
/// Unknown error codes classify as `server_error`, keeping the original code
/// in the description. A body that is not an OAuth error document becomes
/// [`AuthError::MalformedResponse`].
pub fn parse_error_response(status: StatusCode, body: &str) -> AuthError {
    match serde_json::from_str::<OAuthErrorResponse>(body) {
        Ok(doc) => {
            let (code, description) = match OAuthErrorCode::from_code(&doc.error) {
                Some(code) => (code, doc.error_description),
                None => {
                    let description = match doc.error_description {
                        Some(desc) => format!("{}: {}", doc.error, desc),
                        None => doc.error,
                    };
                    (OAuthErrorCode::ServerError, Some(description))
                }
            };
            AuthError::OAuth(OAuthProtocolError {
                code,
                description,
                uri: doc.error_uri,
            })
        }
        Err(e) => AuthError::MalformedResponse {
            status,
            reason: format!("Invalid OAuth error response: {e}."),
            body: body.to_string(),
        },
    }
}

/// Authorization-code exchange inputs
#[derive(Debug, Clone, Copy)]
pub struct CodeExchange<'a> {
    /// Registered client
    pub client_information: &'a ClientInformation,
    /// Code returned to the redirect URI
    pub authorization_code: &'a str,
    /// PKCE verifier stored before the redirect
    pub code_verifier: &'a str,
    /// Redirect URI used on the authorization request
    pub redirect_uri: &'a str,
    /// RFC 8707 resource indicator
    pub resource: Option<&'a Url>,
}

/// Refresh-token exchange inputs
#[derive(Debug, Clone, Copy)]
pub struct RefreshExchange<'a> {
    /// Registered client
    pub client_information: &'a ClientInformation,
    /// Refresh token being redeemed
    pub refresh_token: &'a str,
    /// RFC 8707 resource indicator
    pub resource: Option<&'a Url>,
}

/// A token endpoint bound to one authorization server
#[derive(Clone, Copy)]
pub struct TokenEndpoint<'a> {
    http_client: &'a reqwest::Client,
    authorization_server_url: &'a Url,
    metadata: Option<&'a AuthorizationServerMetadata>,
    authenticator: Option<&'a dyn ClientAuthenticator>,
}

impl<'a> TokenEndpoint<'a> {
    /// Bind to an authorization server, with metadata if it was discovered
    pub fn new(
        http_client: &'a reqwest::Client,
        authorization_server_url: &'a Url,
        metadata: Option<&'a AuthorizationServerMetadata>,
    ) -> Self {
        Self {
            http_client,
            authorization_server_url,
            metadata,
            authenticator: None,
        }
    }

    /// Replace method selection with a custom authenticator
    pub fn with_authenticator(mut self, authenticator: Option<&'a dyn ClientAuthenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    /// The token endpoint URL: metadata's, else `/token` on the server
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidUrl`] if the URL cannot be resolved.
    pub fn url(&self) -> AuthResult<Url> {
        match self.metadata {
            Some(metadata) => Url::parse(&metadata.token_endpoint)
                .map_err(|e| AuthError::invalid_url(&metadata.token_endpoint, e)),
            None => self
                .authorization_server_url
                .join("/token")
                .map_err(|e| AuthError::invalid_url(self.authorization_server_url.as_str(), e)),
        }
    }

    /// Exchange an authorization code for tokens
    ///
    /// # Errors
    ///
    /// - [`AuthError::ProtocolMismatch`] if metadata excludes the `authorization_code` grant
    /// - [`AuthError::OAuth`] or [`AuthError::MalformedResponse`] on a non-2xx response
    /// - [`AuthError::MalformedResponse`] if the success body is not a token set
    pub async fn exchange_code(&self, exchange: CodeExchange<'_>) -> AuthResult<OAuthTokens> {
        self.ensure_grant_supported(GRANT_AUTHORIZATION_CODE)?;

        let mut request = TokenRequest::new();
        request.set_param("grant_type", GRANT_AUTHORIZATION_CODE);
        request.set_param("code", exchange.authorization_code);
        request.set_param("code_verifier", exchange.code_verifier);
        request.set_param("redirect_uri", exchange.redirect_uri);

        self.execute(exchange.client_information, request, exchange.resource)
            .await
    }

    /// Redeem a refresh token.
    ///
    /// When the server omits `refresh_token`, the redeemed one is kept.
    ///
    /// # Errors
    ///
    /// Same as [`TokenEndpoint::exchange_code`], for the `refresh_token` grant.
    pub async fn refresh(&self, exchange: RefreshExchange<'_>) -> AuthResult<OAuthTokens> {
        self.ensure_grant_supported(GRANT_REFRESH_TOKEN)?;

        let mut request = TokenRequest::new();
        request.set_param("grant_type", GRANT_REFRESH_TOKEN);
        request.set_param("refresh_token", exchange.refresh_token);

        let tokens = self
            .execute(exchange.client_information, request, exchange.resource)
            .await?;
        Ok(tokens.preserve_refresh_token(exchange.refresh_token))
    }

    fn ensure_grant_supported(&self, grant_type: &str) -> AuthResult<()> {
        match self.metadata {
            Some(metadata) if !metadata.supports_grant_type(grant_type) => {
                Err(AuthError::ProtocolMismatch(format!(
                    "does not support grant type {grant_type}"
                )))
            }
            _ => Ok(()),
        }
    }

    async fn execute(
        &self,
        client: &ClientInformation,
        mut request: TokenRequest,
        resource: Option<&Url>,
    ) -> AuthResult<OAuthTokens> {
        let url = self.url()?;

        match self.authenticator {
            Some(authenticator) => {
                authenticator
                    .authenticate(&mut request, self.authorization_server_url, self.metadata)
                    .await?;
            }
            None => {
                let supported = self
                    .metadata
                    .map(AuthorizationServerMetadata::token_endpoint_auth_methods)
                    .unwrap_or_default();
                let method = select_client_auth_method(client, supported);
                debug!(method = %method, "Selected client authentication method");
                apply_client_auth(method, client, &mut request)?;
            }
        }

        if let Some(resource) = resource {
            request.set_param("resource", resource.as_str());
        }

        let grant_type = request.param("grant_type").unwrap_or_default().to_string();
        debug!(url = %url, grant_type = %grant_type, "Token request");

        let response = self
            .http_client
            .post(url.clone())
            .headers(request.headers.clone())
            .form(request.params())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let err = parse_error_response(status, &body);
            warn!(url = %url, status = %status, error = %err, "Token request rejected");
            return Err(err);
        }

        serde_json::from_str(&body).map_err(|e| AuthError::MalformedResponse {
            status,
            reason: format!("Invalid token response: {e}."),
            body,
        })
    }
}
