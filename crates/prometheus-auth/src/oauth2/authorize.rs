//! Authorization request construction (RFC 6749 §4.1.1 with PKCE)

use url::Url;

use super::pkce::{CODE_CHALLENGE_METHOD, PkcePair};
use crate::discovery::AuthorizationServerMetadata;
use crate::error::{AuthError, AuthResult};
use crate::types::ClientInformation;

const RESPONSE_TYPE_CODE: &str = "code";
const OFFLINE_ACCESS_SCOPE: &str = "offline_access";

/// Inputs to an authorization request
#[derive(Debug, Clone, Copy)]
pub struct AuthorizationParams<'a> {
    /// Registered client
    pub client_information: &'a ClientInformation,
    /// Where the authorization server sends the user back
    pub redirect_url: &'a str,
    /// Space-delimited scope
    pub scope: Option<&'a str>,
    /// Opaque CSRF state
    pub state: Option<&'a str>,
    /// RFC 8707 resource indicator
    pub resource: Option<&'a Url>,
}

/// A ready-to-follow authorization URL and the verifier to store for the exchange
#[derive(Debug, Clone)]
pub struct AuthorizationStart {
    /// Browser redirect target
    pub authorization_url: Url,
    /// PKCE verifier and challenge used for this attempt
    pub pkce: PkcePair,
}

/// Build the authorization URL for a fresh PKCE pair.
///
/// Without metadata the endpoint is `/authorize` on the authorization server.
///
/// # Errors
///
/// - [`AuthError::ProtocolMismatch`] if metadata lacks the `code` response
///   type or the `S256` challenge method
/// - [`AuthError::InvalidUrl`] if the endpoint cannot be resolved
pub fn start_authorization(
    authorization_server_url: &Url,
    metadata: Option<&AuthorizationServerMetadata>,
    params: AuthorizationParams<'_>,
) -> AuthResult<AuthorizationStart> {
    let mut authorization_url = match metadata {
        Some(metadata) => {
            if !metadata.supports_response_type(RESPONSE_TYPE_CODE) {
                return Err(AuthError::ProtocolMismatch(format!(
                    "does not support response type {RESPONSE_TYPE_CODE}"
                )));
            }
            if !metadata.supports_pkce_method(CODE_CHALLENGE_METHOD) {
                return Err(AuthError::ProtocolMismatch(format!(
                    "does not support code challenge method {CODE_CHALLENGE_METHOD}"
                )));
            }
            Url::parse(&metadata.authorization_endpoint)
                .map_err(|e| AuthError::invalid_url(&metadata.authorization_endpoint, e))?
        }
        None => authorization_server_url
            .join("/authorize")
            .map_err(|e| AuthError::invalid_url(authorization_server_url.as_str(), e))?,
    };

    let pkce = PkcePair::generate();

    {
        let mut query = authorization_url.query_pairs_mut();
        query
            .append_pair("response_type", RESPONSE_TYPE_CODE)
            .append_pair("client_id", &params.client_information.client_id)
            .append_pair("code_challenge", pkce.code_challenge())
            .append_pair("code_challenge_method", CODE_CHALLENGE_METHOD)
            .append_pair("redirect_uri", params.redirect_url);

        if let Some(state) = params.state {
            query.append_pair("state", state);
        }

        if let Some(scope) = params.scope {
            query.append_pair("scope", scope);
            if scope.split_whitespace().any(|s| s == OFFLINE_ACCESS_SCOPE) {
                query.append_pair("prompt", "consent");
            }
        }

        if let Some(resource) = params.resource {
            query.append_pair("resource", resource.as_str());
        }
    }

    Ok(AuthorizationStart {
        authorization_url,
        pkce,
    })
}
