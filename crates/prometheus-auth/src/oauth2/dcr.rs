//! OAuth 2.0 Dynamic Client Registration (RFC 7591)
//!
//! Registers the application's [`ClientMetadata`] with an authorization
//! server. There is no fallback when discovered metadata lacks a
//! `registration_endpoint`.
//!
//! # Example
//!
//! ```rust,no_run
//! use prometheus_auth::oauth2::dcr::DcrClient;
//! use prometheus_auth::ClientMetadata;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = DcrClient::new(
//!     reqwest::Client::new(),
//!     url::Url::parse("https://auth.example.com/register")?,
//! );
//!
//! let metadata = ClientMetadata::public_client("My App", "http://localhost:3000/callback");
//! let info = client.register(&metadata).await?;
//! println!("Client ID: {}", info.client_id);
//! # Ok(())
//! # }
//! ```

use tracing::info;
use url::Url;

use super::token::parse_error_response;
use crate::discovery::AuthorizationServerMetadata;
use crate::error::{AuthError, AuthResult};
use crate::types::{ClientInformation, ClientMetadata};

/// Resolve the registration endpoint.
///
/// Metadata's `registration_endpoint` when metadata exists, `/register` on the
/// authorization server otherwise.
///
/// # Errors
///
/// - [`AuthError::ProtocolMismatch`] if metadata was discovered without a
///   registration endpoint
/// - [`AuthError::InvalidUrl`] if the endpoint cannot be resolved
pub fn registration_endpoint(
    authorization_server_url: &Url,
    metadata: Option<&AuthorizationServerMetadata>,
) -> AuthResult<Url> {
    match metadata {
        Some(metadata) => {
            let endpoint = metadata.registration_endpoint.as_deref().ok_or_else(|| {
                AuthError::ProtocolMismatch("does not support dynamic client registration".to_string())
            })?;
            Url::parse(endpoint).map_err(|e| AuthError::invalid_url(endpoint, e))
        }
        None => authorization_server_url
            .join("/register")
            .map_err(|e| AuthError::invalid_url(authorization_server_url.as_str(), e)),
    }
}

/// Dynamic Client Registration client
#[derive(Debug, Clone)]
pub struct DcrClient {
    endpoint: Url,
    http_client: reqwest::Client,
}

impl DcrClient {
    /// Create a client for `endpoint` (open registration)
    pub fn new(http_client: reqwest::Client, endpoint: Url) -> Self {
        Self {
            endpoint,
            http_client,
        }
    }

    /// Registration endpoint in use
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Register a new OAuth client
    ///
    /// # Errors
    ///
    /// - [`AuthError::Transport`] if the request fails
    /// - [`AuthError::OAuth`] or [`AuthError::MalformedResponse`] if the server rejects it
    /// - [`AuthError::MalformedResponse`] if the response lacks a `client_id`
    pub async fn register(&self, metadata: &ClientMetadata) -> AuthResult<ClientInformation> {
        let response = self
            .http_client
            .post(self.endpoint.clone())
            .json(metadata)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(parse_error_response(status, &body));
        }

        let information: ClientInformation =
            serde_json::from_str(&body).map_err(|e| AuthError::MalformedResponse {
                status,
                reason: format!("Invalid client registration response: {e}."),
                body: body.clone(),
            })?;

        info!(
            endpoint = %self.endpoint,
            client_id = %information.client_id,
            confidential = information.has_secret(),
            "Registered OAuth client"
        );
        Ok(information)
    }
}
