//! # Well-Known Metadata Fetcher
//!
//! Fetches Authorization Server Metadata (RFC 8414) and Protected Resource
//! Metadata (RFC 9728) with path-aware discovery and root fallback.
//!
//! ## Discovery order
//!
//! 1. Explicit metadata URL, if supplied (no fallback)
//! 2. `/.well-known/<segment>/<path>` built from the server URL's path
//! 3. `/.well-known/<segment>` at the root, only when step 2 returned
//!    404 or nothing and the server path was not already `/`

use http::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use super::types::{AuthorizationServerMetadata, ProtectedResourceMetadata, WellKnown};
use crate::config::PROTOCOL_VERSION_HEADER;
use crate::error::{AuthError, AuthResult};

/// A well-known response that reached us
#[derive(Debug, Clone)]
struct FetchedDocument {
    url: Url,
    status: StatusCode,
    body: String,
}

impl FetchedDocument {
    fn parse<T: DeserializeOwned>(&self, what: &str) -> AuthResult<T> {
        serde_json::from_str(&self.body).map_err(|e| self.malformed(format!("Invalid {what}: {e}.")))
    }

    fn malformed(&self, reason: impl Into<String>) -> AuthError {
        AuthError::MalformedResponse {
            status: self.status,
            reason: reason.into(),
            body: self.body.clone(),
        }
    }
}

/// Build the path-aware well-known URL for `base`.
///
/// A trailing slash on the base path is dropped so the result never contains `//`.
/// The base URL's query string is carried over.
pub fn build_well_known_url(base: &Url, kind: WellKnown) -> Url {
    let path = base.path().trim_end_matches('/');
    let mut url = base.clone();
    url.set_path(&format!("/.well-known/{}{}", kind.segment(), path));
    url.set_query(base.query());
    url.set_fragment(None);
    url
}

/// The root well-known URL for `base`, ignoring its path
pub fn build_root_well_known_url(base: &Url, kind: WellKnown) -> Url {
    let mut url = base.clone();
    url.set_path(&format!("/.well-known/{}", kind.segment()));
    url.set_query(None);
    url.set_fragment(None);
    url
}

/// Metadata discovery client
///
/// Each call re-discovers; documents are not cached across calls.
#[derive(Debug, Clone)]
pub struct MetadataDiscovery {
    client: reqwest::Client,
    protocol_version: Option<String>,
}

impl MetadataDiscovery {
    /// Create a discovery client on top of an existing HTTP client
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            protocol_version: None,
        }
    }

    /// Attach a protocol version header to discovery requests
    pub fn with_protocol_version(mut self, version: Option<String>) -> Self {
        self.protocol_version = version;
        self
    }

    /// Discover protected resource metadata for `server_url` (RFC 9728)
    ///
    /// # Errors
    ///
    /// - [`AuthError::DiscoveryUnavailable`] on a final 404 or no response
    /// - [`AuthError::MalformedResponse`] for any other non-2xx status, or if
    ///   the document violates the schema
    pub async fn discover_protected_resource(
        &self,
        server_url: &Url,
        metadata_url: Option<&Url>,
    ) -> AuthResult<ProtectedResourceMetadata> {
        let response = self
            .discover_with_fallback(server_url, WellKnown::ProtectedResource, metadata_url)
            .await?;

        let Some(document) = response.filter(|doc| doc.status != StatusCode::NOT_FOUND) else {
            return Err(AuthError::DiscoveryUnavailable(
                "Resource server does not implement OAuth 2.0 Protected Resource Metadata."
                    .to_string(),
            ));
        };

        if !document.status.is_success() {
            return Err(document.malformed(
                "Unexpected status loading well-known OAuth protected resource metadata.",
            ));
        }

        let metadata: ProtectedResourceMetadata =
            document.parse("protected resource metadata")?;
        metadata
            .validate()
            .map_err(|e| document.malformed(e.to_string()))?;

        debug!(
            url = %document.url,
            resource = %metadata.resource,
            "Discovered protected resource metadata"
        );
        Ok(metadata)
    }

    /// Discover authorization server metadata (RFC 8414)
    ///
    /// Returns `Ok(None)` when the server publishes no metadata, so callers
    /// can fall back to the `/authorize`, `/token` and `/register` conventions.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MalformedResponse`] for a non-2xx, non-404 status, or if
    ///   the document violates the schema
    pub async fn discover_authorization_server(
        &self,
        authorization_server_url: &Url,
    ) -> AuthResult<Option<AuthorizationServerMetadata>> {
        let response = self
            .discover_with_fallback(authorization_server_url, WellKnown::AuthorizationServer, None)
            .await?;

        let Some(document) = response.filter(|doc| doc.status != StatusCode::NOT_FOUND) else {
            debug!(
                url = %authorization_server_url,
                "No authorization server metadata, using endpoint conventions"
            );
            return Ok(None);
        };

        if !document.status.is_success() {
            return Err(document.malformed(
                "Unexpected status loading well-known OAuth authorization server metadata.",
            ));
        }

        let metadata: AuthorizationServerMetadata =
            document.parse("authorization server metadata")?;
        metadata
            .validate()
            .map_err(|e| document.malformed(e.to_string()))?;

        debug!(
            url = %document.url,
            issuer = %metadata.issuer,
            "Discovered authorization server metadata"
        );
        Ok(Some(metadata))
    }

    async fn discover_with_fallback(
        &self,
        server_url: &Url,
        kind: WellKnown,
        metadata_url: Option<&Url>,
    ) -> AuthResult<Option<FetchedDocument>> {
        if let Some(explicit) = metadata_url {
            return self.try_fetch(explicit).await;
        }

        let path_aware = build_well_known_url(server_url, kind);
        let response = self.try_fetch(&path_aware).await?;

        let should_fall_back = response
            .as_ref()
            .is_none_or(|doc| doc.status == StatusCode::NOT_FOUND)
            && server_url.path() != "/";

        if !should_fall_back {
            return Ok(response);
        }

        let root = build_root_well_known_url(server_url, kind);
        debug!(from = %path_aware, to = %root, "Falling back to root well-known URL");
        self.try_fetch(&root).await
    }

    /// GET `url`, retrying once without custom headers on a network failure.
    ///
    /// A request that fails at the network level twice yields `None`.
    async fn try_fetch(&self, url: &Url) -> AuthResult<Option<FetchedDocument>> {
        debug!(url = %url, "Fetching well-known metadata");

        let mut request = self.client.get(url.clone());
        if let Some(version) = &self.protocol_version {
            request = request.header(PROTOCOL_VERSION_HEADER, version);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if self.protocol_version.is_some() => {
                warn!(url = %url, error = %e, "Metadata request failed, retrying without headers");
                match self.client.get(url.clone()).send().await {
                    Ok(response) => response,
                    Err(e) => {
                        warn!(url = %url, error = %e, "Metadata request failed");
                        return Ok(None);
                    }
                }
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Metadata request failed");
                return Ok(None);
            }
        };

        let status = response.status();
        let body = response.text().await?;
        debug!(url = %url, status = %status, "Metadata response");

        Ok(Some(FetchedDocument {
            url: url.clone(),
            status,
            body,
        }))
    }
}
