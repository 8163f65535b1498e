//! RFC 8707 Resource Indicators for OAuth 2.0
//!
//! Resource indicators bind access tokens to a specific resource server.
//! The client only sends one when the resource server published protected
//! resource metadata, and only if the advertised `resource` covers the URL
//! being accessed.

use async_trait::async_trait;
use url::Url;

use crate::discovery::ProtectedResourceMetadata;
use crate::error::{AuthError, AuthResult};

/// Custom resource selection supplied by a credential provider.
///
/// When present it replaces the default selection entirely.
#[async_trait]
pub trait ResourceValidator: Send + Sync {
    /// Choose the resource to request, or `None` to omit the parameter
    async fn validate_resource_url(
        &self,
        default_resource: &Url,
        advertised_resource: Option<&str>,
    ) -> AuthResult<Option<Url>>;
}

/// The default resource for `server_url`: the URL with any fragment removed
pub fn resource_url_from_server_url(server_url: &Url) -> Url {
    let mut resource = server_url.clone();
    resource.set_fragment(None);
    resource
}

/// Whether `configured` covers `requested`.
///
/// Origins must match and the configured path must be a prefix of the
/// requested path on a segment boundary.
pub fn check_resource_allowed(requested: &Url, configured: &Url) -> bool {
    if requested.origin() != configured.origin() {
        return false;
    }

    let requested_path = with_trailing_slash(requested.path());
    let configured_path = with_trailing_slash(configured.path());
    requested_path.starts_with(&configured_path)
}

fn with_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

/// Resolve the resource indicator to send.
///
/// # Errors
///
/// - [`AuthError::ResourceMismatch`] if the advertised resource does not cover `server_url`
/// - [`AuthError::InvalidUrl`] if the advertised resource is not a URL
/// - any error returned by a custom validator
pub async fn select_resource_url(
    server_url: &Url,
    validator: Option<&dyn ResourceValidator>,
    resource_metadata: Option<&ProtectedResourceMetadata>,
) -> AuthResult<Option<Url>> {
    let default_resource = resource_url_from_server_url(server_url);

    if let Some(validator) = validator {
        return validator
            .validate_resource_url(
                &default_resource,
                resource_metadata.map(|m| m.resource.as_str()),
            )
            .await;
    }

    let Some(metadata) = resource_metadata else {
        return Ok(None);
    };

    let advertised =
        Url::parse(&metadata.resource).map_err(|e| AuthError::invalid_url(&metadata.resource, e))?;

    if !check_resource_allowed(&default_resource, &advertised) {
        return Err(AuthError::ResourceMismatch(format!(
            "Protected resource {} does not match expected {} (or origin)",
            metadata.resource, default_resource
        )));
    }

    Ok(Some(advertised))
}

/// Canonical form of a resource identifier.
///
/// Lowercase scheme and host, default port dropped, query dropped,
/// trailing slash trimmed except for the root path.
///
/// # Errors
///
/// Returns [`AuthError::InvalidUrl`] for a fragment, a missing host, a
/// non-http(s) scheme, or plain http to a non-loopback host.
pub fn canonical_resource_uri(uri: &str) -> AuthResult<String> {
    let url = Url::parse(uri).map_err(|e| AuthError::invalid_url(uri, e))?;
    let invalid = |reason: &str| AuthError::InvalidUrl {
        url: uri.to_string(),
        reason: reason.to_string(),
    };

    let host = url
        .host_str()
        .ok_or_else(|| invalid("resource URI must have a host"))?
        .to_lowercase();

    match url.scheme() {
        "https" => {}
        "http" if matches!(host.as_str(), "localhost" | "127.0.0.1" | "[::1]") => {}
        "http" => return Err(invalid("resource URI must use https (http only for localhost)")),
        _ => return Err(invalid("resource URI must use http or https")),
    }

    if url.fragment().is_some() {
        return Err(invalid("resource URI must not contain a fragment"));
    }

    // `Url` already omits default ports
    let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();
    let path = match url.path() {
        "/" => "/",
        path => path.trim_end_matches('/'),
    };

    Ok(format!("{}://{host}{port}{path}", url.scheme()))
}
