//! `WWW-Authenticate` challenge parsing
//!
//! A resource server answering 401 may point at its protected resource
//! metadata via `WWW-Authenticate: Bearer resource_metadata="<url>"` (RFC 9728 §5.1).

use http::HeaderMap;
use http::header::WWW_AUTHENTICATE;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static RESOURCE_METADATA_PARAM: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"resource_metadata="([^"]*)""#).ok());

/// Extract the `resource_metadata` URL from a Bearer challenge value.
///
/// Returns `None` for non-Bearer challenges, a missing parameter, or an
/// unparseable URL.
pub fn parse_resource_metadata_url(challenge: &str) -> Option<Url> {
    let mut parts = challenge.trim().splitn(2, ' ');
    let scheme = parts.next()?;
    let params = parts.next()?;
    if !scheme.eq_ignore_ascii_case("bearer") || params.trim().is_empty() {
        return None;
    }

    let captures = RESOURCE_METADATA_PARAM.as_ref()?.captures(params)?;
    Url::parse(captures.get(1)?.as_str()).ok()
}

/// Extract the `resource_metadata` URL from response headers
pub fn extract_resource_metadata_url(headers: &HeaderMap) -> Option<Url> {
    headers
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(parse_resource_metadata_url)
}
