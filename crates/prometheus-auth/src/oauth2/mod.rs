//! OAuth 2.1 Client Building Blocks
//!
//! This module provides the pieces the [`AuthManager`](crate::AuthManager)
//! drives, each usable on its own:
//! - Authorization Code flow with PKCE (RFC 7636)
//! - Refresh tokens with refresh-token preservation
//! - Resource Indicators (RFC 8707)
//! - Dynamic Client Registration (RFC 7591)
//! - Token endpoint client authentication (RFC 6749 §2.3)
//!
//! ## Submodules
//!
//! - `pkce` - verifier/challenge generation
//! - `authorize` - authorization URL construction
//! - `client_auth` - client authentication selection and application
//! - `token` - code and refresh exchanges, OAuth error parsing
//! - `dcr` - dynamic client registration
//! - `resource` - resource indicator selection

pub mod authorize;
pub mod client_auth;
pub mod dcr;
pub mod pkce;
pub mod resource;
pub mod token;

pub use authorize::{AuthorizationParams, AuthorizationStart, start_authorization};
pub use client_auth::{
    ClientAuthMethod, ClientAuthenticator, TokenRequest, apply_client_auth,
    select_client_auth_method,
};
pub use dcr::{DcrClient, registration_endpoint};
pub use pkce::{PkcePair, s256_challenge};
pub use resource::{
    ResourceValidator, canonical_resource_uri, check_resource_allowed,
    resource_url_from_server_url, select_resource_url,
};
pub use token::{CodeExchange, RefreshExchange, TokenEndpoint, parse_error_response};
