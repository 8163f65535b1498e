//! # Prometheus Auth - OAuth 2.1 Client Engine and Bearer Verifier
//!
//! Two halves of MCP-style authorization:
//!
//! - **Client side**: the [`AuthManager`] drives PKCE authorization code
//!   flows against whatever authorization server a protected resource names,
//!   registering the client dynamically when needed and refreshing tokens.
//! - **Resource side**: the [`BearerVerifier`] checks access tokens against
//!   the issuer's JWKS and reports client faults separately from key server
//!   outages.
//!
//! ## Architecture
//!
//! - [`discovery`] - RFC 8414 / RFC 9728 metadata discovery with root fallback
//! - [`oauth2`] - PKCE, authorization URLs, client authentication, token
//!   exchange, dynamic client registration, resource indicators
//! - [`provider`] - the [`CredentialProvider`] session storage interface
//! - [`manager`] - the orchestrator and its one-retry recovery policy
//! - [`jwt`] - JWKS caching and bearer verification
//! - [`server`] - Protected Resource Metadata and `WWW-Authenticate` helpers
//! - [`config`] - [`ClientConfig`] and [`VerifierConfig`]
//! - [`error`] - [`AuthError`] and [`VerifyError`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use prometheus_auth::{
//!     AuthManager, AuthOutcome, AuthRequest, ClientConfig, ClientMetadata,
//!     MemoryCredentialProvider,
//! };
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = AuthManager::new(ClientConfig::default())?;
//! let provider = MemoryCredentialProvider::new(
//!     ClientMetadata::public_client("My App", "http://localhost:3000/callback"),
//!     "http://localhost:3000/callback",
//! );
//!
//! let request = AuthRequest::new(Url::parse("https://api.example.com/mcp")?);
//! if manager.authorize(&provider, &request).await? == AuthOutcome::Redirect {
//!     println!("Open {}", provider.last_redirect().await.unwrap());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod discovery;
pub mod error;
pub mod jwt;
pub mod manager;
pub mod oauth2;
pub mod provider;
pub mod server;
pub mod types;

#[doc(inline)]
pub use config::{ClientConfig, ResourceDiscoveryPolicy, VerifierConfig};
#[doc(inline)]
pub use context::AuthContext;
#[doc(inline)]
pub use error::{AuthError, AuthResult, ErrorKind, OAuthErrorCode, OAuthProtocolError, VerifyError};
#[doc(inline)]
pub use jwt::{BearerVerifier, JwksClient};
#[doc(inline)]
pub use manager::{AuthManager, AuthOutcome, AuthRequest};
#[doc(inline)]
pub use provider::{CredentialProvider, MemoryCredentialProvider};
#[doc(inline)]
pub use types::{ClientInformation, ClientMetadata, InvalidationScope, OAuthTokens};
