//! # Metadata Discovery
//!
//! Discovery of OAuth 2.0 Authorization Server Metadata (RFC 8414) and
//! Protected Resource Metadata (RFC 9728) via well-known URLs.
//!
//! ## Discovery Endpoint Priority
//!
//! 1. Path-aware: `/.well-known/<segment>/<server path>`
//! 2. Root fallback: `/.well-known/<segment>` (only after a 404 or no response,
//!    and only when the server path is not already `/`)
//!
//! A missing protected resource document is an error. A missing authorization
//! server document is reported as `None` so callers use endpoint conventions.
//!
//! ## Transport behaviour
//!
//! - **No Redirects**: the shared HTTP client never follows redirects
//! - **Header retry**: a network failure with the protocol version header
//!   attached is retried once without it
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use prometheus_auth::discovery::MetadataDiscovery;
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let discovery = MetadataDiscovery::new(reqwest::Client::new());
//! let server = Url::parse("https://api.example.com/mcp")?;
//!
//! let resource = discovery.discover_protected_resource(&server, None).await?;
//! if let Some(issuer) = resource.primary_authorization_server() {
//!     let metadata = discovery
//!         .discover_authorization_server(&Url::parse(issuer)?)
//!         .await?;
//!     println!("token endpoint: {:?}", metadata.map(|m| m.token_endpoint));
//! }
//! # Ok(())
//! # }
//! ```

mod challenge;
mod fetcher;
mod types;

pub use challenge::{extract_resource_metadata_url, parse_resource_metadata_url};
pub use fetcher::{MetadataDiscovery, build_root_well_known_url, build_well_known_url};
pub use types::{AuthorizationServerMetadata, DiscoveryError, ProtectedResourceMetadata, WellKnown};
