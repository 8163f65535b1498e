//! Bearer token verification for protected resources
//!
//! - `jwks` - JWKS fetching, caching and rate-limited refresh
//! - `verifier` - signature and claim verification producing an [`AuthContext`](crate::AuthContext)
//!
//! Failures are reported as [`VerifyError`](crate::VerifyError), which keeps
//! "your token is bad" (401) apart from "our key server is down" (503).

pub mod jwks;
pub mod verifier;

pub use jwks::JwksClient;
pub use verifier::BearerVerifier;
