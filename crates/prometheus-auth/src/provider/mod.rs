//! Credential Provider capability interface
//!
//! The orchestrator keeps no credentials of its own. Everything scoped to a
//! session (client information, tokens, the PKCE verifier) is read and written
//! through a [`CredentialProvider`], which also performs the redirect.
//!
//! Optional capabilities are default methods: [`CredentialProvider::state`],
//! [`CredentialProvider::invalidate_credentials`], and the two hooks
//! [`CredentialProvider::client_authenticator`] and
//! [`CredentialProvider::resource_validator`].

mod memory;

pub use memory::MemoryCredentialProvider;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::error::AuthResult;
use crate::oauth2::{ClientAuthenticator, ResourceValidator};
use crate::types::{ClientInformation, ClientMetadata, InvalidationScope, OAuthTokens};

/// Session-scoped credential storage and browser redirect capability
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Redirect URI registered for this client
    fn redirect_url(&self) -> &str;

    /// Metadata used for dynamic client registration
    fn client_metadata(&self) -> &ClientMetadata;

    /// CSRF `state` for the next authorization request
    async fn state(&self) -> AuthResult<Option<String>> {
        Ok(None)
    }

    /// Stored client information, if any
    async fn client_information(&self) -> AuthResult<Option<ClientInformation>>;

    /// Persist client information returned by registration
    async fn save_client_information(&self, information: ClientInformation) -> AuthResult<()>;

    /// Stored tokens, if any
    async fn tokens(&self) -> AuthResult<Option<OAuthTokens>>;

    /// Persist a token set, replacing any previous one
    async fn save_tokens(&self, tokens: OAuthTokens) -> AuthResult<()>;

    /// Persist the PKCE verifier before redirecting
    async fn save_code_verifier(&self, code_verifier: String) -> AuthResult<()>;

    /// The stored PKCE verifier.
    ///
    /// Reading leaves it in place. The orchestrator discards it through
    /// [`CredentialProvider::invalidate_credentials`] with
    /// [`InvalidationScope::Verifier`] once the exchanged tokens are saved.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CredentialState`](crate::AuthError::CredentialState)
    /// if no verifier is stored, including after it was discarded.
    async fn code_verifier(&self) -> AuthResult<String>;

    /// Send the user agent to `authorization_url`
    async fn redirect_to_authorization(&self, authorization_url: Url) -> AuthResult<()>;

    /// Discard stored credentials
    async fn invalidate_credentials(&self, scope: InvalidationScope) -> AuthResult<()> {
        debug!(scope = ?scope, "Provider does not support credential invalidation");
        Ok(())
    }

    /// Custom token endpoint authentication
    fn client_authenticator(&self) -> Option<&dyn ClientAuthenticator> {
        None
    }

    /// Custom resource indicator selection
    fn resource_validator(&self) -> Option<&dyn ResourceValidator> {
        None
    }
}
