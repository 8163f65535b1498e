//! In-memory credential provider
//!
//! Holds one session's credentials behind a `tokio` lock. Redirects are
//! recorded rather than performed, so the embedding application (or a test)
//! can follow [`MemoryCredentialProvider::last_redirect`] itself.

use async_trait::async_trait;
use oauth2::CsrfToken;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

use super::CredentialProvider;
use crate::error::{AuthError, AuthResult};
use crate::oauth2::{ClientAuthenticator, ResourceValidator};
use crate::types::{ClientInformation, ClientMetadata, InvalidationScope, OAuthTokens};

#[derive(Default)]
struct Session {
    client_information: Option<ClientInformation>,
    tokens: Option<OAuthTokens>,
    code_verifier: Option<String>,
    last_state: Option<String>,
    last_redirect: Option<Url>,
}

/// Session-scoped provider backed by process memory
pub struct MemoryCredentialProvider {
    redirect_url: String,
    client_metadata: ClientMetadata,
    generate_state: bool,
    session: RwLock<Session>,
    client_authenticator: Option<Arc<dyn ClientAuthenticator>>,
    resource_validator: Option<Arc<dyn ResourceValidator>>,
}

impl fmt::Debug for MemoryCredentialProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCredentialProvider")
            .field("redirect_url", &self.redirect_url)
            .field("client_name", &self.client_metadata.client_name)
            .field("generate_state", &self.generate_state)
            .finish_non_exhaustive()
    }
}

impl MemoryCredentialProvider {
    /// Empty session for a client
    pub fn new(client_metadata: ClientMetadata, redirect_url: impl Into<String>) -> Self {
        Self {
            redirect_url: redirect_url.into(),
            client_metadata,
            generate_state: true,
            session: RwLock::new(Session::default()),
            client_authenticator: None,
            resource_validator: None,
        }
    }

    /// Start with pre-provisioned client information
    pub fn with_client_information(mut self, information: ClientInformation) -> Self {
        self.session.get_mut().client_information = Some(information);
        self
    }

    /// Start with stored tokens
    pub fn with_tokens(mut self, tokens: OAuthTokens) -> Self {
        self.session.get_mut().tokens = Some(tokens);
        self
    }

    /// Turn `state` generation on or off (default: on)
    pub fn with_state_generation(mut self, enabled: bool) -> Self {
        self.generate_state = enabled;
        self
    }

    /// Install a custom token endpoint authenticator
    pub fn with_client_authenticator(mut self, authenticator: Arc<dyn ClientAuthenticator>) -> Self {
        self.client_authenticator = Some(authenticator);
        self
    }

    /// Install a custom resource validator
    pub fn with_resource_validator(mut self, validator: Arc<dyn ResourceValidator>) -> Self {
        self.resource_validator = Some(validator);
        self
    }

    /// The most recent authorization URL handed to the provider
    pub async fn last_redirect(&self) -> Option<Url> {
        self.session.read().await.last_redirect.clone()
    }

    /// The most recent generated `state`
    pub async fn last_state(&self) -> Option<String> {
        self.session.read().await.last_state.clone()
    }

    /// Whether a PKCE verifier is waiting to be exchanged
    pub async fn has_code_verifier(&self) -> bool {
        self.session.read().await.code_verifier.is_some()
    }
}

#[async_trait]
impl CredentialProvider for MemoryCredentialProvider {
    fn redirect_url(&self) -> &str {
        &self.redirect_url
    }

    fn client_metadata(&self) -> &ClientMetadata {
        &self.client_metadata
    }

    async fn state(&self) -> AuthResult<Option<String>> {
        if !self.generate_state {
            return Ok(None);
        }
        let state = CsrfToken::new_random().secret().clone();
        self.session.write().await.last_state = Some(state.clone());
        Ok(Some(state))
    }

    async fn client_information(&self) -> AuthResult<Option<ClientInformation>> {
        Ok(self.session.read().await.client_information.clone())
    }

    async fn save_client_information(&self, information: ClientInformation) -> AuthResult<()> {
        self.session.write().await.client_information = Some(information);
        Ok(())
    }

    async fn tokens(&self) -> AuthResult<Option<OAuthTokens>> {
        Ok(self.session.read().await.tokens.clone())
    }

    async fn save_tokens(&self, tokens: OAuthTokens) -> AuthResult<()> {
        self.session.write().await.tokens = Some(tokens);
        Ok(())
    }

    async fn save_code_verifier(&self, code_verifier: String) -> AuthResult<()> {
        self.session.write().await.code_verifier = Some(code_verifier);
        Ok(())
    }

    async fn code_verifier(&self) -> AuthResult<String> {
        self.session
            .read()
            .await
            .code_verifier
            .clone()
            .ok_or_else(|| AuthError::CredentialState("Code verifier not found in session storage.".to_string()))
    }

    async fn redirect_to_authorization(&self, authorization_url: Url) -> AuthResult<()> {
        debug!(url = %authorization_url, "Recorded authorization redirect");
        self.session.write().await.last_redirect = Some(authorization_url);
        Ok(())
    }

    async fn invalidate_credentials(&self, scope: InvalidationScope) -> AuthResult<()> {
        debug!(scope = ?scope, "Invalidating credentials");
        let mut session = self.session.write().await;
        if matches!(scope, InvalidationScope::All | InvalidationScope::Tokens) {
            session.tokens = None;
        }
        if matches!(scope, InvalidationScope::All | InvalidationScope::Client) {
            session.client_information = None;
        }
        if matches!(scope, InvalidationScope::All | InvalidationScope::Verifier) {
            session.code_verifier = None;
        }
        Ok(())
    }

    fn client_authenticator(&self) -> Option<&dyn ClientAuthenticator> {
        self.client_authenticator.as_deref()
    }

    fn resource_validator(&self) -> Option<&dyn ResourceValidator> {
        self.resource_validator.as_deref()
    }
}
