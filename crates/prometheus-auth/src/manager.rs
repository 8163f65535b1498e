//! Authentication Manager
//!
//! Drives one authorization attempt for a session:
//! discovery, registration if needed, then code exchange, refresh, or a new
//! authorization redirect. A classified OAuth failure on the first attempt
//! invalidates the matching credentials and reruns the whole sequence once.
//!
//! Each call re-discovers metadata. Calls for the same session must be
//! serialized by the caller.

use tracing::{debug, info, warn};
use url::Url;

use crate::config::{ClientConfig, ResourceDiscoveryPolicy};
use crate::discovery::{MetadataDiscovery, ProtectedResourceMetadata};
use crate::error::{AuthError, AuthResult};
use crate::oauth2::{
    AuthorizationParams, CodeExchange, DcrClient, RefreshExchange, TokenEndpoint,
    registration_endpoint, select_resource_url, start_authorization,
};
use crate::provider::CredentialProvider;
use crate::types::{ClientInformation, InvalidationScope};

/// Terminal state of an authorization attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Tokens were obtained and saved through the provider
    Authorized,
    /// The provider was asked to send the user to the authorization server
    Redirect,
}

/// Per-call inputs to [`AuthManager::authorize`]
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// Protected resource being accessed
    pub server_url: Url,
    /// Code returned to the redirect URI, if this call handles the callback
    pub authorization_code: Option<String>,
    /// Scope to request; falls back to the client metadata's scope
    pub scope: Option<String>,
    /// Protected resource metadata URL taken from a `WWW-Authenticate` challenge
    pub resource_metadata_url: Option<Url>,
}

impl AuthRequest {
    /// Authorize against `server_url`
    pub fn new(server_url: Url) -> Self {
        Self {
            server_url,
            authorization_code: None,
            scope: None,
            resource_metadata_url: None,
        }
    }

    /// Complete the flow with a code from the redirect callback
    pub fn with_authorization_code(mut self, code: impl Into<String>) -> Self {
        self.authorization_code = Some(code.into());
        self
    }

    /// Request a specific scope
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Skip well-known discovery and fetch resource metadata from `url`
    pub fn with_resource_metadata_url(mut self, url: Url) -> Self {
        self.resource_metadata_url = Some(url);
        self
    }
}

/// OAuth 2.1 authorization orchestrator
#[derive(Debug, Clone)]
pub struct AuthManager {
    http_client: reqwest::Client,
    discovery: MetadataDiscovery,
    config: ClientConfig,
}

impl AuthManager {
    /// Create a manager with an HTTP client built from `config`
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> AuthResult<Self> {
        let http_client = config.build_http_client()?;
        Ok(Self::with_http_client(config, http_client))
    }

    /// Create a manager on top of an existing HTTP client
    pub fn with_http_client(config: ClientConfig, http_client: reqwest::Client) -> Self {
        let discovery = MetadataDiscovery::new(http_client.clone())
            .with_protocol_version(config.protocol_version.clone());
        Self {
            http_client,
            discovery,
            config,
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Run the authorization sequence for one session.
    ///
    /// `invalid_client` and `unauthorized_client` invalidate all credentials,
    /// `invalid_grant` invalidates tokens; either way the sequence runs once
    /// more and that result is final.
    ///
    /// # Errors
    ///
    /// Any [`AuthError`] that is not recoverable, or any error on the retry.
    pub async fn authorize<P>(&self, provider: &P, request: &AuthRequest) -> AuthResult<AuthOutcome>
    where
        P: CredentialProvider + ?Sized,
    {
        let err = match self.run_flow(provider, request).await {
            Ok(outcome) => return Ok(outcome),
            Err(err) => err,
        };

        let Some(scope) = err.recovery() else {
            return Err(err);
        };

        warn!(
            server = %request.server_url,
            error = %err,
            invalidate = ?scope,
            "Authorization failed, invalidating credentials and retrying once"
        );
        provider.invalidate_credentials(scope).await?;
        self.run_flow(provider, request).await
    }

    async fn run_flow<P>(&self, provider: &P, request: &AuthRequest) -> AuthResult<AuthOutcome>
    where
        P: CredentialProvider + ?Sized,
    {
        let server_url = &request.server_url;

        let resource_metadata = self.discover_resource(request).await?;
        let authorization_server_url = match resource_metadata
            .as_ref()
            .and_then(ProtectedResourceMetadata::primary_authorization_server)
        {
            Some(issuer) => Url::parse(issuer).map_err(|e| AuthError::invalid_url(issuer, e))?,
            None => server_url.clone(),
        };

        let resource = select_resource_url(
            server_url,
            provider.resource_validator(),
            resource_metadata.as_ref(),
        )
        .await?;

        let metadata = self
            .discovery
            .discover_authorization_server(&authorization_server_url)
            .await?;

        let client_information = match provider.client_information().await? {
            Some(information) => information,
            None => {
                if request.authorization_code.is_some() {
                    return Err(AuthError::CredentialState(
                        "Existing OAuth client information is required when exchanging an authorization code"
                            .to_string(),
                    ));
                }
                self.register(provider, &authorization_server_url, metadata.as_ref())
                    .await?
            }
        };

        let token_endpoint =
            TokenEndpoint::new(&self.http_client, &authorization_server_url, metadata.as_ref())
                .with_authenticator(provider.client_authenticator());

        if let Some(code) = &request.authorization_code {
            let code_verifier = provider.code_verifier().await?;
            let tokens = token_endpoint
                .exchange_code(CodeExchange {
                    client_information: &client_information,
                    authorization_code: code,
                    code_verifier: &code_verifier,
                    redirect_uri: provider.redirect_url(),
                    resource: resource.as_ref(),
                })
                .await?;
            provider.save_tokens(tokens).await?;
            provider
                .invalidate_credentials(InvalidationScope::Verifier)
                .await?;
            info!(server = %server_url, "Authorization code exchanged");
            return Ok(AuthOutcome::Authorized);
        }

        let refresh_token = provider
            .tokens()
            .await?
            .and_then(|tokens| tokens.refresh_token);
        if let Some(refresh_token) = refresh_token {
            let refreshed = token_endpoint
                .refresh(RefreshExchange {
                    client_information: &client_information,
                    refresh_token: &refresh_token,
                    resource: resource.as_ref(),
                })
                .await;
            match refreshed {
                Ok(tokens) => {
                    provider.save_tokens(tokens).await?;
                    info!(server = %server_url, "Access token refreshed");
                    return Ok(AuthOutcome::Authorized);
                }
                Err(err) if err.is_refresh_recoverable() => {
                    warn!(error = %err, "Token refresh failed, starting a new authorization");
                }
                Err(err) => return Err(err),
            }
        }

        let state = provider.state().await?;
        let scope = request
            .scope
            .as_deref()
            .or(provider.client_metadata().scope.as_deref());

        let start = start_authorization(
            &authorization_server_url,
            metadata.as_ref(),
            AuthorizationParams {
                client_information: &client_information,
                redirect_url: provider.redirect_url(),
                scope,
                state: state.as_deref(),
                resource: resource.as_ref(),
            },
        )?;

        provider
            .save_code_verifier(start.pkce.into_verifier())
            .await?;
        debug!(url = %start.authorization_url, "Redirecting to authorization endpoint");
        provider
            .redirect_to_authorization(start.authorization_url)
            .await?;
        Ok(AuthOutcome::Redirect)
    }

    async fn discover_resource(
        &self,
        request: &AuthRequest,
    ) -> AuthResult<Option<ProtectedResourceMetadata>> {
        let discovered = self
            .discovery
            .discover_protected_resource(
                &request.server_url,
                request.resource_metadata_url.as_ref(),
            )
            .await;

        match discovered {
            Ok(metadata) => Ok(Some(metadata)),
            Err(err) if self.config.resource_discovery == ResourceDiscoveryPolicy::Lenient => {
                warn!(
                    server = %request.server_url,
                    error = %err,
                    "Protected resource metadata unavailable, using the server as its own authorization server"
                );
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn register<P>(
        &self,
        provider: &P,
        authorization_server_url: &Url,
        metadata: Option<&crate::discovery::AuthorizationServerMetadata>,
    ) -> AuthResult<ClientInformation>
    where
        P: CredentialProvider + ?Sized,
    {
        let endpoint = registration_endpoint(authorization_server_url, metadata)?;
        let information = DcrClient::new(self.http_client.clone(), endpoint)
            .register(provider.client_metadata())
            .await?;
        provider
            .save_client_information(information.clone())
            .await?;
        Ok(information)
    }
}
