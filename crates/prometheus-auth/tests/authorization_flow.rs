//! End-to-end authorization flows through the AuthManager
//!
//! Tests cover:
//! - Fresh session: discovery, registration, redirect
//! - Callback: code exchange with the stored PKCE verifier
//! - Refresh with refresh-token preservation
//! - Recovery: invalid_grant and invalid_client retry exactly once
//! - Refresh failures that fall through versus those that surface
//! - Client authentication hooks and methods
//! - PKCE verifier retention across failed code exchanges
//! - Resource metadata located through a challenge URL

mod common;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use common::{MockAuthServer, REDIRECT_URL, public_provider};
use prometheus_auth::discovery::AuthorizationServerMetadata;
use prometheus_auth::oauth2::{ClientAuthenticator, TokenRequest, s256_challenge};
use prometheus_auth::{
    AuthError, AuthManager, AuthOutcome, AuthRequest, AuthResult, ClientConfig,
    ClientInformation, CredentialProvider, ErrorKind, OAuthErrorCode, OAuthTokens,
    ResourceDiscoveryPolicy,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;
use wiremock::{
    Mock, ResponseTemplate,
    matchers::{body_string_contains, header, method, path},
};

fn manager() -> AuthManager {
    AuthManager::new(ClientConfig::default()).expect("manager")
}

fn query(url: &Url) -> HashMap<String, String> {
    url.query_pairs().into_owned().collect()
}

async fn token_requests(mock: &MockAuthServer) -> Vec<HashMap<String, String>> {
    mock.server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == "/token")
        .map(|request| {
            url::form_urlencoded::parse(&request.body)
                .into_owned()
                .collect()
        })
        .collect()
}

fn existing_client() -> ClientInformation {
    ClientInformation::new("existing-client")
}

fn stale_tokens() -> OAuthTokens {
    OAuthTokens::bearer("expired-access").with_refresh_token("refresh-1")
}

#[tokio::test]
async fn test_fresh_session_registers_and_redirects_then_exchanges_code() {
    // GIVEN: a resource server naming an authorization server with DCR
    let mock = MockAuthServer::start().await;
    mock.mock_protected_resource_metadata().await;
    mock.mock_authorization_server_metadata().await;
    mock.mock_registration("dcr-client", 1).await;
    mock.mock_token_success("authorization_code", "access-1", Some("refresh-1"))
        .await;

    let manager = manager();
    let provider = public_provider();
    let server_url = mock.url("/mcp");

    // WHEN: authorizing with no stored credentials
    let outcome = manager
        .authorize(&provider, &AuthRequest::new(server_url.clone()))
        .await
        .unwrap();

    // THEN: the user is redirected and the session holds client info and a verifier
    assert_eq!(outcome, AuthOutcome::Redirect);
    assert_eq!(
        provider.client_information().await.unwrap().unwrap().client_id,
        "dcr-client"
    );
    assert!(provider.has_code_verifier().await);

    let redirect = provider.last_redirect().await.expect("redirect recorded");
    assert_eq!(redirect.path(), "/authorize");
    let params = query(&redirect);
    assert_eq!(params["response_type"], "code");
    assert_eq!(params["client_id"], "dcr-client");
    assert_eq!(params["code_challenge_method"], "S256");
    assert_eq!(params["redirect_uri"], REDIRECT_URL);
    assert_eq!(params["scope"], "mcp:read");
    assert_eq!(params["resource"], server_url.as_str());
    assert_eq!(Some(params["state"].clone()), provider.last_state().await);

    // WHEN: the callback delivers the code
    let outcome = manager
        .authorize(
            &provider,
            &AuthRequest::new(server_url.clone()).with_authorization_code("auth-code-1"),
        )
        .await
        .unwrap();

    // THEN: tokens are stored and the verifier is consumed
    assert_eq!(outcome, AuthOutcome::Authorized);
    let tokens = provider.tokens().await.unwrap().unwrap();
    assert_eq!(tokens.access_token, "access-1");
    assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-1"));
    assert!(!provider.has_code_verifier().await);
    assert!(matches!(
        provider.code_verifier().await,
        Err(AuthError::CredentialState(_))
    ));

    // AND: the exchange carried the verifier matching the redirect's challenge
    let requests = token_requests(&mock).await;
    assert_eq!(requests.len(), 1);
    let exchange = &requests[0];
    assert_eq!(exchange["grant_type"], "authorization_code");
    assert_eq!(exchange["code"], "auth-code-1");
    assert_eq!(exchange["client_id"], "dcr-client");
    assert_eq!(exchange["redirect_uri"], REDIRECT_URL);
    assert_eq!(exchange["resource"], server_url.as_str());
    assert_eq!(s256_challenge(&exchange["code_verifier"]), params["code_challenge"]);
}

#[tokio::test]
async fn test_refresh_keeps_refresh_token_when_server_omits_it() {
    // GIVEN: stored tokens and a server that refreshes without rotating
    let mock = MockAuthServer::start().await;
    mock.mock_authorization_server_metadata().await;
    mock.mock_registration("unused", 0).await;
    mock.mock_token_success("refresh_token", "access-2", None).await;

    let provider = public_provider()
        .with_client_information(existing_client())
        .with_tokens(stale_tokens());

    // WHEN: authorizing
    let outcome = manager()
        .authorize(&provider, &AuthRequest::new(mock.url("/mcp")))
        .await
        .unwrap();

    // THEN: the new access token is stored with the original refresh token
    assert_eq!(outcome, AuthOutcome::Authorized);
    let tokens = provider.tokens().await.unwrap().unwrap();
    assert_eq!(tokens.access_token, "access-2");
    assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-1"));

    // AND: no resource indicator without protected resource metadata
    let requests = token_requests(&mock).await;
    assert_eq!(requests[0]["refresh_token"], "refresh-1");
    assert!(!requests[0].contains_key("resource"));
}

#[tokio::test]
async fn test_invalid_grant_on_refresh_restarts_authorization() {
    // GIVEN: a refresh token the server no longer accepts
    let mock = MockAuthServer::start().await;
    mock.mock_authorization_server_metadata().await;
    mock.mock_registration("unused", 0).await;
    mock.mock_token_error("refresh_token", 400, "invalid_grant").await;

    let provider = public_provider()
        .with_client_information(existing_client())
        .with_tokens(stale_tokens());

    // WHEN: authorizing
    let outcome = manager()
        .authorize(&provider, &AuthRequest::new(mock.url("/mcp")))
        .await
        .unwrap();

    // THEN: tokens are dropped, the client is kept, and a new flow starts
    assert_eq!(outcome, AuthOutcome::Redirect);
    assert!(provider.tokens().await.unwrap().is_none());
    assert_eq!(
        provider.client_information().await.unwrap().unwrap().client_id,
        "existing-client"
    );
    let redirect = provider.last_redirect().await.unwrap();
    assert_eq!(query(&redirect)["client_id"], "existing-client");
    assert_eq!(token_requests(&mock).await.len(), 1);
}

#[tokio::test]
async fn test_invalid_client_reregisters_and_retries_once() {
    // GIVEN: a stored client the server has forgotten
    let mock = MockAuthServer::start().await;
    mock.mock_authorization_server_metadata().await;
    mock.mock_registration("fresh-client", 1).await;
    mock.mock_token_error("refresh_token", 401, "invalid_client").await;

    let provider = public_provider()
        .with_client_information(existing_client())
        .with_tokens(stale_tokens());

    // WHEN: authorizing
    let outcome = manager()
        .authorize(&provider, &AuthRequest::new(mock.url("/mcp")))
        .await
        .unwrap();

    // THEN: everything was invalidated and the retry registered a new client
    assert_eq!(outcome, AuthOutcome::Redirect);
    assert!(provider.tokens().await.unwrap().is_none());
    assert_eq!(
        provider.client_information().await.unwrap().unwrap().client_id,
        "fresh-client"
    );
}

#[tokio::test]
async fn test_failure_on_retry_propagates() {
    // GIVEN: invalid_client on refresh, then registration is refused
    let mock = MockAuthServer::start().await;
    mock.mock_authorization_server_metadata().await;
    mock.mock_token_error("refresh_token", 401, "invalid_client").await;
    Mock::given(method("POST"))
        .and(path("/register"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_client_metadata",
            "error_description": "redirect_uris not allowed",
        })))
        .expect(1)
        .mount(&mock.server)
        .await;

    let provider = public_provider()
        .with_client_information(existing_client())
        .with_tokens(stale_tokens());

    // WHEN: authorizing
    let err = manager()
        .authorize(&provider, &AuthRequest::new(mock.url("/mcp")))
        .await
        .unwrap_err();

    // THEN: the second failure surfaces and nothing runs a third time
    assert_eq!(err.oauth_code(), Some(OAuthErrorCode::InvalidClientMetadata));
    assert_eq!(token_requests(&mock).await.len(), 1);
}

#[tokio::test]
async fn test_refresh_server_error_falls_through_to_new_flow() {
    // GIVEN: the token endpoint is having a bad day
    let mock = MockAuthServer::start().await;
    mock.mock_authorization_server_metadata().await;
    mock.mock_token_error("refresh_token", 503, "server_error").await;

    let provider = public_provider()
        .with_client_information(existing_client())
        .with_tokens(stale_tokens());

    // WHEN: authorizing
    let outcome = manager()
        .authorize(&provider, &AuthRequest::new(mock.url("/mcp")))
        .await
        .unwrap();

    // THEN: a new authorization starts without invalidating anything
    assert_eq!(outcome, AuthOutcome::Redirect);
    assert!(provider.tokens().await.unwrap().is_some());
    assert_eq!(token_requests(&mock).await.len(), 1);
}

#[tokio::test]
async fn test_other_oauth_refresh_errors_surface_without_retry() {
    // GIVEN: a refresh rejected with invalid_scope
    let mock = MockAuthServer::start().await;
    mock.mock_authorization_server_metadata().await;
    mock.mock_token_error("refresh_token", 400, "invalid_scope").await;

    let provider = public_provider()
        .with_client_information(existing_client())
        .with_tokens(stale_tokens());

    // WHEN: authorizing
    let err = manager()
        .authorize(&provider, &AuthRequest::new(mock.url("/mcp")))
        .await
        .unwrap_err();

    // THEN: the caller sees the OAuth error and no redirect happened
    assert_eq!(err.kind(), ErrorKind::OAuthProtocol(OAuthErrorCode::InvalidScope));
    assert!(provider.last_redirect().await.is_none());
    assert_eq!(token_requests(&mock).await.len(), 1);
}

#[tokio::test]
async fn test_code_without_client_information_is_a_sequencing_error() {
    // GIVEN: a callback for a session that never registered
    let mock = MockAuthServer::start().await;
    mock.mock_authorization_server_metadata().await;
    mock.mock_registration("unused", 0).await;

    // WHEN: exchanging the code
    let err = manager()
        .authorize(
            &public_provider(),
            &AuthRequest::new(mock.url("/mcp")).with_authorization_code("code"),
        )
        .await
        .unwrap_err();

    // THEN: the lifecycle violation is reported
    assert_eq!(err.kind(), ErrorKind::CredentialStateViolation);
}

#[tokio::test]
async fn test_strict_policy_surfaces_missing_resource_metadata() {
    // GIVEN: no protected resource metadata and a strict manager
    let mock = MockAuthServer::start().await;
    mock.mock_authorization_server_metadata().await;
    let manager = AuthManager::new(
        ClientConfig::default().with_resource_discovery(ResourceDiscoveryPolicy::Strict),
    )
    .unwrap();

    // WHEN: authorizing
    let err = manager
        .authorize(&public_provider(), &AuthRequest::new(mock.url("/mcp")))
        .await
        .unwrap_err();

    // THEN: discovery failure is fatal
    assert_eq!(err.kind(), ErrorKind::DiscoveryUnavailable);
}

#[tokio::test]
async fn test_confidential_client_uses_basic_auth() {
    // GIVEN: a client with a secret and a server offering client_secret_basic
    let mock = MockAuthServer::start().await;
    mock.mock_authorization_server_metadata().await;
    let credentials = STANDARD.encode("conf-client:s3cret");
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(header("authorization", format!("Basic {credentials}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-3",
            "token_type": "Bearer",
            "refresh_token": "refresh-2",
        })))
        .expect(1)
        .mount(&mock.server)
        .await;

    let provider = public_provider()
        .with_client_information(ClientInformation::new("conf-client").with_secret("s3cret"))
        .with_tokens(stale_tokens());

    // WHEN: authorizing
    let outcome = manager()
        .authorize(&provider, &AuthRequest::new(mock.url("/mcp")))
        .await
        .unwrap();

    // THEN: the rotated refresh token replaces the old one
    assert_eq!(outcome, AuthOutcome::Authorized);
    let tokens = provider.tokens().await.unwrap().unwrap();
    assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-2"));
    assert!(!token_requests(&mock).await[0].contains_key("client_secret"));
}

struct AssertionAuthenticator;

#[async_trait]
impl ClientAuthenticator for AssertionAuthenticator {
    async fn authenticate(
        &self,
        request: &mut TokenRequest,
        _authorization_server_url: &Url,
        _metadata: Option<&AuthorizationServerMetadata>,
    ) -> AuthResult<()> {
        request.set_param("client_assertion", "signed-assertion");
        Ok(())
    }
}

#[tokio::test]
async fn test_custom_authenticator_replaces_method_selection() {
    // GIVEN: a provider with its own client authentication
    let mock = MockAuthServer::start().await;
    mock.mock_authorization_server_metadata().await;
    mock.mock_token_success("refresh_token", "access-4", None).await;

    let provider = public_provider()
        .with_client_information(existing_client())
        .with_tokens(stale_tokens())
        .with_client_authenticator(Arc::new(AssertionAuthenticator));

    // WHEN: authorizing
    manager()
        .authorize(&provider, &AuthRequest::new(mock.url("/mcp")))
        .await
        .unwrap();

    // THEN: only the hook's credentials were sent
    let requests = token_requests(&mock).await;
    assert_eq!(requests[0]["client_assertion"], "signed-assertion");
    assert!(!requests[0].contains_key("client_id"));
}

#[tokio::test]
async fn test_invalid_grant_on_code_exchange_reaches_caller() {
    // GIVEN: a callback whose code the server has already burned
    let mock = MockAuthServer::start().await;
    mock.mock_authorization_server_metadata().await;
    mock.mock_registration("unused", 0).await;
    mock.mock_token_error("authorization_code", 400, "invalid_grant")
        .await;

    let provider = public_provider().with_client_information(existing_client());
    provider
        .save_code_verifier("stored-verifier".to_string())
        .await
        .unwrap();

    // WHEN: exchanging the code
    let err = manager()
        .authorize(
            &provider,
            &AuthRequest::new(mock.url("/mcp")).with_authorization_code("expired-code"),
        )
        .await
        .unwrap_err();

    // THEN: the server's error surfaces after exactly one retry
    assert_eq!(err.kind(), ErrorKind::OAuthProtocol(OAuthErrorCode::InvalidGrant));
    let requests = token_requests(&mock).await;
    assert_eq!(requests.len(), 2);
    assert!(
        requests
            .iter()
            .all(|request| request["code_verifier"] == "stored-verifier")
    );
}

#[tokio::test]
async fn test_verifier_survives_failed_exchange() {
    // GIVEN: a token endpoint that fails once with a gateway page, then recovers
    let mock = MockAuthServer::start().await;
    mock.mock_authorization_server_metadata().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .up_to_n_times(1)
        .mount(&mock.server)
        .await;
    mock.mock_token_success("authorization_code", "access-5", None)
        .await;

    let provider = public_provider().with_client_information(existing_client());
    provider
        .save_code_verifier("stored-verifier".to_string())
        .await
        .unwrap();
    let request = AuthRequest::new(mock.url("/mcp")).with_authorization_code("code-5");

    // WHEN: the first exchange fails
    let err = manager().authorize(&provider, &request).await.unwrap_err();

    // THEN: the verifier is still there for another attempt
    assert_eq!(err.kind(), ErrorKind::MalformedServerResponse);
    assert!(provider.has_code_verifier().await);

    // WHEN: the callback is replayed
    let outcome = manager().authorize(&provider, &request).await.unwrap();

    // THEN: the exchange completes and only then is the verifier discarded
    assert_eq!(outcome, AuthOutcome::Authorized);
    assert!(!provider.has_code_verifier().await);
    let requests = token_requests(&mock).await;
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1]["code_verifier"], "stored-verifier");
}

#[tokio::test]
async fn test_challenge_metadata_url_drives_discovery() {
    // GIVEN: resource metadata only at the URL a WWW-Authenticate challenge named
    let mock = MockAuthServer::start().await;
    Mock::given(method("GET"))
        .and(path("/custom/resource-metadata"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resource": format!("{}/mcp", mock.uri()),
            "authorization_servers": [mock.uri()],
        })))
        .expect(1)
        .mount(&mock.server)
        .await;
    mock.mock_authorization_server_metadata().await;
    mock.mock_registration("challenge-client", 1).await;

    let provider = public_provider();
    let server_url = mock.url("/mcp");
    let request = AuthRequest::new(server_url.clone())
        .with_resource_metadata_url(mock.url("/custom/resource-metadata"));

    // WHEN: authorizing
    let outcome = manager().authorize(&provider, &request).await.unwrap();

    // THEN: well-known resource discovery is skipped and the resource is sent
    assert_eq!(outcome, AuthOutcome::Redirect);
    let paths = mock.requested_paths().await;
    assert!(!paths.iter().any(|p| p.starts_with("/.well-known/oauth-protected-resource")));
    let redirect = provider.last_redirect().await.unwrap();
    assert_eq!(query(&redirect)["client_id"], "challenge-client");
    assert_eq!(query(&redirect)["resource"], server_url.as_str());
}

#[tokio::test]
async fn test_registration_posts_client_metadata_without_credentials() {
    // GIVEN: open dynamic registration
    let mock = MockAuthServer::start().await;
    mock.mock_authorization_server_metadata().await;
    mock.mock_registration("open-client", 1).await;

    // WHEN: a fresh session authorizes
    manager()
        .authorize(&public_provider(), &AuthRequest::new(mock.url("/mcp")))
        .await
        .unwrap();

    // THEN: the client metadata is the JSON body and no credential is attached
    let requests = mock.server.received_requests().await.unwrap_or_default();
    let registration = requests
        .iter()
        .find(|request| request.url.path() == "/register")
        .expect("registration request");
    assert!(!registration.headers.contains_key("authorization"));
    let body: serde_json::Value = serde_json::from_slice(&registration.body).unwrap();
    assert_eq!(body["client_name"], "Integration Test");
    assert_eq!(body["redirect_uris"], json!([REDIRECT_URL]));
    assert_eq!(body["token_endpoint_auth_method"], "none");
}
