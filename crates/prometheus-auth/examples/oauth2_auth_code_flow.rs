//! OAuth 2.1 Authorization Code Flow with PKCE
//!
//! Runs the AuthManager twice against a protected resource:
//! 1. Discovery, dynamic registration, then a redirect to the authorization server
//! 2. With the code pasted back from the callback, the token exchange
//!
//! ```text
//! cargo run --example oauth2_auth_code_flow -- https://mcp.example.com/mcp
//! ```

use prometheus_auth::{
    AuthManager, AuthOutcome, AuthRequest, ClientConfig, ClientMetadata, CredentialProvider,
    MemoryCredentialProvider,
};
use std::io::BufRead;
use tracing_subscriber::EnvFilter;
use url::Url;

const REDIRECT_URL: &str = "http://localhost:8080/callback";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let server_url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://localhost:3000/mcp".to_string());
    let server_url = Url::parse(&server_url)?;

    let manager = AuthManager::new(ClientConfig::default().with_protocol_version("2025-06-18"))?;
    let provider = MemoryCredentialProvider::new(
        ClientMetadata::public_client("prometheus-auth example", REDIRECT_URL),
        REDIRECT_URL,
    );

    println!("=== OAuth 2.1 Authorization Code Flow ===\n");

    let request = AuthRequest::new(server_url.clone());
    if manager.authorize(&provider, &request).await? == AuthOutcome::Redirect
        && let Some(url) = provider.last_redirect().await
    {
        println!("1. Open in a browser:\n   {url}\n");
    }

    println!("2. Paste the `code` query parameter from the callback:");
    let mut code = String::new();
    std::io::stdin().lock().read_line(&mut code)?;

    let request = AuthRequest::new(server_url).with_authorization_code(code.trim());
    let outcome = manager.authorize(&provider, &request).await?;
    println!("\n3. Outcome: {outcome:?}");

    if let Some(tokens) = provider.tokens().await? {
        println!("   token_type: {}", tokens.token_type);
        println!("   expires_in: {:?}", tokens.expires_in);
        println!("   refresh token issued: {}", tokens.refresh_token.is_some());
        if let Some(subject) = tokens.subject() {
            println!("   subject: {subject}");
        }
    }

    Ok(())
}
