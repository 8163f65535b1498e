//! Resource server side of MCP authorization (RFC 9728)
//!
//! Shows the pieces a request handler needs:
//! 1. The `/.well-known/oauth-protected-resource` document
//! 2. Bearer extraction and verification
//! 3. Mapping a verification failure onto 401 or 503 with `WWW-Authenticate`

use prometheus_auth::server::{
    ProtectedResourceMetadataBuilder, challenge_for, extract_bearer_token,
};
use prometheus_auth::{BearerVerifier, VerifierConfig, VerifyError};
use tracing_subscriber::EnvFilter;

const RESOURCE: &str = "https://mcp.example.com/mcp";
const ISSUER: &str = "https://auth.example.com";
const METADATA_URL: &str = "https://mcp.example.com/.well-known/oauth-protected-resource/mcp";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into()))
        .init();

    println!("=== Protected Resource Server Example ===\n");

    let metadata = ProtectedResourceMetadataBuilder::new(RESOURCE, ISSUER)
        .with_scopes(["mcp:read", "mcp:write"])
        .with_resource_name("Example MCP server")
        .with_documentation("https://mcp.example.com/docs")
        .build()?;
    println!("1. {METADATA_URL}:");
    println!("{}\n", serde_json::to_string_pretty(&metadata)?);

    let verifier = BearerVerifier::new(VerifierConfig::new(ISSUER, RESOURCE))?;

    println!("2. Handling requests:");
    for header in ["Basic dXNlcjpwYXNz", "Bearer not-a-jwt"] {
        let result = match extract_bearer_token(header) {
            Ok(token) => verifier.verify(token).await,
            Err(e) => Err(e),
        };
        respond(header, result.map(|ctx| ctx.subject));
    }

    Ok(())
}

fn respond(header: &str, result: Result<String, VerifyError>) {
    println!("   Authorization: {header}");
    match result {
        Ok(subject) => println!("   -> 200 OK for {subject}\n"),
        Err(err) => {
            let (status, challenge) = challenge_for(&err, METADATA_URL);
            println!("   -> {status}");
            println!("   WWW-Authenticate: {challenge}\n");
        }
    }
}
