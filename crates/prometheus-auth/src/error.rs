//! Error taxonomy for the authorization engine and the bearer verifier
//!
//! Every failure carries an [`ErrorKind`] so that retry and recovery logic in
//! the orchestrator is an explicit `match` over kinds rather than a chain of
//! type tests.

use crate::types::InvalidationScope;
use http::StatusCode;
use std::fmt;
use thiserror::Error;

/// Result alias used throughout the client side of the crate
pub type AuthResult<T> = Result<T, AuthError>;

/// Standard OAuth 2.0 error codes (RFC 6749 §5.2, RFC 7591 §3.2.2, RFC 6750 §3.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OAuthErrorCode {
    /// `invalid_request`
    InvalidRequest,
    /// `invalid_client`
    InvalidClient,
    /// `invalid_grant`
    InvalidGrant,
    /// `unauthorized_client`
    UnauthorizedClient,
    /// `unsupported_grant_type`
    UnsupportedGrantType,
    /// `invalid_scope`
    InvalidScope,
    /// `access_denied`
    AccessDenied,
    /// `unsupported_response_type`
    UnsupportedResponseType,
    /// `server_error`
    ServerError,
    /// `temporarily_unavailable`
    TemporarilyUnavailable,
    /// `invalid_redirect_uri`
    InvalidRedirectUri,
    /// `invalid_client_metadata`
    InvalidClientMetadata,
    /// `invalid_token`
    InvalidToken,
    /// `insufficient_scope`
    InsufficientScope,
    /// `unsupported_token_type`
    UnsupportedTokenType,
}

impl OAuthErrorCode {
    /// Wire representation of the code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::InvalidScope => "invalid_scope",
            Self::AccessDenied => "access_denied",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::ServerError => "server_error",
            Self::TemporarilyUnavailable => "temporarily_unavailable",
            Self::InvalidRedirectUri => "invalid_redirect_uri",
            Self::InvalidClientMetadata => "invalid_client_metadata",
            Self::InvalidToken => "invalid_token",
            Self::InsufficientScope => "insufficient_scope",
            Self::UnsupportedTokenType => "unsupported_token_type",
        }
    }

    /// Parse a wire code, returning `None` for codes outside the standard set
    pub fn from_code(code: &str) -> Option<Self> {
        let parsed = match code {
            "invalid_request" => Self::InvalidRequest,
            "invalid_client" => Self::InvalidClient,
            "invalid_grant" => Self::InvalidGrant,
            "unauthorized_client" => Self::UnauthorizedClient,
            "unsupported_grant_type" => Self::UnsupportedGrantType,
            "invalid_scope" => Self::InvalidScope,
            "access_denied" => Self::AccessDenied,
            "unsupported_response_type" => Self::UnsupportedResponseType,
            "server_error" => Self::ServerError,
            "temporarily_unavailable" => Self::TemporarilyUnavailable,
            "invalid_redirect_uri" => Self::InvalidRedirectUri,
            "invalid_client_metadata" => Self::InvalidClientMetadata,
            "invalid_token" => Self::InvalidToken,
            "insufficient_scope" => Self::InsufficientScope,
            "unsupported_token_type" => Self::UnsupportedTokenType,
            _ => return None,
        };
        Some(parsed)
    }
}

impl fmt::Display for OAuthErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured OAuth error document returned by a token or registration endpoint
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct OAuthProtocolError {
    /// Classified error code
    pub code: OAuthErrorCode,
    /// `error_description`, if the server sent one
    pub description: Option<String>,
    /// `error_uri`, if the server sent one
    pub uri: Option<String>,
}

impl OAuthProtocolError {
    /// Create an error with just a code
    pub fn new(code: OAuthErrorCode) -> Self {
        Self {
            code,
            description: None,
            uri: None,
        }
    }

    /// Attach a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl fmt::Display for OAuthProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(description) if !description.is_empty() => {
                write!(f, "{}: {}", self.code, description)
            }
            _ => write!(f, "{}", self.code),
        }
    }
}

/// Classification of an [`AuthError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A well-known metadata endpoint was missing or unreachable
    DiscoveryUnavailable,
    /// The server lacks a capability the flow requires
    ProtocolMismatch,
    /// Protected resource metadata named an incompatible resource
    ResourceMismatch,
    /// The server returned a structured OAuth error
    OAuthProtocol(OAuthErrorCode),
    /// Non-OAuth error body or schema-invalid success body
    MalformedServerResponse,
    /// Network-level failure
    Transport,
    /// A URL could not be parsed or resolved
    InvalidUrl,
    /// Invalid construction parameters
    Configuration,
    /// The credential lifecycle was violated by the caller
    CredentialStateViolation,
    /// The credential provider failed to load or persist
    Storage,
}

/// Errors produced by discovery, registration, token exchange and orchestration
#[derive(Debug, Error)]
pub enum AuthError {
    /// Well-known endpoint 404 or unreachable
    #[error("{0}")]
    DiscoveryUnavailable(String),

    /// Server does not support a required grant type, challenge method or endpoint
    #[error("Incompatible auth server: {0}")]
    ProtocolMismatch(String),

    /// Protected resource metadata is incompatible with the requested server
    #[error("{0}")]
    ResourceMismatch(String),

    /// Structured OAuth error from the authorization server
    #[error(transparent)]
    OAuth(#[from] OAuthProtocolError),

    /// Unparseable error body or schema-invalid success body
    #[error("HTTP {status}: {reason} Raw body: {body}")]
    MalformedResponse {
        /// HTTP status of the response
        status: StatusCode,
        /// What failed to parse
        reason: String,
        /// Raw body for diagnostics
        body: String,
    },

    /// HTTP transport failure
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parse or resolution failure
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The offending input
        url: String,
        /// Parser message
        reason: String,
    },

    /// Invalid construction parameters
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Caller sequencing bug, e.g. a code verifier that was never stored
    #[error("{0}")]
    CredentialState(String),

    /// Credential provider storage failure
    #[error("Credential storage error: {0}")]
    Storage(String),
}

impl AuthError {
    /// Build an [`AuthError::InvalidUrl`] from a parse failure
    pub(crate) fn invalid_url(url: impl Into<String>, err: url::ParseError) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: err.to_string(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DiscoveryUnavailable(_) => ErrorKind::DiscoveryUnavailable,
            Self::ProtocolMismatch(_) => ErrorKind::ProtocolMismatch,
            Self::ResourceMismatch(_) => ErrorKind::ResourceMismatch,
            Self::OAuth(e) => ErrorKind::OAuthProtocol(e.code),
            Self::MalformedResponse { .. } => ErrorKind::MalformedServerResponse,
            Self::Transport(_) => ErrorKind::Transport,
            Self::InvalidUrl { .. } => ErrorKind::InvalidUrl,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::CredentialState(_) => ErrorKind::CredentialStateViolation,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// The OAuth error code, if this is a structured OAuth error
    pub fn oauth_code(&self) -> Option<OAuthErrorCode> {
        match self {
            Self::OAuth(e) => Some(e.code),
            _ => None,
        }
    }

    /// Credentials the orchestrator must invalidate before its single retry.
    ///
    /// `None` means the error propagates without a retry.
    pub fn recovery(&self) -> Option<InvalidationScope> {
        match self.kind() {
            ErrorKind::OAuthProtocol(
                OAuthErrorCode::InvalidClient | OAuthErrorCode::UnauthorizedClient,
            ) => Some(InvalidationScope::All),
            ErrorKind::OAuthProtocol(OAuthErrorCode::InvalidGrant) => {
                Some(InvalidationScope::Tokens)
            }
            _ => None,
        }
    }

    /// Whether a failed refresh should fall through to a new authorization flow.
    ///
    /// Recognized OAuth errors other than `server_error` surface to the caller.
    pub fn is_refresh_recoverable(&self) -> bool {
        !matches!(self.kind(), ErrorKind::OAuthProtocol(code) if code != OAuthErrorCode::ServerError)
    }
}

/// Bearer verification failure, split by who is at fault
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// Malformed token, missing claim, bad signature, expired, unknown `kid`
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// JWKS endpoint unreachable or erroring
    #[error("Signing key server unavailable: {0}")]
    KeyServerUnavailable(String),
}

impl VerifyError {
    /// `true` when the presented token is at fault
    pub fn is_client_fault(&self) -> bool {
        matches!(self, Self::InvalidToken(_))
    }

    /// HTTP status the request handler should respond with
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            Self::KeyServerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}
