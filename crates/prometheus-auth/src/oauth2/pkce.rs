//! PKCE (RFC 7636) verifier/challenge generation
//!
//! Only the `S256` method is produced. The verifier is drawn from the
//! `oauth2` crate's CSPRNG-backed generator.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use oauth2::PkceCodeChallenge;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{AuthError, AuthResult};

/// The only challenge method this crate sends
pub const CODE_CHALLENGE_METHOD: &str = "S256";

/// Minimum verifier length (RFC 7636 §4.1)
pub const MIN_VERIFIER_LEN: usize = 43;

/// Maximum verifier length (RFC 7636 §4.1)
pub const MAX_VERIFIER_LEN: usize = 128;

/// A PKCE verifier and its S256 challenge
#[derive(Clone, PartialEq, Eq)]
pub struct PkcePair {
    code_verifier: String,
    code_challenge: String,
}

impl PkcePair {
    /// Generate a fresh pair
    pub fn generate() -> Self {
        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
        Self {
            code_verifier: verifier.secret().to_string(),
            code_challenge: challenge.as_str().to_string(),
        }
    }

    /// Rebuild a pair from a stored verifier
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CredentialState`] if the verifier is not 43-128
    /// unreserved characters.
    pub fn from_verifier(code_verifier: impl Into<String>) -> AuthResult<Self> {
        let code_verifier = code_verifier.into();
        if !is_valid_verifier(&code_verifier) {
            return Err(AuthError::CredentialState(
                "PKCE code verifier must be 43-128 unreserved characters".to_string(),
            ));
        }
        let code_challenge = s256_challenge(&code_verifier);
        Ok(Self {
            code_verifier,
            code_challenge,
        })
    }

    /// The secret verifier, sent at code exchange
    pub fn code_verifier(&self) -> &str {
        &self.code_verifier
    }

    /// The challenge, sent on the authorization request
    pub fn code_challenge(&self) -> &str {
        &self.code_challenge
    }

    /// Consume the pair, keeping only the verifier for storage
    pub fn into_verifier(self) -> String {
        self.code_verifier
    }
}

impl fmt::Debug for PkcePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PkcePair")
            .field("code_verifier", &"[REDACTED]")
            .field("code_challenge", &self.code_challenge)
            .finish()
    }
}

/// `base64url(sha256(verifier))` without padding
pub fn s256_challenge(code_verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()))
}

/// Length and alphabet check for a code verifier
pub fn is_valid_verifier(code_verifier: &str) -> bool {
    (MIN_VERIFIER_LEN..=MAX_VERIFIER_LEN).contains(&code_verifier.len())
        && code_verifier
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'))
}
