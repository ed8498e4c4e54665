//! Bearer token validation
//!
//! The ingestion core assumes every caller is already authorized. This module is
//! the collaborator that decides that: HTTP middleware hands it the raw bearer
//! token and either gets an [`Identity`] back or rejects the request.
//!
//! Tokens are never held in plaintext; only their SHA-256 digests are kept.
//! An empty token set disables checking and every caller is anonymous.

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Authentication failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// No token supplied
    #[error("Missing bearer token")]
    MissingToken,

    /// Token supplied but not recognised
    #[error("Invalid bearer token")]
    InvalidToken,
}

/// The authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// Authentication is disabled
    Anonymous,
    /// Caller presented a known token; holds a short digest prefix for logs
    Token { fingerprint: String },
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Identity::Anonymous => write!(f, "anonymous"),
            Identity::Token { fingerprint } => write!(f, "token:{}", fingerprint),
        }
    }
}

/// Validates a bearer token into an identity
pub trait TokenValidator: Send + Sync {
    /// `token` is `None` when the request carried no usable Authorization header
    fn validate(&self, token: Option<&str>) -> Result<Identity, AuthError>;
}

/// Validator over a fixed set of configured tokens
#[derive(Debug, Clone, Default)]
pub struct StaticTokenValidator {
    digests: Vec<[u8; 32]>,
}

impl StaticTokenValidator {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let digests = tokens
            .into_iter()
            .filter(|t| !t.as_ref().is_empty())
            .map(|t| digest(t.as_ref()))
            .collect();
        Self { digests }
    }

    /// True when no tokens are configured
    pub fn is_disabled(&self) -> bool {
        self.digests.is_empty()
    }
}

impl TokenValidator for StaticTokenValidator {
    fn validate(&self, token: Option<&str>) -> Result<Identity, AuthError> {
        if self.is_disabled() {
            return Ok(Identity::Anonymous);
        }

        let token = token.filter(|t| !t.is_empty()).ok_or(AuthError::MissingToken)?;
        let provided = digest(token);

        // Scan every digest so timing does not reveal which entry matched
        let matched = self
            .digests
            .iter()
            .fold(false, |found, known| found | constant_time_eq(known, &provided));

        if matched {
            Ok(Identity::Token {
                fingerprint: hex_prefix(&provided, 4),
            })
        } else {
            Err(AuthError::InvalidToken)
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn parse_bearer(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") {
        Some(token.trim()).filter(|t| !t.is_empty())
    } else {
        None
    }
}

fn digest(token: &str) -> [u8; 32] {
    Sha256::digest(token.as_bytes()).into()
}

fn constant_time_eq(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn hex_prefix(bytes: &[u8], len: usize) -> String {
    bytes.iter().take(len).map(|b| format!("{:02x}", b)).collect()
}
