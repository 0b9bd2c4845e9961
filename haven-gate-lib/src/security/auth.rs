use ahash::AHashMap;
use http::HeaderMap;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

use crate::config::TokenEntry;

/// Role claim carried by a token
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Therapist,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Therapist => "therapist",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verified claims of a presented token. Lives for one request only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub subject: String,
    pub role: Role,
    /// Unix seconds
    pub expires_at: u64,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("no token presented")]
    Missing,

    #[error("token not recognised")]
    Invalid,

    #[error("token expired")]
    Expired,
}

impl AuthError {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthError::Missing => "missing",
            AuthError::Invalid => "invalid",
            AuthError::Expired => "expired",
        }
    }
}

/// Checks a presented token and returns its claims.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str, now_secs: u64) -> Result<AuthToken, AuthError>;
}

/// Verifier over a fixed set of issued tokens.
///
/// Only SHA-256 digests of the tokens are held. A presented token is hashed
/// and looked up by digest.
#[derive(Debug, Default)]
pub struct StaticTokenVerifier {
    tokens: AHashMap<String, AuthToken>,
}

impl StaticTokenVerifier {
    pub fn new(entries: &[TokenEntry]) -> Self {
        let tokens = entries
            .iter()
            .map(|entry| {
                (
                    entry.sha256.to_ascii_lowercase(),
                    AuthToken {
                        subject: entry.subject.clone(),
                        role: entry.role,
                        expires_at: entry.expires_at,
                    },
                )
            })
            .collect();
        Self { tokens }
    }

    /// Lowercase hex SHA-256 of `token`, as stored in config.
    pub fn digest(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl TokenVerifier for StaticTokenVerifier {
    fn verify(&self, token: &str, now_secs: u64) -> Result<AuthToken, AuthError> {
        let claims = self.tokens.get(&Self::digest(token)).ok_or(AuthError::Invalid)?;
        if claims.expires_at <= now_secs {
            return Err(AuthError::Expired);
        }
        Ok(claims.clone())
    }
}

/// Token presented with a request: `Authorization: Bearer <token>` first,
/// then the session cookie named `cookie_name`.
pub fn extract_token<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    let bearer = headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|token| !token.is_empty());
    if bearer.is_some() {
        return bearer;
    }

    headers
        .get_all(http::header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}
