//! Access tokens
//!
//! A [`Maker`] issues signed tokens carrying a [`Payload`] and verifies them
//! again. Verification never tells the caller *why* a token was rejected,
//! except for expiry: every structural or cryptographic failure collapses
//! into [`TokenError::InvalidToken`].

mod jwt;
mod payload;

pub use jwt::{JwtMaker, MIN_SECRET_KEY_SIZE};
pub use payload::Payload;

use chrono::Duration;
use thiserror::Error;

/// Errors returned by token creation and verification
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is invalid")]
    InvalidToken,

    #[error("token has expired")]
    ExpiredToken,

    #[error("invalid key size: must be at least {min} characters")]
    KeyTooShort { min: usize },

    #[error("failed to sign token: {0}")]
    Signing(String),

    #[error("failed to create token payload: {0}")]
    PayloadCreation(String),
}

/// Issues and verifies access tokens
///
/// Implementations hold no mutable state, so a single maker can be shared
/// across every request handler.
pub trait Maker: Send + Sync {
    /// Create a token for `username` that expires after `duration`
    fn create_token(
        &self,
        username: &str,
        duration: Duration,
    ) -> Result<(String, Payload), TokenError>;

    /// Check a token and return its payload if it is authentic and unexpired
    fn verify_token(&self, token: &str) -> Result<Payload, TokenError>;
}
