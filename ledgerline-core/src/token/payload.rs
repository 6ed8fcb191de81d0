//! Token payload (claims)

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::TokenError;

/// Claims embedded in an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub id: Uuid,
    pub username: String,
    pub issued_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
}

impl Payload {
    /// Create a payload for `username` valid for `duration` from now
    ///
    /// A negative duration yields an already-expired payload.
    pub fn new(username: &str, duration: Duration) -> Result<Self, TokenError> {
        let mut bytes = [0u8; 16];
        rand::thread_rng()
            .try_fill_bytes(&mut bytes)
            .map_err(|e| TokenError::PayloadCreation(e.to_string()))?;
        let id = uuid::Builder::from_random_bytes(bytes).into_uuid();

        let issued_at = Utc::now();
        Ok(Self {
            id,
            username: username.to_string(),
            issued_at,
            expired_at: issued_at + duration,
        })
    }

    /// Check expiry against the current time
    pub fn valid(&self) -> Result<(), TokenError> {
        if Utc::now() > self.expired_at {
            return Err(TokenError::ExpiredToken);
        }
        Ok(())
    }
}
