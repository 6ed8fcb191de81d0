//! JSON Web Token maker (HMAC-SHA family)

use std::fmt;

use chrono::Duration;
use jsonwebtoken::{
    decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use tracing::debug;

use super::{Maker, Payload, TokenError};

/// Shortest symmetric secret accepted by [`JwtMaker::new`]
pub const MIN_SECRET_KEY_SIZE: usize = 32;

/// Algorithms a token may declare; all share the one symmetric secret
const ALLOWED_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Signing algorithm for newly issued tokens
const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Token maker signing with a symmetric secret key
pub struct JwtMaker {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtMaker {
    /// Create a maker, rejecting secrets shorter than [`MIN_SECRET_KEY_SIZE`]
    pub fn new(secret_key: &str) -> Result<Self, TokenError> {
        if secret_key.len() < MIN_SECRET_KEY_SIZE {
            return Err(TokenError::KeyTooShort {
                min: MIN_SECRET_KEY_SIZE,
            });
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret_key.as_bytes()),
        })
    }

    /// Hand out the verification key only for an allow-listed algorithm
    fn key_for(&self, header: &Header) -> Result<&DecodingKey, TokenError> {
        if !ALLOWED_ALGORITHMS.contains(&header.alg) {
            debug!(alg = ?header.alg, "rejecting token with unexpected signing algorithm");
            return Err(TokenError::InvalidToken);
        }
        Ok(&self.decoding_key)
    }
}

impl fmt::Debug for JwtMaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtMaker").finish_non_exhaustive()
    }
}

impl Maker for JwtMaker {
    fn create_token(
        &self,
        username: &str,
        duration: Duration,
    ) -> Result<(String, Payload), TokenError> {
        let payload = Payload::new(username, duration)?;

        let token = encode(&Header::new(SIGNING_ALGORITHM), &payload, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok((token, payload))
    }

    fn verify_token(&self, token: &str) -> Result<Payload, TokenError> {
        // An unknown or "none" alg fails to parse here already
        let header = decode_header(token).map_err(|_| TokenError::InvalidToken)?;
        let key = self.key_for(&header)?;

        // Expiry is checked by Payload::valid so it can be reported distinctly
        let mut validation = Validation::new(header.alg);
        validation.algorithms = ALLOWED_ALGORITHMS.to_vec();
        validation.required_spec_claims.clear();
        validation.validate_exp = false;

        let data =
            decode::<Payload>(token, key, &validation).map_err(|_| TokenError::InvalidToken)?;

        data.claims.valid()?;
        Ok(data.claims)
    }
}
