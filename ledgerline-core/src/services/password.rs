//! Password hashing (Argon2id, random salt per hash)

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;

use crate::domain::result::{Error, Result};

fn hasher() -> Argon2<'static> {
    Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default())
}

/// Hash a password into a self-describing PHC string
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng()
        .try_fill_bytes(&mut salt_bytes)
        .map_err(|e| Error::PasswordHash(e.to_string()))?;
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|e| Error::PasswordHash(e.to_string()))?;
    let hash = hasher()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::PasswordHash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Check a password against a hash produced by [`hash_password`]
pub fn check_password(password: &str, hashed_password: &str) -> Result<()> {
    let parsed =
        PasswordHash::new(hashed_password).map_err(|e| Error::PasswordHash(e.to_string()))?;
    hasher()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| Error::IncorrectPassword)
}
