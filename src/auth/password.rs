use argon2::Argon2;
use rand::{rngs::OsRng, RngCore};
use tracing::error;

use crate::error::AuthError;

const SALT_LEN: usize = 8;
const KEY_LEN: usize = 32;
const SEPARATOR: char = '.';

fn derive_key(plain: &str, salt: &[u8]) -> Result<[u8; KEY_LEN], AuthError> {
    let mut key = [0u8; KEY_LEN];
    Argon2::default()
        .hash_password_into(plain.as_bytes(), salt, &mut key)
        .map_err(|e| {
            error!(error = %e, "argon2 key derivation error");
            AuthError::Internal(anyhow::anyhow!(e.to_string()))
        })?;
    Ok(key)
}

/// Hashes a password into `hex(salt).hex(derived_key)`.
pub fn hash_password(plain: &str) -> Result<String, AuthError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let key = derive_key(plain, &salt)?;
    Ok(format!("{}{}{}", hex::encode(salt), SEPARATOR, hex::encode(key)))
}

/// Re-derives the key for `plain` with the stored salt and compares.
pub fn verify_password(plain: &str, encoded: &str) -> Result<bool, AuthError> {
    let (salt_hex, key_hex) = encoded
        .split_once(SEPARATOR)
        .ok_or(AuthError::InvalidCredentialFormat)?;
    let salt = hex::decode(salt_hex).map_err(|_| AuthError::InvalidCredentialFormat)?;
    let stored = hex::decode(key_hex).map_err(|_| AuthError::InvalidCredentialFormat)?;
    if salt.len() != SALT_LEN || stored.len() != KEY_LEN {
        return Err(AuthError::InvalidCredentialFormat);
    }

    let derived = derive_key(plain, &salt)?;
    Ok(constant_time_eq(&derived, &stored))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// `hash_password` off the async reactor.
pub async fn hash_password_blocking(plain: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .map_err(|e| AuthError::Internal(e.into()))?
}

/// `verify_password` off the async reactor.
pub async fn verify_password_blocking(plain: String, encoded: String) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || verify_password(&plain, &encoded))
        .await
        .map_err(|e| AuthError::Internal(e.into()))?
}
