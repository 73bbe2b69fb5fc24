use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::{error, warn};

use crate::error::{Error, Result};

/// Hashes a plaintext password with a fresh random salt.
pub fn hash_password(plain: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            Error::Hashing(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

/// Checks `plain` against a stored hash. Fails closed: a mismatch and an
/// unreadable hash both come back as [`Error::AuthenticationFailure`].
pub fn verify_password(plain: &str, hash: &str) -> Result<()> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        warn!(error = %e, "stored password hash is unreadable");
        Error::AuthenticationFailure
    })?;
    Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .map_err(|_| Error::AuthenticationFailure)
}
