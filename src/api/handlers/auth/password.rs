//! Password hashing and verification using Argon2id.

use crate::api::error::AuthError;
use anyhow::anyhow;
use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHasher, PasswordVerifier,
};

/// Hash a plaintext password into an Argon2id PHC-format string.
///
/// # Errors
///
/// Returns `AuthError::Server` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::Server(anyhow!("password hashing failed: {err}")))
}

/// Verify a plaintext password against a stored Argon2id PHC-format hash.
///
/// Returns `Ok(true)` on match, `Ok(false)` on mismatch, or `AuthError::Server`
/// if the stored hash is malformed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed_hash = argon2::PasswordHash::new(hash)
        .map_err(|err| AuthError::Server(anyhow!("invalid stored hash: {err}")))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(err) => Err(AuthError::Server(anyhow!("verify error: {err}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_password_matches() -> Result<(), AuthError> {
        let hash = hash_password("hunter2")?;
        assert!(verify_password("hunter2", &hash)?);
        Ok(())
    }

    #[test]
    fn wrong_password_does_not_match() -> Result<(), AuthError> {
        let hash = hash_password("hunter2")?;
        assert!(!verify_password("wrong", &hash)?);
        Ok(())
    }

    #[test]
    fn hashes_are_salted() -> Result<(), AuthError> {
        let first = hash_password("hunter2")?;
        let second = hash_password("hunter2")?;
        assert_ne!(first, second);
        Ok(())
    }

    #[test]
    fn malformed_hash_returns_error() {
        assert!(verify_password("pw", "not-a-hash").is_err());
    }
}
