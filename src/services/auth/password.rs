//! Password hashing for sign-up / sign-in (argon2, PHC string format).
//!
//! Hashing is CPU-bound, so both operations run on the blocking pool.
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tracing::error;

use crate::error::AppError;

pub async fn hash_password(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
    })
    .await
    .map_err(|e| {
        error!(error = %e, "password hashing task failed");
        AppError::Internal
    })?
    .map_err(|e| {
        error!(error = %e, "failed to hash password");
        AppError::Internal
    })
}

/// False for a wrong password and for an unparsable stored hash.
pub async fn verify_password(password: String, stored_hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || {
        let parsed = match PasswordHash::new(&stored_hash) {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "stored password hash is not a valid PHC string");
                return false;
            }
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
    .await
    .map_err(|e| {
        error!(error = %e, "password verification task failed");
        AppError::Internal
    })
}
