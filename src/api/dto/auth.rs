/*
 * Responsibility
 * - sign-up / sign-in の request/response DTO
 * - validation (形式チェック) は validate() に置く
 * - password を含む型は Debug を derive しない
 */
use serde::{Deserialize, Serialize};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;

#[derive(Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

impl SignupRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if !is_plausible_email(&self.email) {
            return Err("email is not a valid address");
        }
        let len = self.password.chars().count();
        if len < MIN_PASSWORD_LEN {
            return Err("password must be at least 8 characters");
        }
        if len > MAX_PASSWORD_LEN {
            return Err("password must be <= 128 characters");
        }
        Ok(())
    }
}

#[derive(Deserialize)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Always "Bearer"
    pub token_type: &'static str,
    /// Seconds until expiry.
    pub expires_in: u64,
}

impl TokenResponse {
    pub fn bearer(access_token: String, expires_in: u64) -> Self {
        Self {
            access_token,
            token_type: "Bearer",
            expires_in,
        }
    }
}

/// Subjects are stored lower-cased; every entry point normalizes the same way.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// Shape check only. Deliverability is proven by the magic link itself.
pub fn is_plausible_email(raw: &str) -> bool {
    let email = raw.trim();
    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}
