//! Bearer token encode/verify (HS256 JWT).
//!
//! Pure functions over a process-wide signing secret. No I/O, no state beyond
//! the keys, so a single `TokenCodec` is shared by all requests.
//!
//! Expiry is checked here (not by `jsonwebtoken`) against an explicit `now`,
//! with zero leeway and second precision, so tests can pin the clock.
//! Clock skew between hosts is not compensated.
use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::AppError;
use crate::services::auth::error::AuthError;

/// Minimum HS256 secret length accepted at startup.
pub const MIN_SECRET_BYTES: usize = 32;

/// Signing secret loaded once from configuration.
///
/// Key material is intentionally not printable via Debug.
#[derive(Clone)]
pub struct SigningSecret(Vec<u8>);

impl SigningSecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Option<Self> {
        let bytes = bytes.into();
        (bytes.len() >= MIN_SECRET_BYTES).then_some(Self(bytes))
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SigningSecret").field(&"<redacted>").finish()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct BearerClaims {
    iss: String,
    sub: String,
    iat: i64,
    exp: i64,
}

/// A freshly issued token together with its lifetime, for token responses.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_in: u64,
    pub expires_at: DateTime<Utc>,
}

/// Claims that survived signature and expiry checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub subject: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        f.debug_struct("TokenCodec")
            .field("issuer", &self.issuer)
            .finish()
    }
}

impl TokenCodec {
    pub fn new(secret: &SigningSecret, issuer: impl Into<String>) -> Self {
        let issuer = issuer.into();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer.as_str()]);
        validation.validate_aud = false;
        // exp is compared in `verify_at` so that an explicit clock can be used.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims = HashSet::from([
            "exp".to_string(),
            "sub".to_string(),
            "iss".to_string(),
        ]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            issuer,
        }
    }

    pub fn issue(&self, subject: &str, expires_in_seconds: u64) -> Result<IssuedToken, AppError> {
        self.issue_at(subject, expires_in_seconds, Utc::now())
    }

    /// Sign `subject` with `iat = now` and `exp = now + expires_in_seconds`.
    pub fn issue_at(
        &self,
        subject: &str,
        expires_in_seconds: u64,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AppError> {
        let lifetime = i64::try_from(expires_in_seconds).map_err(|_| AppError::Internal)?;
        let iat = now.timestamp();
        let exp = iat.checked_add(lifetime).ok_or(AppError::Internal)?;

        let claims = BearerClaims {
            iss: self.issuer.clone(),
            sub: subject.to_string(),
            iat,
            exp,
        };

        let mut header = Header::new(Algorithm::HS256);
        header.typ = Some("JWT".to_string());

        let token = jsonwebtoken::encode(&header, &claims, &self.encoding_key).map_err(|e| {
            error!(error = %e, "failed to sign bearer token");
            AppError::Internal
        })?;

        Ok(IssuedToken {
            token,
            expires_in: expires_in_seconds,
            expires_at: DateTime::from_timestamp(exp, 0).ok_or(AppError::Internal)?,
        })
    }

    pub fn verify(&self, token: &str) -> Result<VerifiedToken, AuthError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify signature, algorithm, issuer and expiry.
    ///
    /// The HMAC comparison is done by the `jsonwebtoken` crypto backend in
    /// constant time. Signature failures are reported before expiry, so a
    /// tampered expired token is `InvalidSignature`, not `ExpiredToken`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<VerifiedToken, AuthError> {
        let data = jsonwebtoken::decode::<BearerClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::MalformedToken,
            })?;

        let claims = data.claims;
        if claims.sub.trim().is_empty() {
            return Err(AuthError::MalformedToken);
        }
        if claims.exp <= now.timestamp() {
            return Err(AuthError::ExpiredToken);
        }

        Ok(VerifiedToken {
            subject: claims.sub,
            issued_at: claims.iat,
            expires_at: claims.exp,
        })
    }
}
