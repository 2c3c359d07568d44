/*
 * Responsibility
 * - Failure kinds produced by the authentication pipeline
 * - Kept free of HTTP types; `error.rs` decides status codes
 */
use thiserror::Error;

/// Why a request could not be (or no longer is) authenticated.
///
/// Every variant is per-request. None of them is retried: the caller has to
/// obtain a new credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("malformed token")]
    MalformedToken,
    #[error("token signature mismatch")]
    InvalidSignature,
    #[error("token expired")]
    ExpiredToken,
    #[error("token subject is not a known account")]
    UnknownSubject,
    #[error("account is disabled")]
    DisabledAccount,
    #[error("principal lacks a required role")]
    InsufficientRole,
}
