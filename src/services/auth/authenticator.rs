//! Bearer header -> Identity.
//!
//! The gate only answers "is there a valid identity or not". Route policy is
//! decided elsewhere, so token failures become `Identity::Anonymous(Some(_))`
//! instead of errors. The only error returned is a directory backend failure.
use axum::http::HeaderValue;
use tracing::{debug, warn};

use crate::services::auth::directory::{DirectoryError, UserDirectory};
use crate::services::auth::error::AuthError;
use crate::services::auth::principal::Identity;
use crate::services::auth::token_codec::TokenCodec;

/// Extract the token from `Authorization: Bearer <token>`.
///
/// The scheme is matched case-insensitively. Anything else (other schemes,
/// non-ASCII header values, an empty token) is treated as no credential.
pub fn bearer_token(header: Option<&HeaderValue>) -> Option<&str> {
    let value = header?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return None;
    }

    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

pub async fn resolve_identity(
    codec: &TokenCodec,
    directory: &dyn UserDirectory,
    authorization: Option<&HeaderValue>,
) -> Result<Identity, DirectoryError> {
    let Some(token) = bearer_token(authorization) else {
        return Ok(Identity::anonymous());
    };

    let verified = match codec.verify(token) {
        Ok(v) => v,
        Err(err) => {
            match err {
                AuthError::ExpiredToken => debug!(error = %err, "bearer token rejected"),
                _ => warn!(error = %err, "bearer token rejected"),
            }
            return Ok(Identity::Anonymous(Some(err)));
        }
    };

    match directory.lookup_by_subject(&verified.subject).await? {
        Some(record) => Ok(Identity::Authenticated(record.into_principal())),
        None => {
            warn!(subject = %verified.subject, "valid token for unknown subject");
            Ok(Identity::Anonymous(Some(AuthError::UnknownSubject)))
        }
    }
}
