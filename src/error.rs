/*
 * Responsibility
 * - アプリ共通の AppError 定義
 * - IntoResponse 実装 (HTTP status / JSON error body / WWW-Authenticate)
 * - auth / directory / repo / cache のエラーを統一的に変換
 * - extractor の rejection (Json / Form / Query / Path) も同じ JSON envelope に揃える
 */
use axum::{
    Json,
    extract::rejection::{FormRejection, JsonRejection, PathRejection, QueryRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::repos::error::RepoError;
use crate::services::auth::directory::DirectoryError;
use crate::services::auth::error::AuthError;
use crate::services::auth::one_time_token::OneTimeTokenError;
use crate::services::auth::route_policy::Denial;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{code}: {message}")]
    BadRequest { code: &'static str, message: String },

    /// No usable identity. Carries why a presented token was dropped, if one was.
    #[error("authentication required")]
    Unauthenticated(Option<AuthError>),

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("sign-in link is invalid or has expired")]
    InvalidOneTimeToken,

    #[error("account is disabled")]
    AccountDisabled,

    #[error("insufficient role")]
    InsufficientRole,

    #[error("access denied")]
    AccessDenied,

    #[error("not found: {resource}")]
    NotFound { resource: &'static str },

    #[error("{code}: {message}")]
    Conflict { code: &'static str, message: String },

    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &'static str) -> Self {
        Self::NotFound { resource }
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::Conflict {
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::BadRequest { code, .. } => (StatusCode::BAD_REQUEST, *code),
            AppError::Unauthenticated(None) => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            AppError::Unauthenticated(Some(AuthError::ExpiredToken)) => {
                (StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED")
            }
            AppError::Unauthenticated(Some(_)) => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            AppError::InvalidOneTimeToken => (StatusCode::UNAUTHORIZED, "INVALID_ONE_TIME_TOKEN"),
            AppError::AccountDisabled => (StatusCode::FORBIDDEN, "ACCOUNT_DISABLED"),
            AppError::InsufficientRole => (StatusCode::FORBIDDEN, "INSUFFICIENT_ROLE"),
            AppError::AccessDenied => (StatusCode::FORBIDDEN, "ACCESS_DENIED"),
            AppError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Conflict { code, .. } => (StatusCode::CONFLICT, *code),
            AppError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR"),
        };

        let message = match &self {
            AppError::BadRequest { message, .. } | AppError::Conflict { message, .. } => message.clone(),
            AppError::NotFound { resource } => format!("{resource} not found."),
            AppError::Unauthenticated(Some(reason)) => reason.to_string(),
            other => other.to_string(),
        };

        // RFC 6750: tell the client which scheme is expected, and whether the presented token was bad.
        let challenge = match &self {
            AppError::Unauthenticated(Some(_)) => Some(r#"Bearer error="invalid_token""#),
            AppError::Unauthenticated(None) => Some("Bearer"),
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        let mut res = (status, Json(body)).into_response();
        if let Some(challenge) = challenge {
            res.headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
        }
        res
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::DisabledAccount => AppError::AccountDisabled,
            AuthError::InsufficientRole => AppError::InsufficientRole,
            token => AppError::Unauthenticated(Some(token)),
        }
    }
}

impl From<Denial> for AppError {
    fn from(d: Denial) -> Self {
        match d {
            Denial::Unauthenticated(reason) => AppError::Unauthenticated(reason),
            Denial::InsufficientRole => AppError::InsufficientRole,
            Denial::Unclassified => AppError::AccessDenied,
        }
    }
}

impl From<DirectoryError> for AppError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::Conflict => {
                AppError::conflict("ACCOUNT_EXISTS", "an account with this email already exists")
            }
            DirectoryError::Backend(cause) => {
                error!(error = %cause, "user directory unavailable");
                AppError::Internal
            }
        }
    }
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        DirectoryError::from(e).into()
    }
}

impl From<OneTimeTokenError> for AppError {
    fn from(e: OneTimeTokenError) -> Self {
        error!(error = %e, "one-time token store failure");
        AppError::Internal
    }
}

// Extractor rejections: handlers take `Result<Extractor, Rejection>` and `?` it.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::bad_request("INVALID_BODY", rejection.body_text())
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        AppError::bad_request("INVALID_BODY", rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::bad_request("INVALID_QUERY", rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::bad_request("INVALID_PATH", rejection.body_text())
    }
}
