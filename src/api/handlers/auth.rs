/*
 * Responsibility
 * - POST /api/auth/signup, POST /api/auth/signin
 * - DTO validation → password hash/verify → directory → token 発行
 * - 無効化されたアカウントには token を発行しない
 */
use std::collections::BTreeSet;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};

use crate::{
    api::dto::{
        auth::{SigninRequest, SignupRequest, TokenResponse, normalize_email},
        users::AccountResponse,
    },
    error::AppError,
    services::auth::{
        directory::NewUser,
        password::{hash_password, verify_password},
        principal::Role,
    },
    state::AppState,
};

pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AccountResponse>), AppError> {
    let Json(req) = payload?;
    req.validate()
        .map_err(|msg| AppError::bad_request("INVALID_SIGNUP", msg))?;

    let subject = normalize_email(&req.email);
    let password_hash = hash_password(req.password).await?;

    let record = state
        .directory
        .create_user(NewUser {
            subject,
            password_hash,
            roles: BTreeSet::from([Role::User]),
        })
        .await?;

    tracing::info!(subject = %record.subject, "account created");

    Ok((StatusCode::CREATED, Json(record.into())))
}

pub async fn signin(
    State(state): State<AppState>,
    payload: Result<Json<SigninRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let Json(req) = payload?;
    let subject = normalize_email(&req.email);

    let Some(credentials) = state.directory.find_credentials(&subject).await? else {
        tracing::debug!(subject = %subject, "sign-in for unknown account");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(req.password, credentials.password_hash).await? {
        tracing::debug!(subject = %subject, "sign-in with wrong password");
        return Err(AppError::InvalidCredentials);
    }

    if !credentials.record.enabled {
        tracing::warn!(subject = %subject, "sign-in refused for disabled account");
        return Err(AppError::AccountDisabled);
    }

    let issued = state.tokens.issue(&subject, state.access_token_ttl_seconds)?;

    Ok(Json(TokenResponse::bearer(issued.token, issued.expires_in)))
}
