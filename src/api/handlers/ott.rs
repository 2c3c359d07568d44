/*
 * Responsibility
 * - magic link ログイン (one-time token)
 *   - POST /ott/generate : token 発行 → メール送信 (fire-and-forget) → 302 /ott/sent
 *   - GET  /ott/sent     : 「メールを確認してください」
 *   - GET  /login/ott    : 確認フォーム (副作用なし。メールスキャナの prefetch 対策)
 *   - POST /login/ott    : token 消費 → access token 発行
 */
use axum::{
    Form, Json,
    extract::{
        OriginalUri, Query, State,
        rejection::{FormRejection, QueryRejection},
    },
    http::HeaderMap,
    response::{Html, Response},
};

use crate::{
    api::dto::{
        auth::{TokenResponse, normalize_email},
        ott::{GenerateLinkForm, LoginLinkForm, LoginLinkQuery},
    },
    error::AppError,
    services::auth::one_time_token::is_well_formed,
    state::AppState,
};

/// Always the same redirect, whether or not the account exists or the mail goes out.
pub async fn generate(
    State(state): State<AppState>,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
    form: Result<Form<GenerateLinkForm>, FormRejection>,
) -> Result<Response, AppError> {
    let Form(form) = form?;
    let subject = normalize_email(&form.username);
    if subject.is_empty() {
        return Err(AppError::bad_request("INVALID_USERNAME", "username is required"));
    }

    match state.directory.lookup_by_subject(&subject).await? {
        Some(record) if record.enabled => {}
        Some(_) => {
            tracing::info!(subject = %subject, "magic link not sent: account disabled");
            return Ok(state.magic_link.redirect_to_sent());
        }
        None => {
            tracing::info!(subject = %subject, "magic link not sent: unknown account");
            return Ok(state.magic_link.redirect_to_sent());
        }
    }

    let token = state
        .one_time_tokens
        .issue(&subject, state.one_time_token_ttl)
        .await?;

    let link = match state.magic_link.callback_url(&headers, &uri, &token.value) {
        Ok(link) => link,
        Err(e) => {
            tracing::warn!(subject = %subject, error = %e, "magic link not sent");
            return Ok(state.magic_link.redirect_to_sent());
        }
    };

    tracing::debug!(subject = %subject, expires_at = %token.expires_at, "one-time token issued");

    Ok(state.magic_link.on_generated(token.subject, link))
}

pub async fn sent() -> Html<&'static str> {
    Html(SENT_PAGE)
}

pub async fn login_form(
    query: Result<Query<LoginLinkQuery>, QueryRejection>,
) -> Result<Html<String>, AppError> {
    let Query(query) = query?;
    // Only base64url characters pass, so the value is safe to embed as-is.
    let token = query
        .token
        .filter(|t| is_well_formed(t))
        .ok_or(AppError::InvalidOneTimeToken)?;

    Ok(Html(LOGIN_FORM.replace("{token}", &token)))
}

pub async fn login(
    State(state): State<AppState>,
    form: Result<Form<LoginLinkForm>, FormRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let Form(form) = form?;
    if !is_well_formed(&form.token) {
        return Err(AppError::InvalidOneTimeToken);
    }

    let Some(subject) = state.one_time_tokens.consume(&form.token).await? else {
        tracing::debug!("one-time token unknown, used or expired");
        return Err(AppError::InvalidOneTimeToken);
    };

    let Some(record) = state.directory.lookup_by_subject(&subject).await? else {
        tracing::warn!(subject = %subject, "one-time token for vanished account");
        return Err(AppError::InvalidOneTimeToken);
    };

    if !record.enabled {
        tracing::warn!(subject = %subject, "magic link login refused for disabled account");
        return Err(AppError::AccountDisabled);
    }

    let issued = state.tokens.issue(&subject, state.access_token_ttl_seconds)?;

    Ok(Json(TokenResponse::bearer(issued.token, issued.expires_in)))
}

const SENT_PAGE: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Check your email</title></head>
<body>
<h1>Check your email</h1>
<p>If an account exists for that address, a sign-in link is on its way.</p>
</body>
</html>
"#;

// Submits to the current URL; the POST handler reads the token from the body.
const LOGIN_FORM: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Sign in</title></head>
<body>
<form method="post">
<input type="hidden" name="token" value="{token}">
<button type="submit">Sign in</button>
</form>
</body>
</html>
"#;
