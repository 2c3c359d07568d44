/*
 * Responsibility
 * - /api/admin 系 handler (ROLE:ADMIN は route table で判定済み)
 * - アカウントの有効/無効切り替え。次のリクエストから反映される (enabled は毎回 lookup)
 */
use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};

use crate::{
    api::{dto::auth::normalize_email, dto::users::UpdateStatusRequest, extractors::CurrentPrincipal},
    error::AppError,
    state::AppState,
};

/// `PATCH /api/admin/users/{subject}/status`
pub async fn set_account_status(
    State(state): State<AppState>,
    CurrentPrincipal(admin): CurrentPrincipal,
    subject: Result<Path<String>, PathRejection>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let Path(subject) = subject?;
    let Json(req) = payload?;
    let subject = normalize_email(&subject);

    if !state.directory.set_enabled(&subject, req.enabled).await? {
        return Err(AppError::not_found("account"));
    }

    tracing::info!(
        actor = %admin.subject,
        subject = %subject,
        enabled = req.enabled,
        "account status changed"
    );

    Ok(StatusCode::NO_CONTENT)
}
