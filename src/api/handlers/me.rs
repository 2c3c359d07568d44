use axum::Json;

use crate::api::dto::users::AccountResponse;
use crate::api::extractors::CurrentPrincipal;

/// `GET /api/me`
pub async fn me(CurrentPrincipal(principal): CurrentPrincipal) -> Json<AccountResponse> {
    Json(principal.into())
}
