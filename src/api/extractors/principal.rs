use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::services::auth::principal::{Identity, Principal};
use crate::state::AppState;

/// Handler で認証済み Principal を受け取るための extractor
///
/// middleware が Identity を extensions に insert 済みである前提。
/// anonymous (または Identity なし) の場合は 401 を返す。
/// 認可の判断はしない (route table 側で済んでいる)。
pub struct CurrentPrincipal(pub Principal);

impl FromRequestParts<AppState> for CurrentPrincipal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Identity>() {
            Some(Identity::Authenticated(principal)) => Ok(CurrentPrincipal(principal.clone())),
            Some(Identity::Anonymous(reason)) => Err(AppError::Unauthenticated(*reason)),
            None => Err(AppError::Unauthenticated(None)),
        }
    }
}
