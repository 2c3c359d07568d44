//! Authorization ヘッダ → Identity を extensions に入れる
//!
//! - ヘッダなし / Bearer 以外 → anonymous (ここでは拒否しない)
//! - token 検証失敗 → 理由付き anonymous (半端な認証状態は残さない)
//! - directory 障害 → 500 (fail closed)
use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};

use super::RouteClass;
use crate::error::AppError;
use crate::services::auth::authenticator::resolve_identity;
use crate::services::auth::principal::Identity;
use crate::state::AppState;

pub(super) async fn authenticate(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if req.extensions().get::<RouteClass>().is_none() {
        tracing::error!("authentication ran before route classification");
        return Err(AppError::Internal);
    }

    // Never trust an Identity that arrived from outside this stage.
    req.extensions_mut().remove::<Identity>();

    let identity = resolve_identity(
        &state.tokens,
        state.directory.as_ref(),
        req.headers().get(header::AUTHORIZATION),
    )
    .await?;

    if let Identity::Authenticated(principal) = &identity {
        tracing::debug!(subject = %principal.subject, "request authenticated");
    }

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
