use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::services::auth::account_status;
use crate::services::auth::error::AuthError;
use crate::services::auth::principal::Identity;
use crate::state::AppState;

pub(super) async fn check_account_status(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(identity) = req.extensions().get::<Identity>() else {
        tracing::error!("account status check ran before authentication");
        return Err(AppError::Internal);
    };

    let exempt = state
        .status_exemptions
        .is_exempt(req.method(), req.uri().path());

    if let Err(err) = account_status::check_account_status(identity, exempt) {
        let subject = identity.principal().map(|p| p.subject.clone()).unwrap_or_default();
        tracing::warn!(subject = %subject, path = %req.uri().path(), "rejected disabled account");

        // Clear the principal before anything else can observe it.
        req.extensions_mut()
            .insert(Identity::Anonymous(Some(AuthError::DisabledAccount)));
        return Err(err.into());
    }

    Ok(next.run(req).await)
}
