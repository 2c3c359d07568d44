use axum::{body::Body, http::Request, middleware::Next, response::Response};

use super::RouteClass;
use crate::error::AppError;
use crate::services::auth::principal::Identity;
use crate::services::auth::route_policy;

pub(super) async fn authorize(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    let (Some(RouteClass(access)), Some(identity)) =
        (req.extensions().get::<RouteClass>(), req.extensions().get::<Identity>())
    else {
        tracing::error!("authorization ran without route class or identity");
        return Err(AppError::Internal);
    };

    if let Err(denial) = route_policy::authorize(access.as_ref(), identity) {
        tracing::debug!(
            method = %req.method(),
            path = %req.uri().path(),
            ?denial,
            "request denied"
        );
        return Err(denial.into());
    }

    Ok(next.run(req).await)
}
