use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use super::RouteClass;
use crate::state::AppState;

pub(super) async fn classify_route(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let access = state
        .route_policy
        .resolve(req.method(), req.uri().path())
        .cloned();

    if access.is_none() {
        tracing::debug!(method = %req.method(), path = %req.uri().path(), "route not in policy table");
    }

    req.extensions_mut().insert(RouteClass(access));
    next.run(req).await
}
