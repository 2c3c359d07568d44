//! Request authentication / authorization pipeline.
//!
//! Fixed order, outermost first:
//! 1. `classify_route`        route table lookup -> `RouteClass`
//! 2. `authenticate`          bearer token + directory lookup -> `Identity`
//! 3. `check_account_status`  live enabled flag, unless the route is exempt
//! 4. `authorize`             `RouteClass` x `Identity` -> proceed or reject
//!
//! Each stage checks that the previous one left its extension behind and
//! answers 500 otherwise, so a wiring mistake fails closed.
use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
};
use tower::ServiceBuilder;

use crate::services::auth::route_policy::RouteAccess;
use crate::state::AppState;

mod account_status;
mod authenticate;
mod authorize;
mod policy;

/// Result of the route table lookup. `None` means unclassified (denied).
#[derive(Debug, Clone)]
pub struct RouteClass(pub Option<RouteAccess>);

/// Wrap every route of `router` (fallback included) with the pipeline.
///
/// ```ignore
/// let router = Router::new().route(...).fallback(not_found);
/// let router = middleware::auth::apply(router, state.clone());
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 の from_fn は State extractor を受け取れないため、`from_fn_with_state` で明示的に state を渡す
    router.layer(
        ServiceBuilder::new()
            .layer(from_fn_with_state(state.clone(), policy::classify_route))
            .layer(from_fn_with_state(state.clone(), authenticate::authenticate))
            .layer(from_fn_with_state(state, account_status::check_account_status))
            .layer(from_fn(authorize::authorize)),
    )
}
