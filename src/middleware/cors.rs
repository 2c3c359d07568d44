//! CORS policy for browser clients.
//!
//! - Development: any origin, no credentials
//! - Production: exact-match allow-list from `CORS_ALLOWED_ORIGINS`; empty list allows none
//!
//! Applied outside the auth pipeline so preflight `OPTIONS` requests are
//! answered here and never reach the (fail-closed) route table.

use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::{AppEnv, Config};

pub fn apply(router: Router, config: &Config) -> Router {
    router.layer(layer(config.app_env, &config.cors_allowed_origins))
}

fn layer(app_env: AppEnv, allowed_origins: &[String]) -> CorsLayer {
    let cors = if app_env.is_production() {
        let allowed: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|s| HeaderValue::from_str(s).ok())
            .collect();

        CorsLayer::new().allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _req| {
            allowed.iter().any(|v| v == origin)
        }))
    } else {
        CorsLayer::new().allow_origin(Any)
    };

    cors.allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static("x-request-id"),
        ])
        .expose_headers([header::WWW_AUTHENTICATE])
        .max_age(std::time::Duration::from_secs(60 * 10))
}
