/*
 * Responsibility
 * - URL 構造の定義 (handler の登録)
 * - 「誰が何を呼べるか」の route table (唯一の定義元)
 * - account status チェック免除ルートの定義
 *
 * handler を追加したら ROUTE_TABLE にも行を追加すること。載っていないルートは 403 (fail closed)。
 */
use axum::{
    Router,
    http::Method,
    routing::{get, patch, post},
};

use crate::api::handlers::{
    admin::set_account_status,
    auth::{signin, signup},
    health::health,
    me::me,
    ott::{generate, login, login_form, sent},
};
use crate::services::auth::{RoutePolicy, StatusExemptions, route_policy::RoutePolicyError};
use crate::state::AppState;

/// `(method | "*", path, PUBLIC | AUTHENTICATED | ROLE:<name>[,...])`
pub const ROUTE_TABLE: &[(&str, &str, &str)] = &[
    ("GET", "/health", "PUBLIC"),
    ("POST", "/api/auth/signup", "PUBLIC"),
    ("POST", "/api/auth/signin", "PUBLIC"),
    ("POST", "/ott/generate", "PUBLIC"),
    ("GET", "/ott/sent", "PUBLIC"),
    ("GET", "/login/ott", "PUBLIC"),
    ("POST", "/login/ott", "PUBLIC"),
    ("GET", "/api/me", "AUTHENTICATED"),
    ("*", "/api/admin/{*rest}", "ROLE:ADMIN"),
];

/// Routes a disabled account can still reach with its (valid) token.
pub const STATUS_EXEMPT_ROUTES: [(Method, &str); 4] = [
    (Method::POST, "/api/auth/signup"),
    (Method::POST, "/api/auth/signin"),
    (Method::GET, "/health"),
    (Method::GET, "/ott/sent"),
];

pub fn default_policy() -> Result<RoutePolicy, RoutePolicyError> {
    RoutePolicy::from_rows(ROUTE_TABLE.iter().copied())
}

pub fn default_exemptions() -> StatusExemptions {
    StatusExemptions::new(STATUS_EXEMPT_ROUTES)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/signin", post(signin))
        .route("/ott/generate", post(generate))
        .route("/ott/sent", get(sent))
        .route("/login/ott", get(login_form).post(login))
        .route("/api/me", get(me))
        .route("/api/admin/users/{subject}/status", patch(set_account_status))
}
