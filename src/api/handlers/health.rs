/*
 * Responsibility
 * - GET /health (疎通用、PUBLIC かつ account status 免除)
 */
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}
