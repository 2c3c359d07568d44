/*
 * Responsibility
 * - magic link (one-time token) 系の form / query DTO
 * - ブラウザの form post を受けるので Json ではなく Form
 */
use serde::Deserialize;

/// `POST /ott/generate`
#[derive(Debug, Deserialize)]
pub struct GenerateLinkForm {
    pub username: String,
}

/// `GET /login/ott?token=...`
#[derive(Deserialize)]
pub struct LoginLinkQuery {
    pub token: Option<String>,
}

/// `POST /login/ott`
#[derive(Deserialize)]
pub struct LoginLinkForm {
    pub token: String,
}
