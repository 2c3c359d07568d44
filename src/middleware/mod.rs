/*
 * Responsibility
 * - middleware の公開インターフェース
 * - auth: 認証 / アカウント状態 / 認可 pipeline
 * - http / cors / security_headers: 全ルート共通の transport 層
 */
pub mod auth;
pub mod cors;
pub mod http;
pub mod security_headers;
