/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - token codec, user directory, route policy, one-time token store, magic link issuer
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 */
use std::sync::Arc;
use std::time::Duration;

use crate::services::auth::{
    MagicLinkIssuer, OneTimeTokenStore, RoutePolicy, StatusExemptions, TokenCodec, UserDirectory,
};

#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenCodec>,
    pub directory: Arc<dyn UserDirectory>,
    pub route_policy: Arc<RoutePolicy>,
    pub status_exemptions: Arc<StatusExemptions>,
    pub one_time_tokens: Arc<dyn OneTimeTokenStore>,
    pub magic_link: Arc<MagicLinkIssuer>,
    pub access_token_ttl_seconds: u64,
    pub one_time_token_ttl: Duration,
}
