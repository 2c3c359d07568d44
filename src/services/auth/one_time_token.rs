use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sha2::{Digest, Sha256};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::debug;

use crate::services::cache::{CacheClient, CacheError};

/// A magic-link token as handed to the issuer. `value` is the only copy of
/// the raw token; the store keeps a digest.
#[derive(Clone)]
pub struct OneTimeToken {
    pub value: String,
    pub subject: String,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for OneTimeToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print the token itself
        f.debug_struct("OneTimeToken")
            .field("subject", &self.subject)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum OneTimeTokenError {
    #[error("random source unavailable: {0}")]
    Entropy(String),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// One-time login token store.
///
/// - `issue` supersedes any earlier outstanding token of the same subject
/// - `consume` succeeds at most once per token and returns its subject
#[async_trait]
pub trait OneTimeTokenStore: Send + Sync {
    async fn issue(&self, subject: &str, ttl: Duration) -> Result<OneTimeToken, OneTimeTokenError>;

    async fn consume(&self, token: &str) -> Result<Option<String>, OneTimeTokenError>;
}

/// Store backed by any `CacheClient` (Valkey in production, memory in development).
///
/// Keys:
/// - `<prefix>:token:<digest>`   -> subject
/// - `<prefix>:subject:<subject>` -> digest of the subject's latest token
#[derive(Clone)]
pub struct CacheOneTimeTokenStore<C: CacheClient> {
    cache: Arc<C>,
    prefix: String,
}

impl<C: CacheClient> CacheOneTimeTokenStore<C> {
    pub fn new(cache: Arc<C>) -> Self {
        Self::new_with_prefix(cache, "ott")
    }

    pub fn new_with_prefix(cache: Arc<C>, prefix: impl Into<String>) -> Self {
        Self {
            cache,
            prefix: prefix.into(),
        }
    }

    fn token_key(&self, digest: &str) -> String {
        format!("{}:token:{}", self.prefix, digest)
    }

    fn subject_key(&self, subject: &str) -> String {
        format!("{}:subject:{}", self.prefix, subject)
    }
}

#[async_trait]
impl<C: CacheClient> OneTimeTokenStore for CacheOneTimeTokenStore<C> {
    async fn issue(&self, subject: &str, ttl: Duration) -> Result<OneTimeToken, OneTimeTokenError> {
        let value = generate_token()?;
        let digest = digest_token(&value);

        // Token key first, then the index swap. Whichever issuance swaps last
        // deletes the token it displaced, so at most one stays redeemable.
        self.cache
            .set_with_ttl(&self.token_key(&digest), subject, ttl)
            .await?;
        let previous = self
            .cache
            .swap_with_ttl(&self.subject_key(subject), &digest, ttl)
            .await?;

        if let Some(previous) = previous.filter(|p| *p != digest) {
            let removed = self.cache.del(&self.token_key(&previous)).await?;
            debug!(
                backend = self.cache.backend_name(),
                removed, "superseded previous one-time token"
            );
        }

        let lifetime = ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::zero());

        Ok(OneTimeToken {
            value,
            subject: subject.to_string(),
            expires_at: Utc::now() + lifetime,
        })
    }

    async fn consume(&self, token: &str) -> Result<Option<String>, OneTimeTokenError> {
        let digest = digest_token(token);

        // The subject index is left alone: a stale entry points at a deleted
        // key and expires with it.
        Ok(self.cache.take_string(&self.token_key(&digest)).await?)
    }
}

fn generate_token() -> Result<String, OneTimeTokenError> {
    // 32 bytes of entropy -> URL-safe base64 without padding.
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes).map_err(|e| OneTimeTokenError::Entropy(e.to_string()))?;

    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

fn digest_token(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
}

/// Shape check before touching the store: base64url alphabet, bounded length.
pub fn is_well_formed(token: &str) -> bool {
    (16..=128).contains(&token.len())
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
