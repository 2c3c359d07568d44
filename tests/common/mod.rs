#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{Router, body::Body, http::Request, response::Response};
use membership_api::services::auth::directory::{
    BoxFuture, DirectoryError, DirectoryResult, NewUser, StoredCredentials, UserDirectory, UserRecord,
};
use membership_api::services::auth::{
    CacheOneTimeTokenStore, MagicLinkIssuer, Role, RoutePolicy, SigningSecret, StatusExemptions, TokenCodec,
};
use membership_api::services::cache::MemoryCache;
use membership_api::services::mail::{MailError, MailSender};
use membership_api::state::AppState;
use tower::ServiceExt;
use url::Url;
use uuid::Uuid;

pub const SECRET: &[u8] = b"integration-test-secret-0123456789abcdef";
pub const ISSUER: &str = "membership-api";

/// In-memory user directory. Counts `lookup_by_subject` calls.
#[derive(Default)]
pub struct MemoryDirectory {
    users: Mutex<HashMap<String, StoredCredentials>>,
    lookups: AtomicUsize,
}

impl MemoryDirectory {
    pub fn add_user(&self, subject: &str, roles: &[Role], enabled: bool) {
        let record = UserRecord {
            user_id: Uuid::new_v4(),
            subject: subject.to_string(),
            enabled,
            roles: roles.iter().copied().collect(),
        };
        self.users.lock().unwrap().insert(
            subject.to_string(),
            StoredCredentials {
                record,
                password_hash: String::new(),
            },
        );
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn set_enabled_for_test(&self, subject: &str, enabled: bool) {
        if let Some(c) = self.users.lock().unwrap().get_mut(subject) {
            c.record.enabled = enabled;
        }
    }

    pub fn is_enabled(&self, subject: &str) -> Option<bool> {
        self.users.lock().unwrap().get(subject).map(|c| c.record.enabled)
    }
}

impl UserDirectory for MemoryDirectory {
    fn lookup_by_subject<'a>(&'a self, subject: &'a str) -> BoxFuture<'a, DirectoryResult<Option<UserRecord>>> {
        Box::pin(async move {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.users.lock().unwrap().get(subject).map(|c| c.record.clone()))
        })
    }

    fn find_credentials<'a>(
        &'a self,
        subject: &'a str,
    ) -> BoxFuture<'a, DirectoryResult<Option<StoredCredentials>>> {
        Box::pin(async move { Ok(self.users.lock().unwrap().get(subject).cloned()) })
    }

    fn create_user(&self, user: NewUser) -> BoxFuture<'_, DirectoryResult<UserRecord>> {
        Box::pin(async move {
            let mut users = self.users.lock().unwrap();
            if users.contains_key(&user.subject) {
                return Err(DirectoryError::Conflict);
            }
            let record = UserRecord {
                user_id: Uuid::new_v4(),
                subject: user.subject.clone(),
                enabled: true,
                roles: user.roles,
            };
            users.insert(
                user.subject,
                StoredCredentials {
                    record: record.clone(),
                    password_hash: user.password_hash,
                },
            );
            Ok(record)
        })
    }

    fn set_enabled<'a>(&'a self, subject: &'a str, enabled: bool) -> BoxFuture<'a, DirectoryResult<bool>> {
        Box::pin(async move {
            match self.users.lock().unwrap().get_mut(subject) {
                Some(c) => {
                    c.record.enabled = enabled;
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }
}

#[derive(Debug, Clone)]
pub struct SentMail {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }

    /// Delivery runs on a background task; give it a moment.
    pub async fn wait_for(&self, count: usize) -> Vec<SentMail> {
        for _ in 0..100 {
            if self.sent.lock().unwrap().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.sent()
    }
}

#[async_trait]
impl MailSender for RecordingMailer {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(SentMail {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

pub struct FailingMailer;

#[async_trait]
impl MailSender for FailingMailer {
    async fn send(&self, _: &str, _: &str, _: &str) -> Result<(), MailError> {
        Err(MailError::SendFailed("smtp: connection refused".into()))
    }
}

pub struct PanickingMailer;

#[async_trait]
impl MailSender for PanickingMailer {
    async fn send(&self, _: &str, _: &str, _: &str) -> Result<(), MailError> {
        panic!("mail transport blew up")
    }
}

pub fn codec() -> TokenCodec {
    TokenCodec::new(&SigningSecret::new(SECRET).unwrap(), ISSUER)
}

pub fn bearer(subject: &str) -> String {
    format!("Bearer {}", codec().issue(subject, 3600).unwrap().token)
}

pub struct TestApp {
    pub state: AppState,
    pub directory: Arc<MemoryDirectory>,
}

impl TestApp {
    pub fn new(mailer: Arc<dyn MailSender>) -> Self {
        Self::build(mailer, "", None, None)
    }

    pub fn with_context_path(mailer: Arc<dyn MailSender>, context_path: &str) -> Self {
        Self::build(mailer, context_path, None, None)
    }

    pub fn with_policy(policy: RoutePolicy, exemptions: StatusExemptions) -> Self {
        Self::build(Arc::new(RecordingMailer::default()), "", Some(policy), Some(exemptions))
    }

    fn build(
        mailer: Arc<dyn MailSender>,
        context_path: &str,
        policy: Option<RoutePolicy>,
        exemptions: Option<StatusExemptions>,
    ) -> Self {
        let directory = Arc::new(MemoryDirectory::default());
        let magic_link = MagicLinkIssuer::new(mailer, None, context_path, "/ott/sent").unwrap();

        let state = AppState {
            tokens: Arc::new(codec()),
            directory: directory.clone(),
            route_policy: Arc::new(policy.unwrap_or_else(|| membership_api::api::default_policy().unwrap())),
            status_exemptions: Arc::new(exemptions.unwrap_or_else(membership_api::api::default_exemptions)),
            one_time_tokens: Arc::new(CacheOneTimeTokenStore::new(Arc::new(MemoryCache::new()))),
            magic_link: Arc::new(magic_link),
            access_token_ttl_seconds: 3600,
            one_time_token_ttl: Duration::from_secs(300),
        };

        Self { state, directory }
    }

    pub fn router(&self) -> Router {
        membership_api::app::router(self.state.clone(), "")
    }

    pub fn router_at(&self, context_path: &str) -> Router {
        membership_api::app::router(self.state.clone(), context_path)
    }
}

pub async fn send(router: &Router, req: Request<Body>) -> Response {
    router.clone().oneshot(req).await.unwrap()
}

pub async fn body_json(res: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(res: Response) -> String {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn error_code(v: &serde_json::Value) -> &str {
    v["error"]["code"].as_str().unwrap_or_default()
}

/// First URL in a mail body.
pub fn link_in(mail: &SentMail) -> Url {
    let raw = mail
        .body
        .split_whitespace()
        .find(|w| w.starts_with("http://") || w.starts_with("https://"))
        .expect("mail contains a link");
    Url::parse(raw).unwrap()
}

pub fn roles(r: &[Role]) -> BTreeSet<Role> {
    r.iter().copied().collect()
}
