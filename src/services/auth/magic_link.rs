//! Passwordless sign-in: turn a freshly issued one-time token into a callback
//! URL, hand it to the mailer, and send the browser to the "check your email"
//! page.
//!
//! Delivery is fire-and-forget. The HTTP caller is not necessarily the owner
//! of the mailbox, so a mail failure is logged and dropped; it never changes
//! the redirect returned to the caller.
use std::sync::Arc;

use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error};
use url::Url;

use crate::services::mail::MailSender;

pub const LOGIN_PATH: &str = "/login/ott";
pub const TOKEN_PARAM: &str = "token";

const MAIL_SUBJECT: &str = "Your sign-in link";

#[derive(Debug, Error)]
pub enum MagicLinkError {
    #[error("cannot build callback url: {0}")]
    CallbackUrl(String),
    #[error("invalid redirect location: {0}")]
    RedirectLocation(String),
}

pub struct MagicLinkIssuer {
    mailer: Arc<dyn MailSender>,
    public_base_url: Option<Url>,
    context_path: String,
    sent_location: HeaderValue,
    trust_forwarded_headers: bool,
}

impl std::fmt::Debug for MagicLinkIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MagicLinkIssuer")
            .field("public_base_url", &self.public_base_url)
            .field("context_path", &self.context_path)
            .field("sent_location", &self.sent_location)
            .field("trust_forwarded_headers", &self.trust_forwarded_headers)
            .finish_non_exhaustive()
    }
}

impl MagicLinkIssuer {
    /// `context_path` is either empty or starts with `/` and has no trailing `/`.
    pub fn new(
        mailer: Arc<dyn MailSender>,
        public_base_url: Option<Url>,
        context_path: impl Into<String>,
        sent_path: &str,
    ) -> Result<Self, MagicLinkError> {
        let context_path = context_path.into();
        let location = format!("{context_path}{sent_path}");
        let sent_location = HeaderValue::from_str(&location)
            .map_err(|_| MagicLinkError::RedirectLocation(location.clone()))?;

        Ok(Self {
            mailer,
            public_base_url,
            context_path,
            sent_location,
            trust_forwarded_headers: false,
        })
    }

    /// Read `x-forwarded-proto` and `x-forwarded-host` when no public base URL
    /// is configured. Only enable behind a proxy that overwrites both headers.
    pub fn trust_forwarded_headers(mut self, trust: bool) -> Self {
        self.trust_forwarded_headers = trust;
        self
    }

    /// `<scheme>://<host>[:<port>]<contextPath>/login/ott?token=<token>`
    ///
    /// Scheme and host come from `PUBLIC_BASE_URL` when configured, otherwise
    /// from the triggering request: `x-forwarded-*` if trusted, then `Host`.
    /// Whatever path, query and fragment the triggering request had are
    /// discarded.
    pub fn callback_url(&self, headers: &HeaderMap, uri: &Uri, token: &str) -> Result<Url, MagicLinkError> {
        let mut url = match &self.public_base_url {
            Some(base) => base.clone(),
            None => request_url(headers, uri, self.trust_forwarded_headers)?,
        };

        url.set_query(None);
        url.set_fragment(None);
        url.set_path(&format!("{}{}", self.context_path, LOGIN_PATH));
        url.query_pairs_mut().append_pair(TOKEN_PARAM, token);

        Ok(url)
    }

    /// Send the link on a background task.
    ///
    /// The returned handle completes normally whatever the mailer does
    /// (error or panic); callers may drop it.
    pub fn dispatch(&self, recipient: String, link: Url) -> JoinHandle<()> {
        let mailer = Arc::clone(&self.mailer);

        tokio::spawn(async move {
            let body = format!(
                "Use the link below to sign in. It can be used once.\n\n{link}\n\n\
                 If you did not ask for this, ignore this message."
            );

            let delivery = {
                let recipient = recipient.clone();
                tokio::spawn(async move { mailer.send(&recipient, MAIL_SUBJECT, &body).await })
            };

            match delivery.await {
                Ok(Ok(())) => debug!(recipient = %recipient, "magic link delivered"),
                Ok(Err(e)) => error!(recipient = %recipient, error = %e, "magic link delivery failed"),
                Err(e) => error!(recipient = %recipient, error = %e, "magic link delivery aborted"),
            }
        })
    }

    /// `302 Found` to the confirmation page.
    pub fn redirect_to_sent(&self) -> Response {
        (StatusCode::FOUND, [(header::LOCATION, self.sent_location.clone())]).into_response()
    }

    /// Dispatch, then redirect. The response does not depend on delivery.
    pub fn on_generated(&self, recipient: String, link: Url) -> Response {
        drop(self.dispatch(recipient, link));
        self.redirect_to_sent()
    }
}

fn request_url(headers: &HeaderMap, uri: &Uri, trust_forwarded: bool) -> Result<Url, MagicLinkError> {
    let forwarded = |name: &'static str| trust_forwarded.then(|| header_str(headers, name)).flatten();

    let proto = forwarded("x-forwarded-proto")
        .or_else(|| uri.scheme_str())
        .unwrap_or("http");

    let host = forwarded("x-forwarded-host")
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .or_else(|| header_str(headers, header::HOST.as_str()))
        .unwrap_or("localhost");

    if host.contains(['/', '?', '#', '@', '\\']) {
        return Err(MagicLinkError::CallbackUrl(format!("unusable host {host:?}")));
    }

    let raw = format!("{proto}://{host}/");
    let url = Url::parse(&raw).map_err(|e| MagicLinkError::CallbackUrl(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(MagicLinkError::CallbackUrl(format!("unsupported scheme {other:?}"))),
    }
}

// Proxies may append values (`a, b`); the first one is the client-facing hop.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use std::sync::Mutex;

    use super::*;
    use crate::services::mail::MailError;

    #[derive(Default)]
    struct Recording(Mutex<Vec<(String, String)>>);

    #[async_trait]
    impl MailSender for Recording {
        async fn send(&self, recipient: &str, _subject: &str, body: &str) -> Result<(), MailError> {
            self.0.lock().unwrap().push((recipient.to_string(), body.to_string()));
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl MailSender for Failing {
        async fn send(&self, _: &str, _: &str, _: &str) -> Result<(), MailError> {
            Err(MailError::SendFailed("connection refused".into()))
        }
    }

    struct Panicking;

    #[async_trait]
    impl MailSender for Panicking {
        async fn send(&self, _: &str, _: &str, _: &str) -> Result<(), MailError> {
            panic!("mailer exploded")
        }
    }

    fn issuer(mailer: Arc<dyn MailSender>, base: Option<&str>, ctx: &str) -> MagicLinkIssuer {
        MagicLinkIssuer::new(mailer, base.map(|b| Url::parse(b).unwrap()), ctx, "/ott/sent").unwrap()
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut h = HeaderMap::new();
        for (k, v) in pairs {
            h.insert(*k, HeaderValue::from_static(v));
        }
        h
    }

    #[test]
    fn callback_drops_request_query_and_carries_one_token() {
        let issuer = issuer(Arc::new(Recording::default()), None, "");
        let uri: Uri = "/ott/generate?foo=bar".parse().unwrap();
        let url = issuer
            .callback_url(&headers(&[("host", "members.example.com:8080")]), &uri, "tok123")
            .unwrap();

        assert_eq!(url.as_str(), "http://members.example.com:8080/login/ott?token=tok123");
        assert!(!url.as_str().contains("foo"));
        let tokens: Vec<_> = url.query_pairs().filter(|(k, _)| k == TOKEN_PARAM).collect();
        assert_eq!(tokens.len(), 1);
        assert_eq!(url.query_pairs().count(), 1);
    }

    #[test]
    fn forwarded_headers_are_ignored_unless_trusted() {
        let issuer = issuer(Arc::new(Recording::default()), None, "");
        let h = headers(&[
            ("host", "members.example.com"),
            ("x-forwarded-proto", "https"),
            ("x-forwarded-host", "attacker.example"),
        ]);
        let url = issuer.callback_url(&h, &Uri::from_static("/ott/generate"), "t").unwrap();
        assert_eq!(url.as_str(), "http://members.example.com/login/ott?token=t");
    }

    #[test]
    fn trusted_forwarded_headers_win_over_host() {
        let issuer = issuer(Arc::new(Recording::default()), None, "/app").trust_forwarded_headers(true);
        let h = headers(&[
            ("host", "internal:3000"),
            ("x-forwarded-proto", "https"),
            ("x-forwarded-host", "members.example.com, proxy.local"),
        ]);
        let url = issuer.callback_url(&h, &Uri::from_static("/ott/generate"), "t").unwrap();
        assert_eq!(url.as_str(), "https://members.example.com/app/login/ott?token=t");
    }

    #[test]
    fn configured_base_ignores_even_trusted_forwarded_host() {
        let issuer = issuer(Arc::new(Recording::default()), Some("https://id.example.com"), "")
            .trust_forwarded_headers(true);
        let h = headers(&[("x-forwarded-host", "attacker.example")]);
        let url = issuer.callback_url(&h, &Uri::from_static("/"), "t").unwrap();
        assert_eq!(url.as_str(), "https://id.example.com/login/ott?token=t");
    }

    #[test]
    fn configured_base_overrides_request_host() {
        let issuer = issuer(Arc::new(Recording::default()), Some("https://id.example.com/ignored?x=1"), "");
        let url = issuer
            .callback_url(&headers(&[("host", "evil.example")]), &Uri::from_static("/"), "t")
            .unwrap();
        assert_eq!(url.as_str(), "https://id.example.com/login/ott?token=t");
    }

    #[test]
    fn token_is_percent_encoded() {
        let issuer = issuer(Arc::new(Recording::default()), None, "");
        let url = issuer
            .callback_url(&headers(&[("host", "a.example")]), &Uri::from_static("/"), "a b&c=d")
            .unwrap();
        assert_eq!(url.query_pairs().count(), 1);
        assert_eq!(url.query_pairs().next().unwrap().1, "a b&c=d");
    }

    #[test]
    fn hostile_host_header_is_rejected() {
        let issuer = issuer(Arc::new(Recording::default()), None, "");
        let err = issuer.callback_url(&headers(&[("host", "evil.example/path")]), &Uri::from_static("/"), "t");
        assert!(matches!(err, Err(MagicLinkError::CallbackUrl(_))));
    }

    #[tokio::test]
    async fn dispatch_delivers_link_to_recipient() {
        let mailer = Arc::new(Recording::default());
        let issuer = issuer(mailer.clone(), None, "");
        let link = Url::parse("http://a.example/login/ott?token=t").unwrap();

        issuer.dispatch("alice@example.com".into(), link.clone()).await.unwrap();

        let sent = mailer.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "alice@example.com");
        assert!(sent[0].1.contains(link.as_str()));
    }

    #[tokio::test]
    async fn failing_or_panicking_mailer_does_not_escape_the_task() {
        let link = Url::parse("http://a.example/login/ott?token=t").unwrap();

        let failing = issuer(Arc::new(Failing), None, "");
        assert!(failing.dispatch("a@example.com".into(), link.clone()).await.is_ok());

        let panicking = issuer(Arc::new(Panicking), None, "");
        assert!(panicking.dispatch("a@example.com".into(), link).await.is_ok());
    }

    #[tokio::test]
    async fn redirect_is_found_to_sent_page_under_context_path() {
        let issuer = issuer(Arc::new(Failing), None, "/app");
        let res = issuer.on_generated("a@example.com".into(), Url::parse("http://a.example/").unwrap());
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(res.headers()[header::LOCATION], "/app/ott/sent");
    }
}
