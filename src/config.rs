/*
 * Responsibility
 * - 環境変数や設定の読み込み (DATABASE_URL, VALKEY_URL, TOKEN_SECRET, SMTP, CORS など)
 * - 設定値のバリデーション (不足なら起動失敗)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use url::Url;

use crate::services::auth::token_codec::{MIN_SECRET_BYTES, SigningSecret};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        Self::parse(&std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()))
    }

    fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_tls: bool,
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("use_tls", &self.use_tls)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub from: String,
    // None -> log-only mailer (development)
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub valkey_url: Option<String>,

    pub app_env: AppEnv,
    pub cors_allowed_origins: Vec<String>,

    // HS256 secret; process-wide, read-only after startup
    pub token_secret: SigningSecret,
    pub token_issuer: String,
    // Token lifetimes (seconds)
    pub access_token_ttl_seconds: u64,
    pub one_time_token_ttl_seconds: u64,

    pub public_base_url: Option<Url>,
    // Magic links may take scheme/host from x-forwarded-* only when set
    pub trust_forwarded_headers: bool,
    pub context_path: String,
    pub magic_link_sent_path: String,

    pub mail: MailConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let app_env = AppEnv::from_env();

        let valkey_url = optional("VALKEY_URL");
        if app_env.is_production() && valkey_url.is_none() {
            return Err(ConfigError::Missing("VALKEY_URL"));
        }

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let token_secret = std::env::var("TOKEN_SECRET")
            .map_err(|_| ConfigError::Missing("TOKEN_SECRET"))
            .and_then(|s| SigningSecret::new(s).ok_or(ConfigError::Invalid("TOKEN_SECRET")))?;

        let token_issuer =
            optional("TOKEN_ISSUER").unwrap_or_else(|| "membership-api".to_string());

        let access_token_ttl_seconds = seconds("ACCESS_TOKEN_TTL_SECONDS", 3600)?;
        let one_time_token_ttl_seconds = seconds("ONE_TIME_TOKEN_TTL_SECONDS", 300)?;

        let public_base_url = optional("PUBLIC_BASE_URL")
            .map(|s| Url::parse(&s).map_err(|_| ConfigError::Invalid("PUBLIC_BASE_URL")))
            .transpose()?;

        let trust_forwarded_headers = match optional("TRUST_FORWARDED_HEADERS") {
            None => false,
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid("TRUST_FORWARDED_HEADERS"))?,
        };
        if app_env.is_production() && public_base_url.is_none() && !trust_forwarded_headers {
            return Err(ConfigError::Missing("PUBLIC_BASE_URL"));
        }

        let context_path = normalize_context_path(&std::env::var("CONTEXT_PATH").unwrap_or_default())
            .ok_or(ConfigError::Invalid("CONTEXT_PATH"))?;

        let magic_link_sent_path =
            optional("MAGIC_LINK_SENT_PATH").unwrap_or_else(|| "/ott/sent".to_string());
        if !magic_link_sent_path.starts_with('/') {
            return Err(ConfigError::Invalid("MAGIC_LINK_SENT_PATH"));
        }

        let mail = MailConfig {
            from: optional("MAIL_FROM").unwrap_or_else(|| "no-reply@localhost".to_string()),
            smtp: smtp_from_env()?,
        };
        if app_env.is_production() && mail.smtp.is_none() {
            return Err(ConfigError::Missing("SMTP_HOST"));
        }

        Ok(Self {
            addr,
            database_url,
            valkey_url,
            app_env,
            cors_allowed_origins,
            token_secret,
            token_issuer,
            access_token_ttl_seconds,
            one_time_token_ttl_seconds,
            public_base_url,
            trust_forwarded_headers,
            context_path,
            magic_link_sent_path,
            mail,
        })
    }
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn seconds(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match optional(key) {
        None => Ok(default),
        Some(raw) => match raw.parse::<u64>() {
            Ok(0) | Err(_) => Err(ConfigError::Invalid(key)),
            Ok(v) => Ok(v),
        },
    }
}

fn smtp_from_env() -> Result<Option<SmtpConfig>, ConfigError> {
    let Some(host) = optional("SMTP_HOST") else {
        return Ok(None);
    };

    let port = match optional("SMTP_PORT") {
        None => 587,
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid("SMTP_PORT"))?,
    };

    let use_tls = match optional("SMTP_TLS") {
        None => true,
        Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid("SMTP_TLS"))?,
    };

    Ok(Some(SmtpConfig {
        host,
        port,
        username: optional("SMTP_USERNAME"),
        password: optional("SMTP_PASSWORD"),
        use_tls,
    }))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// "" and "/" -> "", "app/" -> "/app". None when the value is not a plain path.
fn normalize_context_path(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Some(String::new());
    }
    if trimmed.contains(['?', '#', ' ']) || trimmed.contains("//") {
        return None;
    }
    Some(format!("/{trimmed}"))
}
