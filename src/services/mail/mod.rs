//! Outbound mail. Only used to deliver magic-link URLs.

mod log;
mod smtp;

pub use log::LogMailer;
pub use smtp::SmtpMailer;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::MailConfig;

/// Delivery failure. Never fatal to the HTTP request that triggered the mail.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("failed to send mail: {0}")]
    SendFailed(String),

    #[error("invalid mail configuration: {0}")]
    InvalidConfig(String),
}

#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

/// SMTP when a host is configured, otherwise log-only.
pub fn build_mailer(config: &MailConfig) -> Result<Arc<dyn MailSender>, MailError> {
    match &config.smtp {
        Some(smtp) => Ok(Arc::new(SmtpMailer::new(smtp, &config.from)?)),
        None => Ok(Arc::new(LogMailer)),
    }
}
