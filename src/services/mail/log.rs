use async_trait::async_trait;
use tracing::info;

use super::{MailError, MailSender};

/// Development mailer: writes the message to the log instead of sending it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl MailSender for LogMailer {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), MailError> {
        info!(recipient, subject, body, "mail not sent (log mailer)");
        Ok(())
    }
}
