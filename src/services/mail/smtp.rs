use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
};

use super::{MailError, MailSender};
use crate::config::SmtpConfig;

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig, from: &str) -> Result<Self, MailError> {
        let from: Mailbox = from
            .parse()
            .map_err(|e| MailError::InvalidConfig(format!("invalid from address: {e}")))?;

        let mut builder = if config.use_tls {
            let tls = TlsParameters::new(config.host.clone())
                .map_err(|e| MailError::InvalidConfig(format!("TLS configuration error: {e}")))?;

            // Port 465 is implicit TLS, anything else upgrades with STARTTLS.
            let tls = if config.port == 465 {
                Tls::Wrapper(tls)
            } else {
                Tls::Required(tls)
            };

            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                .port(config.port)
                .tls(tls)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host).port(config.port)
        };

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl MailSender for SmtpMailer {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let to: Mailbox = recipient
            .parse()
            .map_err(|e| MailError::SendFailed(format!("invalid recipient: {e}")))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| MailError::SendFailed(format!("failed to build message: {e}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::SendFailed(e.to_string()))?;

        Ok(())
    }
}
