use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, error};

use crate::error::NotifyError;
use crate::event::NotifyEvent;
use crate::sink::NotificationSink;

/// SMTP configuration for the email sink.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Sender address.
    pub from: String,
    /// Admin recipients; each receives every event.
    pub recipients: Vec<String>,
}

/// Email delivery sink using `lettre` over STARTTLS.
pub struct EmailSink {
    config: SmtpConfig,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl std::fmt::Debug for EmailSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailSink")
            .field("host", &self.config.host)
            .field("recipients", &self.config.recipients.len())
            .finish_non_exhaustive()
    }
}

impl EmailSink {
    /// Build the sink, constructing the SMTP transport.
    pub fn new(config: SmtpConfig) -> Result<Self, NotifyError> {
        if config.recipients.is_empty() {
            return Err(NotifyError::Configuration(
                "no admin recipients configured".to_owned(),
            ));
        }
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| NotifyError::Configuration(format!("SMTP relay: {e}")))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();
        Ok(Self { config, transport })
    }

    fn build_message(&self, to: &str, event: &NotifyEvent) -> Result<Message, NotifyError> {
        let from: Mailbox = self
            .config
            .from
            .parse()
            .map_err(|e| NotifyError::Configuration(format!("invalid from address: {e}")))?;
        let to: Mailbox = to
            .parse()
            .map_err(|e| NotifyError::Configuration(format!("invalid recipient: {e}")))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(event.subject())
            .header(ContentType::TEXT_HTML)
            .body(event.html_body())
            .map_err(|e| NotifyError::Delivery(format!("failed to build email: {e}")))
    }
}

#[async_trait]
impl NotificationSink for EmailSink {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn deliver(&self, event: &NotifyEvent) -> Result<(), NotifyError> {
        let mut last_error = None;
        for recipient in &self.config.recipients {
            let message = self.build_message(recipient, event)?;
            debug!(kind = event.kind(), "sending notification email");
            if let Err(e) = self.transport.send(message).await {
                error!(error = %e, kind = event.kind(), "SMTP send failed");
                last_error = Some(NotifyError::Delivery(e.to_string()));
            }
        }
        match last_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
