//! SMTP submission via lettre

use axum::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use ulid::Ulid;

use super::{DeliveryReceipt, EmailMessage, MailError, MailTransport};
use crate::config::{EmailConfig, Environment};

/// Port that expects TLS from the first byte
const IMPLICIT_TLS_PORT: u16 = 465;

/// Shared SMTP connection pool
pub struct SmtpMailTransport {
    inner: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
    port: u16,
}

impl SmtpMailTransport {
    pub fn new(config: &EmailConfig, environment: Environment) -> Result<Self, MailError> {
        let port = EmailConfig::port_for(environment);

        let builder = if port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|e| MailError::Build(e.to_string()))?;

        let inner = builder
            .port(port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        tracing::info!(host = %config.host, port, "SMTP transport configured");

        Ok(Self {
            inner,
            host: config.host.clone(),
            port,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn deliver(
        &self,
        from: &Mailbox,
        message: &EmailMessage,
    ) -> Result<DeliveryReceipt, MailError> {
        let message_id = format!("<{}@{}>", Ulid::new(), from.email.domain());
        let email = build_message(from, message, &message_id)?;

        let response = self
            .inner
            .send(email)
            .await
            .map_err(|e| MailError::Delivery(e.to_string()))?;

        tracing::debug!(host = %self.host, code = %response.code(), "SMTP relay accepted message");

        Ok(DeliveryReceipt::accepted(
            message_id,
            response.first_line().unwrap_or_default(),
        ))
    }
}

fn build_message(
    from: &Mailbox,
    message: &EmailMessage,
    message_id: &str,
) -> Result<Message, MailError> {
    let to: Mailbox = message
        .to
        .parse()
        .map_err(|_| MailError::InvalidRecipient(message.to.clone()))?;

    let builder = Message::builder()
        .from(from.clone())
        .to(to)
        .subject(message.subject.as_str())
        .message_id(Some(message_id.to_string()));

    let built = match &message.text {
        Some(text) => {
            builder.multipart(MultiPart::alternative_plain_html(text.clone(), message.html.clone()))
        }
        None => builder.singlepart(
            SinglePart::builder()
                .header(ContentType::TEXT_HTML)
                .body(message.html.clone()),
        ),
    };

    built.map_err(|e| MailError::Build(e.to_string()))
}
