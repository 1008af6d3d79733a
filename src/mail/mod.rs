//! Transactional email
//!
//! `Mailer` owns the sender mailbox and a shared `MailTransport`. Callers
//! either await `send_email` (hooks that must report delivery) or hand the
//! message to `dispatch`, which runs the send on its own task.

mod smtp;
pub mod templates;

pub use smtp::SmtpMailTransport;

use std::sync::Arc;

use axum::async_trait;
use lettre::message::Mailbox;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::metrics::EMAILS_TOTAL;

/// Outgoing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// Template name, used for metrics and logs
    pub template: &'static str,
    pub to: String,
    pub subject: String,
    pub html: String,
    /// Plain-text alternative
    pub text: Option<String>,
}

/// Transport acknowledgement for an accepted message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub message_id: String,
    /// First line of the relay's reply
    pub response: String,
}

impl DeliveryReceipt {
    pub fn accepted(message_id: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            response: response.into(),
        }
    }
}

/// Email error
#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Failed to build message: {0}")]
    Build(String),

    /// The relay refused the message or could not be reached
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Something that can put a message on the wire
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(
        &self,
        from: &Mailbox,
        message: &EmailMessage,
    ) -> Result<DeliveryReceipt, MailError>;
}

/// Process-wide mail dispatcher
#[derive(Clone)]
pub struct Mailer {
    transport: Arc<dyn MailTransport>,
    from: Mailbox,
    portal_url: String,
}

impl Mailer {
    pub fn new(
        transport: Arc<dyn MailTransport>,
        from: Mailbox,
        portal_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            from,
            portal_url: portal_url.into(),
        }
    }

    /// Build the SMTP-backed mailer described by `config`
    pub fn from_config(config: &AppConfig) -> Result<Self, MailError> {
        let from: Mailbox = config
            .email
            .from
            .parse()
            .map_err(|e: lettre::address::AddressError| MailError::Build(e.to_string()))?;
        let transport = SmtpMailTransport::new(&config.email, config.environment)?;

        Ok(Self::new(
            Arc::new(transport),
            from,
            config.server.base_url(),
        ))
    }

    pub fn sender(&self) -> &Mailbox {
        &self.from
    }

    /// Send `message` and wait for the relay's answer
    ///
    /// No retry is attempted.
    pub async fn send_email(&self, message: EmailMessage) -> Result<DeliveryReceipt, MailError> {
        if message.to.parse::<Mailbox>().is_err() {
            EMAILS_TOTAL
                .with_label_values(&[message.template, "rejected"])
                .inc();
            return Err(MailError::InvalidRecipient(message.to));
        }

        match self.transport.deliver(&self.from, &message).await {
            Ok(receipt) => {
                EMAILS_TOTAL
                    .with_label_values(&[message.template, "sent"])
                    .inc();
                tracing::info!(
                    template = message.template,
                    message_id = %receipt.message_id,
                    "Email sent"
                );
                Ok(receipt)
            }
            Err(error) => {
                EMAILS_TOTAL
                    .with_label_values(&[message.template, "failed"])
                    .inc();
                tracing::error!(template = message.template, %error, "Email delivery failed");
                Err(error)
            }
        }
    }

    /// Send `message` in the background
    ///
    /// The outcome is logged by `send_email`; the handle is only useful to
    /// callers that want to observe it.
    pub fn dispatch(&self, message: EmailMessage) -> JoinHandle<Result<DeliveryReceipt, MailError>> {
        let mailer = self.clone();
        tokio::spawn(async move { mailer.send_email(message).await })
    }

    /// Welcome message for a newly created account
    pub fn welcome(&self, to: &str, name: &str) -> EmailMessage {
        let rendered = templates::welcome(name, &self.portal_url);
        rendered.into_message("welcome", to)
    }

    /// Password reset message pointing at `reset_url`
    pub fn password_reset(&self, to: &str, name: &str, reset_url: &str) -> EmailMessage {
        let rendered = templates::password_reset(name, reset_url);
        rendered.into_message("password_reset", to)
    }
}
