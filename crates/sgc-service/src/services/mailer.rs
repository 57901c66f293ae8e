//! Outbound mail
//!
//! [`SmtpMailer`] delivers through `lettre` when SMTP is configured. Without
//! it, [`LogMailer`] writes the message to the log so reset and invite links
//! stay usable in development. [`CapturingMailer`] keeps messages in memory.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use parking_lot::Mutex;
use sgc_common::config::{MailConfig, SmtpConfig};
use tracing::{info, instrument};

/// Mail delivery failure
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Invalid address {0}")]
    Address(String),

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("SMTP error: {0}")]
    Transport(String),
}

/// A plain-text message ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutgoingMail {
    pub fn password_reset(to: &str, reset_url: &str, max_age_secs: i64) -> Self {
        Self {
            to: to.to_string(),
            subject: "Reset your SGC password".to_string(),
            body: format!(
                "We received a request to reset the password for your SGC account.\n\n\
                 Open the link below to choose a new password:\n\n{reset_url}\n\n\
                 The link expires in {} minutes. If you did not ask for this, ignore this message.\n",
                max_age_secs / 60
            ),
        }
    }

    pub fn invite(to: &str, invite_url: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "You are invited to SGC".to_string(),
            body: format!(
                "An administrator invited you to create an SGC account.\n\n\
                 Register here:\n\n{invite_url}\n\n\
                 New accounts are reviewed before they can sign in.\n"
            ),
        }
    }
}

/// Delivers outgoing mail
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

/// Mailer for the configured backend
pub fn mailer_from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>, MailError> {
    match &config.smtp {
        Some(smtp) => Ok(Arc::new(SmtpMailer::from_config(smtp)?)),
        None => {
            info!("SMTP not configured, mail will be written to the log");
            Ok(Arc::new(LogMailer))
        }
    }
}

// ============================================================================
// SMTP
// ============================================================================

/// `lettre` SMTP transport
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(config: &SmtpConfig) -> Result<Self, MailError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|_| MailError::Address(config.from.clone()))?;

        // Port 465 speaks implicit TLS; anything else upgrades with STARTTLS
        let builder = if config.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|e| MailError::Transport(e.to_string()))?
        .port(config.port);

        let builder = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => builder.credentials(Credentials::new(user.clone(), pass.clone())),
            _ => builder,
        };

        info!(host = %config.host, port = config.port, "SMTP mailer configured");

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    #[instrument(skip(self, mail), fields(subject = %mail.subject))]
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        let to: Mailbox = mail
            .to
            .parse()
            .map_err(|_| MailError::Address(mail.to.clone()))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body)
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        info!("Mail sent");
        Ok(())
    }
}

impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("from", &self.from.to_string())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Log fallback
// ============================================================================

/// Writes the message to the log instead of sending it
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        info!(to = %mail.to, subject = %mail.subject, body = %mail.body, "Mail not sent (SMTP disabled)");
        Ok(())
    }
}

// ============================================================================
// Capture
// ============================================================================

/// Keeps every message in memory
#[derive(Debug, Default)]
pub struct CapturingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
}

impl CapturingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().clone()
    }

    pub fn last_to(&self, to: &str) -> Option<OutgoingMail> {
        self.sent.lock().iter().rev().find(|m| m.to == to).cloned()
    }

    /// First `http(s)://` token in the newest message to `to`
    pub fn last_link_to(&self, to: &str) -> Option<String> {
        self.last_to(to)?
            .body
            .split_whitespace()
            .find(|word| word.starts_with("http://") || word.starts_with("https://"))
            .map(str::to_string)
    }
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        self.sent.lock().push(mail);
        Ok(())
    }
}
