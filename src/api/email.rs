//! Outbound email.
//!
//! Handlers only see the `EmailSender` trait. Which side effects may fail the
//! request is decided per call site:
//!
//! | Operation | Side effect | On failure |
//! |---|---|---|
//! | submission intake | staff notification | logged at `warn`, response unaffected |
//! | submission intake | attachment cleanup after a failed insert | logged at `warn` |
//! | submission delete | attachment directory removal | logged at `warn`, still 204 |
//! | inbox reply | the reply itself | 502, nothing is recorded |
//!
//! `SmtpEmailSender` talks to a relay. `LogEmailSender` (`--email-log-only`)
//! logs instead of sending, for local development. Without SMTP settings
//! `DisabledEmailSender` fails every send, so replies surface a 502 and
//! notifications are skipped.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{Instrument, info, info_span};

use crate::cli::commands::smtp::Options as SmtpOptions;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    #[must_use]
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// Email delivery abstraction; plain-text only.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver a message or explain why it could not be delivered.
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the message instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.body,
            "email send stub"
        );
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct DisabledEmailSender;

#[async_trait]
impl EmailSender for DisabledEmailSender {
    async fn send(&self, _message: &EmailMessage) -> Result<()> {
        Err(anyhow!("SMTP is not configured"))
    }
}

pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailSender {
    /// Build a relay transport. Nothing is sent or connected until the first message.
    ///
    /// # Errors
    /// Returns an error if the host is missing, TLS parameters cannot be built,
    /// or the sender address is invalid.
    pub fn new(options: &SmtpOptions) -> Result<Self> {
        let host = options
            .host
            .as_deref()
            .context("SMTP host is not configured")?;

        let builder = if options.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .with_context(|| format!("invalid SMTP relay: {host}"))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        };
        let mut builder = builder.port(options.port);
        if let (Some(user), Some(pass)) = (&options.user, &options.pass) {
            builder = builder.credentials(Credentials::new(
                user.clone(),
                pass.expose_secret().to_string(),
            ));
        }

        let from_email = options
            .from_email
            .as_deref()
            .context("SMTP sender address is not configured")?;
        let from = Mailbox::new(
            Some(options.from_name.clone()),
            from_email
                .parse()
                .with_context(|| format!("invalid sender address: {from_email}"))?,
        );

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let to: Mailbox = message
            .to
            .parse()
            .with_context(|| format!("invalid recipient address: {}", message.to))?;
        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .context("failed to build email")?;

        let span = info_span!("smtp.send", smtp.to = %message.to);
        self.transport
            .send(email)
            .instrument(span)
            .await
            .context("SMTP delivery failed")?;
        Ok(())
    }
}

/// Pick the sender for the configured mode.
///
/// # Errors
/// Returns an error if SMTP settings are present but unusable.
pub fn sender_from_options(options: &SmtpOptions) -> Result<Arc<dyn EmailSender>> {
    if options.log_only {
        return Ok(Arc::new(LogEmailSender));
    }
    if options.host.is_none() {
        return Ok(Arc::new(DisabledEmailSender));
    }
    Ok(Arc::new(SmtpEmailSender::new(options)?))
}


#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn options() -> SmtpOptions {
        SmtpOptions {
            host: None,
            port: 587,
            user: None,
            pass: None,
            from_email: None,
            from_name: "Purple Publishing".to_string(),
            starttls: true,
            log_only: false,
        }
    }

    #[tokio::test]
    async fn log_sender_accepts_everything() -> Result<()> {
        LogEmailSender
            .send(&EmailMessage::new("a@purple.test", "hi", "body"))
            .await
    }

    #[tokio::test]
    async fn unconfigured_smtp_fails_sends() -> Result<()> {
        let sender = sender_from_options(&options())?;
        let result = sender
            .send(&EmailMessage::new("a@purple.test", "hi", "body"))
            .await;
        assert!(result.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn log_only_wins_over_smtp_settings() -> Result<()> {
        let mut options = options();
        options.host = Some("smtp.purple.test".to_string());
        options.from_email = Some("noreply@purple.test".to_string());
        options.log_only = true;
        let sender = sender_from_options(&options)?;
        sender
            .send(&EmailMessage::new("a@purple.test", "hi", "body"))
            .await
    }

    #[tokio::test]
    async fn smtp_sender_builds_without_connecting() -> Result<()> {
        let mut options = options();
        options.host = Some("smtp.purple.test".to_string());
        options.user = Some("inbox@purple.test".to_string());
        options.pass = Some(SecretString::from("pw"));
        options.from_email = Some("inbox@purple.test".to_string());
        let sender = SmtpEmailSender::new(&options)?;
        assert_eq!(sender.from.email.to_string(), "inbox@purple.test");
        Ok(())
    }

    #[test]
    fn invalid_sender_address_is_rejected() {
        let mut options = options();
        options.host = Some("smtp.purple.test".to_string());
        options.from_email = Some("not an address".to_string());
        assert!(SmtpEmailSender::new(&options).is_err());
    }
}
