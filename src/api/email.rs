//! Outbound OTP email delivery.
//!
//! Delivery sits behind the [`Mailer`] trait so the server can run against a
//! real SMTP relay in production and a logging sender in local dev and tests.
//! Delivery is fire-and-report: the challenge mutation has already been
//! committed by the time a send is attempted, so a failed send surfaces as an
//! error to the caller and a resend is the only recovery.

use anyhow::{Context, Result};
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::{ExposeSecret, SecretString};
use std::{future::Future, pin::Pin, time::Duration};
use tracing::info;

const DEFAULT_SEND_DEADLINE_SECONDS: u64 = 8;

/// A single OTP notification.
#[derive(Clone, Debug)]
pub struct OtpMessage {
    pub to_email: String,
    pub otp: String,
    pub valid_minutes: i64,
}

/// Email delivery abstraction used by the OTP issuer.
pub trait Mailer: Send + Sync {
    /// Deliver a message or return an error so the caller can report the
    /// delivery failure.
    fn send<'a>(
        &'a self,
        message: &'a OtpMessage,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Validated mail transport configuration.
///
/// Constructed once at startup from CLI/env arguments; handlers never read
/// process-wide environment state for transport credentials.
#[derive(Clone, Debug)]
pub struct MailerConfig {
    sender_email: String,
    smtp_host: String,
    smtp_port: u16,
    smtp_user: String,
    smtp_passkey: SecretString,
    send_deadline: Duration,
    log_only: bool,
}

impl MailerConfig {
    /// SMTP configuration; the sender address must parse as a mailbox.
    ///
    /// # Errors
    /// Returns an error when the sender address or relay host is invalid.
    pub fn smtp(
        sender_email: String,
        smtp_host: String,
        smtp_port: u16,
        smtp_user: String,
        smtp_passkey: SecretString,
    ) -> Result<Self> {
        sender_mailbox(&sender_email)?;
        if smtp_host.trim().is_empty() {
            anyhow::bail!("SMTP host must not be empty");
        }

        Ok(Self {
            sender_email,
            smtp_host,
            smtp_port,
            smtp_user,
            smtp_passkey,
            send_deadline: Duration::from_secs(DEFAULT_SEND_DEADLINE_SECONDS),
            log_only: false,
        })
    }

    /// Configuration for the logging sender used in local dev and tests.
    #[must_use]
    pub fn log_only() -> Self {
        Self {
            sender_email: String::new(),
            smtp_host: String::new(),
            smtp_port: 0,
            smtp_user: String::new(),
            smtp_passkey: SecretString::default(),
            send_deadline: Duration::from_secs(DEFAULT_SEND_DEADLINE_SECONDS),
            log_only: true,
        }
    }

    #[must_use]
    pub fn with_send_deadline_seconds(mut self, seconds: u64) -> Self {
        self.send_deadline = Duration::from_secs(seconds.max(1));
        self
    }

    #[must_use]
    pub fn is_log_only(&self) -> bool {
        self.log_only
    }

    #[must_use]
    pub fn sender_email(&self) -> &str {
        &self.sender_email
    }

    #[must_use]
    pub fn smtp_port(&self) -> u16 {
        self.smtp_port
    }
}

/// Build the delivery backend described by the configuration.
///
/// # Errors
/// Returns an error when the SMTP transport cannot be constructed.
pub fn build_mailer(config: &MailerConfig) -> Result<std::sync::Arc<dyn Mailer>> {
    if config.log_only {
        Ok(std::sync::Arc::new(LogMailer))
    } else {
        Ok(std::sync::Arc::new(SmtpMailer::new(config)?))
    }
}

/// SMTP delivery over STARTTLS via lettre.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpMailer {
    /// # Errors
    /// Returns an error when the relay host or sender address is rejected.
    pub fn new(config: &MailerConfig) -> Result<Self> {
        let credentials = Credentials::new(
            config.smtp_user.clone(),
            config.smtp_passkey.expose_secret().to_string(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .context("invalid SMTP relay host")?
            .port(config.smtp_port)
            .credentials(credentials)
            .timeout(Some(config.send_deadline))
            .build();

        Ok(Self {
            transport,
            sender: sender_mailbox(&config.sender_email)?,
        })
    }
}

impl Mailer for SmtpMailer {
    fn send<'a>(
        &'a self,
        message: &'a OtpMessage,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let to = message
                .to_email
                .parse::<Mailbox>()
                .context("invalid recipient address")?;

            let email = Message::builder()
                .from(self.sender.clone())
                .to(to)
                .subject("Your One-Time Password (OTP)")
                .header(ContentType::TEXT_HTML)
                .body(otp_body(&message.otp, message.valid_minutes))
                .context("failed to build OTP email")?;

            self.transport
                .send(email)
                .await
                .context("failed to deliver OTP email")?;

            Ok(())
        })
    }
}

/// Local dev sender that logs the OTP instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send<'a>(
        &'a self,
        message: &'a OtpMessage,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            info!(
                to_email = %message.to_email,
                otp = %message.otp,
                "OTP email send stub"
            );
            Ok(())
        })
    }
}

fn sender_mailbox(sender_email: &str) -> Result<Mailbox> {
    format!("Tessera <{sender_email}>")
        .parse::<Mailbox>()
        .with_context(|| format!("invalid sender address: {sender_email}"))
}

fn otp_body(otp: &str, valid_minutes: i64) -> String {
    format!(
        r#"<p style="font-size: 18px;">Your One-time Password (OTP) is:</p>
<p style="font-size: 24px; font-weight: bold;">{otp}</p>
<p style="font-size: 18px">The OTP is valid for only <span style="font-weight: bold;">{valid_minutes} minutes</span>.</p>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smtp_config_rejects_bad_sender() {
        let config = MailerConfig::smtp(
            "not-an-address".to_string(),
            "smtp.tessera.dev".to_string(),
            587,
            "mailer".to_string(),
            SecretString::from("passkey".to_string()),
        );
        assert!(config.is_err());
    }

    #[test]
    fn smtp_config_rejects_empty_host() {
        let config = MailerConfig::smtp(
            "no-reply@tessera.dev".to_string(),
            "  ".to_string(),
            587,
            "mailer".to_string(),
            SecretString::from("passkey".to_string()),
        );
        assert!(config.is_err());
    }

    #[test]
    fn log_only_config_builds_log_mailer() {
        let config = MailerConfig::log_only();
        assert!(config.is_log_only());
        assert!(build_mailer(&config).is_ok());
    }

    #[test]
    fn otp_body_carries_code_and_validity() {
        let body = otp_body("A1B2C3", 8);
        assert!(body.contains("A1B2C3"));
        assert!(body.contains("8 minutes"));
    }

    #[tokio::test]
    async fn log_mailer_send_is_ok() {
        let message = OtpMessage {
            to_email: "a@b.com".to_string(),
            otp: "A1B2C3".to_string(),
            valid_minutes: 8,
        };
        assert!(LogMailer.send(&message).await.is_ok());
    }
}
