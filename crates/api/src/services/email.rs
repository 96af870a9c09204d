//! Email service for account verification and password reset links.
//!
//! Uses SMTP via lettre with Askama plain-text templates. When no SMTP host
//! is configured, messages are written to the log instead.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use ecommerce_core::Email;

use crate::config::EmailConfig;

pub const VERIFY_EMAIL_SUBJECT: &str = "Verify your email";
pub const PASSWORD_RESET_SUBJECT: &str = "Reset your password";

#[derive(Template)]
#[template(path = "email/verify_email.txt")]
struct VerifyEmailText<'a> {
    username: &'a str,
    url: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset.txt")]
struct PasswordResetText<'a> {
    url: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

#[derive(Clone)]
enum Transport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    Log,
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    transport: Transport,
    from: Mailbox,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns `EmailError::Smtp` if the relay cannot be configured.
    /// Returns `EmailError::InvalidAddress` if the sender address is invalid.
    pub fn new(config: &EmailConfig) -> Result<Self, EmailError> {
        let from = parse_mailbox(&config.from_address)?;

        let Some(host) = config.smtp_host.as_deref() else {
            tracing::warn!("SMTP_HOST not set, emails will be logged instead of sent");
            return Ok(Self {
                transport: Transport::Log,
                from,
            });
        };

        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?.port(config.smtp_port);
        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                password.expose_secret().to_owned(),
            ));
        }

        Ok(Self {
            transport: Transport::Smtp(builder.build()),
            from,
        })
    }

    /// An email service that only logs messages.
    #[cfg(test)]
    #[must_use]
    pub fn log_only(from: Mailbox) -> Self {
        Self {
            transport: Transport::Log,
            from,
        }
    }

    /// Send the account verification link.
    ///
    /// # Errors
    ///
    /// Returns error if the template fails to render or delivery fails.
    pub async fn send_verification(
        &self,
        to: &Email,
        username: &str,
        url: &str,
    ) -> Result<(), EmailError> {
        let body = render_verification(username, url)?;
        self.send(to, VERIFY_EMAIL_SUBJECT, body).await
    }

    /// Send a password reset link.
    ///
    /// # Errors
    ///
    /// Returns error if the template fails to render or delivery fails.
    pub async fn send_password_reset(&self, to: &Email, url: &str) -> Result<(), EmailError> {
        let body = PasswordResetText { url }.render()?;
        self.send(to, PASSWORD_RESET_SUBJECT, body).await
    }

    async fn send(&self, to: &Email, subject: &str, body: String) -> Result<(), EmailError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(to.as_str())?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.clone())?;

        match &self.transport {
            Transport::Smtp(mailer) => {
                mailer.send(message).await?;
                tracing::info!(to = %to, subject = %subject, "Email sent successfully");
            }
            Transport::Log => {
                tracing::info!(to = %to, subject = %subject, body = %body, "Email logged (no SMTP host)");
            }
        }
        Ok(())
    }
}

fn render_verification(username: &str, url: &str) -> Result<String, EmailError> {
    Ok(VerifyEmailText { username, url }.render()?)
}

fn parse_mailbox(address: &str) -> Result<Mailbox, EmailError> {
    address
        .parse()
        .map_err(|_| EmailError::InvalidAddress(address.to_owned()))
}
