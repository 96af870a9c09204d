//! SMS delivery for phone login codes.
//!
//! Messages are POSTed as JSON to a configurable webhook (an SMS gateway or a
//! small relay in front of one). Without a webhook the message is logged.

use askama::Template;
use serde::Serialize;
use thiserror::Error;

use ecommerce_core::PhoneNumber;

use crate::config::SmsConfig;

#[derive(Template)]
#[template(path = "sms/otp.txt")]
struct OtpText<'a> {
    otp: &'a str,
    minutes: u64,
}

/// Errors that can occur when sending SMS.
#[derive(Debug, Error)]
pub enum SmsError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway returned an error response.
    #[error("gateway error: {status} - {message}")]
    Gateway { status: u16, message: String },

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    to: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<&'a str>,
    body: &'a str,
}

/// SMS service for one-time passwords.
#[derive(Clone)]
pub struct SmsService {
    client: reqwest::Client,
    config: SmsConfig,
}

impl SmsService {
    /// Create a new SMS service.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: SmsConfig) -> Result<Self, SmsError> {
        if config.webhook_url.is_none() {
            tracing::warn!("SMS_WEBHOOK_URL not set, SMS will be logged instead of sent");
        }
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self { client, config })
    }

    /// Send a login code.
    ///
    /// # Errors
    ///
    /// Returns error if rendering fails or the gateway rejects the message.
    pub async fn send_otp(
        &self,
        to: &PhoneNumber,
        otp: &str,
        validity: std::time::Duration,
    ) -> Result<(), SmsError> {
        let body = render_otp(otp, validity)?;

        let Some(url) = &self.config.webhook_url else {
            tracing::info!(to = %to, body = %body, "SMS logged (no webhook)");
            return Ok(());
        };

        let response = self
            .client
            .post(url.clone())
            .json(&WebhookMessage {
                to: to.as_str(),
                from: self.config.from_number.as_deref(),
                body: &body,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SmsError::Gateway {
                status: status.as_u16(),
                message,
            });
        }

        tracing::info!(to = %to, "SMS sent successfully");
        Ok(())
    }
}

fn render_otp(otp: &str, validity: std::time::Duration) -> Result<String, SmsError> {
    Ok(OtpText {
        otp,
        minutes: validity.as_secs().div_ceil(60),
    }
    .render()?)
}
