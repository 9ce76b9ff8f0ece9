//! Outbound OTP delivery.
//!
//! OTP codes are delivered over SMTP. When no relay host is configured the
//! mailer runs in log-only mode, which is what local development uses. A
//! delivery failure is surfaced to the caller and never rolls back the
//! already-persisted code: the remedy is to request a fresh OTP, which
//! supersedes the old one.

use crate::cli::globals::GlobalArgs;
use anyhow::{Context, Result};
use lettre::{
    message::{header, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::info;

/// Delivery purpose, used only for message copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPurpose {
    Registration,
    PasswordReset,
}

impl OtpPurpose {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::PasswordReset => "password reset",
        }
    }
}

/// Async SMTP wrapper; log-only when no relay is configured.
#[derive(Clone)]
pub struct Mailer {
    transport: Option<Arc<AsyncSmtpTransport<Tokio1Executor>>>,
    from: Mailbox,
}

impl Mailer {
    /// Build the mailer from runtime configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the from address or relay host is invalid.
    pub fn new(globals: &GlobalArgs) -> Result<Self> {
        let from = globals
            .smtp_from
            .parse::<Mailbox>()
            .with_context(|| format!("Invalid from address: {}", globals.smtp_from))?;

        let transport = match &globals.smtp_host {
            None => None,
            Some(host) if host.trim().is_empty() => None,
            Some(host) => {
                let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                    .with_context(|| format!("Failed to configure SMTP relay: {host}"))?
                    .port(globals.smtp_port);

                if let Some(username) = &globals.smtp_username {
                    builder = builder.credentials(Credentials::new(
                        username.clone(),
                        globals.smtp_password.expose_secret().to_string(),
                    ));
                }

                Some(Arc::new(builder.build()))
            }
        };

        Ok(Self { transport, from })
    }

    /// Log-only mailer for development and tests.
    #[must_use]
    pub fn log_only() -> Self {
        Self {
            transport: None,
            from: Mailbox::new(
                Some("Recipe Finder".to_string()),
                "no-reply@recipefinder.dev"
                    .parse()
                    .unwrap_or_else(|_| unreachable!("static address is valid")),
            ),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    /// Send an OTP code to an email address.
    ///
    /// # Errors
    ///
    /// Returns an error when the SMTP relay rejects or fails the send.
    pub async fn send_otp(&self, to: &str, purpose: OtpPurpose, code: &str) -> Result<()> {
        let subject = "Your Recipe Finder verification code";
        let body = format!(
            "Your OTP for {} is: {code}\nThis code expires in 10 minutes.\n\nIf you didn't request this code, please ignore this email.",
            purpose.as_str()
        );

        let Some(transport) = &self.transport else {
            info!(to = %to, purpose = purpose.as_str(), "otp mail send stub");
            return Ok(());
        };

        let message = Message::builder()
            .from(self.from.clone())
            .to(to
                .parse::<Mailbox>()
                .with_context(|| format!("Invalid recipient address: {to}"))?)
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(body)
            .context("Failed to build OTP message")?;

        transport
            .send(message)
            .await
            .context("SMTP relay rejected OTP message")?;

        Ok(())
    }
}
