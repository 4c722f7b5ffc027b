//! Outbound email delivery for password-reset links.
//!
//! Delivery is best-effort: the account flows that trigger an email never
//! fail because the transport does. When no SMTP transport is configured the
//! mailer degrades to a logging hook, which is also what tests run against.

use crate::config::SmtpConfig;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
};
use std::sync::Arc;
use tracing::{error, info, instrument};

#[derive(Clone)]
pub struct Mailer {
    transport: Option<Arc<AsyncSmtpTransport<Tokio1Executor>>>,
    from: Option<String>,
    frontend_url: String,
}

impl Mailer {
    /// Build a mailer from the optional SMTP configuration.
    pub fn new(smtp: Option<&SmtpConfig>, frontend_url: &str) -> Result<Self, lettre::transport::smtp::Error> {
        let (transport, from) = match smtp {
            Some(cfg) => {
                let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.server)?
                    .port(cfg.port)
                    .credentials(Credentials::new(cfg.username.clone(), cfg.password.clone()))
                    .build();
                (Some(Arc::new(transport)), Some(cfg.from.clone()))
            }
            None => (None, None),
        };
        Ok(Self {
            transport,
            from,
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
        })
    }

    /// Send a password-reset link carrying the given token.
    #[instrument(skip(self, token))]
    pub async fn send_password_reset(&self, recipient: &str, token: &str) {
        let link = format!(
            "{}/reset-password?email={}&token={}",
            self.frontend_url,
            urlencoding::encode(recipient),
            urlencoding::encode(token),
        );

        let (Some(transport), Some(from)) = (&self.transport, &self.from) else {
            info!(recipient, "No SMTP transport configured, skipping reset email");
            return;
        };

        let message = Message::builder()
            .from(match from.parse() {
                Ok(mailbox) => mailbox,
                Err(e) => {
                    error!(error = ?e, "Invalid sender address, reset email not sent");
                    return;
                }
            })
            .to(match recipient.parse() {
                Ok(mailbox) => mailbox,
                Err(e) => {
                    error!(error = ?e, "Invalid recipient address, reset email not sent");
                    return;
                }
            })
            .subject("Reset your password")
            .header(ContentType::TEXT_PLAIN)
            .body(format!(
                "A password reset was requested for your account.\n\n\
                 Open the link below to choose a new password:\n\n{link}\n\n\
                 If you did not request this, you can ignore this email."
            ));

        let message = match message {
            Ok(message) => message,
            Err(e) => {
                error!(error = ?e, "Failed to build reset email");
                return;
            }
        };

        if let Err(e) = transport.send(message).await {
            error!(error = ?e, recipient, "Failed to send reset email");
        } else {
            info!(recipient, "Sent password-reset email");
        }
    }

    /// Notification hook for phone OTP codes. SMS delivery is not wired up;
    /// the code is surfaced in the logs for operators and development.
    pub fn notify_otp(&self, phone_number: &str, code: &str) {
        info!(phone_number, code, "OTP code generated");
    }
}
