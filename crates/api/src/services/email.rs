//! Email delivery for verification codes and share notifications.
//!
//! Uses SMTP via lettre for delivery with Askama HTML templates. When SMTP is
//! not configured, [`LogMailer`] records what would have been sent in the log.
//!
//! Notification emails are best-effort: [`notify`] logs failures instead of
//! returning them.

use std::sync::{Arc, Mutex};

use askama::Template;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use larder_core::Email;

use crate::config::SmtpConfig;

/// HTML template for verification code email.
#[derive(Template)]
#[template(path = "email/verification_code.html")]
struct VerificationCodeHtml<'a> {
    code: &'a str,
    minutes: u64,
}

/// Plain text template for verification code email.
#[derive(Template)]
#[template(path = "email/verification_code.txt")]
struct VerificationCodeText<'a> {
    code: &'a str,
    minutes: u64,
}

#[derive(Template)]
#[template(path = "email/password_reset.html")]
struct PasswordResetHtml<'a> {
    code: &'a str,
    minutes: u64,
}

#[derive(Template)]
#[template(path = "email/password_reset.txt")]
struct PasswordResetText<'a> {
    code: &'a str,
    minutes: u64,
}

/// HTML template for list and pantry share notifications.
#[derive(Template)]
#[template(path = "email/shared.html")]
struct SharedHtml<'a> {
    kind: &'a str,
    name: &'a str,
    shared_by: &'a str,
}

#[derive(Template)]
#[template(path = "email/shared.txt")]
struct SharedText<'a> {
    kind: &'a str,
    name: &'a str,
    shared_by: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum MailError {
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

/// The kinds of email the API sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Code to confirm a new account's address.
    VerificationCode { code: String, valid_minutes: u64 },
    /// Code to choose a new password.
    PasswordReset { code: String, valid_minutes: u64 },
    /// A list was shared with the recipient.
    ListShared { list_name: String, shared_by: String },
    /// A pantry was shared with the recipient.
    PantryShared { pantry_name: String, shared_by: String },
}

impl Notification {
    /// Short name used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::VerificationCode { .. } => "verification_code",
            Self::PasswordReset { .. } => "password_reset",
            Self::ListShared { .. } => "list_shared",
            Self::PantryShared { .. } => "pantry_shared",
        }
    }

    /// Subject line.
    #[must_use]
    pub fn subject(&self) -> String {
        match self {
            Self::VerificationCode { .. } => "Verify your Larder email address".to_owned(),
            Self::PasswordReset { .. } => "Reset your Larder password".to_owned(),
            Self::ListShared { shared_by, .. } => format!("{shared_by} shared a list with you"),
            Self::PantryShared { shared_by, .. } => {
                format!("{shared_by} shared a pantry with you")
            }
        }
    }

    /// Render the plain text and HTML bodies.
    ///
    /// # Errors
    ///
    /// Returns `MailError::Template` if a template fails to render.
    pub fn render(&self) -> Result<(String, String), MailError> {
        let bodies = match self {
            Self::VerificationCode {
                code,
                valid_minutes,
            } => (
                VerificationCodeText {
                    code,
                    minutes: *valid_minutes,
                }
                .render()?,
                VerificationCodeHtml {
                    code,
                    minutes: *valid_minutes,
                }
                .render()?,
            ),
            Self::PasswordReset {
                code,
                valid_minutes,
            } => (
                PasswordResetText {
                    code,
                    minutes: *valid_minutes,
                }
                .render()?,
                PasswordResetHtml {
                    code,
                    minutes: *valid_minutes,
                }
                .render()?,
            ),
            Self::ListShared {
                list_name,
                shared_by,
            } => render_shared("list", list_name, shared_by)?,
            Self::PantryShared {
                pantry_name,
                shared_by,
            } => render_shared("pantry", pantry_name, shared_by)?,
        };
        Ok(bodies)
    }
}

fn render_shared(kind: &str, name: &str, shared_by: &str) -> Result<(String, String), MailError> {
    let text = SharedText {
        kind,
        name,
        shared_by,
    }
    .render()?;
    let html = SharedHtml {
        kind,
        name,
        shared_by,
    }
    .render()?;
    Ok((text, html))
}

/// Something that delivers emails.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one email.
    async fn send(&self, to: &Email, notification: &Notification) -> Result<(), MailError>;
}

/// Send a notification, logging instead of returning failures.
pub async fn notify(mailer: &dyn Mailer, to: &Email, notification: Notification) {
    if let Err(e) = mailer.send(to, &notification).await {
        tracing::warn!(
            to = %to,
            kind = notification.kind(),
            error = %e,
            "Failed to send notification email"
        );
    }
}

// =============================================================================
// SMTP
// =============================================================================

/// Mailer that delivers through an SMTP relay.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    /// Create a new SMTP mailer from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the relay cannot be configured.
    pub fn new(config: &SmtpConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_owned(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            transport,
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &Email, notification: &Notification) -> Result<(), MailError> {
        let (text_body, html_body) = notification.render()?;
        let subject = notification.subject();

        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| MailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .as_str()
                .parse()
                .map_err(|_| MailError::InvalidAddress(to.to_string()))?)
            .subject(&subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )?;

        self.transport.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

// =============================================================================
// Local and test mailers
// =============================================================================

/// Mailer that only logs. Used when no SMTP relay is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &Email, notification: &Notification) -> Result<(), MailError> {
        let subject = notification.subject();
        tracing::info!(
            to = %to,
            kind = notification.kind(),
            subject = %subject,
            "SMTP not configured, email not delivered"
        );
        Ok(())
    }
}

/// One email captured by [`RecordingMailer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: Email,
    pub notification: Notification,
}

/// Mailer that keeps every email in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<SentEmail>>>,
    fail: bool,
}

impl RecordingMailer {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A recorder whose sends always fail (after recording the attempt).
    #[must_use]
    pub fn failing() -> Self {
        Self {
            sent: Arc::default(),
            fail: true,
        }
    }

    /// Everything sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    /// Emails sent to one recipient.
    #[must_use]
    pub fn sent_to(&self, to: &Email) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|email| &email.to == to)
            .map(|email| email.notification)
            .collect()
    }

    /// The most recent one-time code sent to `to`, if any.
    #[must_use]
    pub fn last_code(&self, to: &Email) -> Option<String> {
        self.sent_to(to)
            .into_iter()
            .rev()
            .find_map(|notification| match notification {
                Notification::VerificationCode { code, .. }
                | Notification::PasswordReset { code, .. } => Some(code),
                _ => None,
            })
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &Email, notification: &Notification) -> Result<(), MailError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentEmail {
                to: to.clone(),
                notification: notification.clone(),
            });
        }

        if self.fail {
            return Err(MailError::InvalidAddress(to.to_string()));
        }
        Ok(())
    }
}
