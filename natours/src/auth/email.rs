//! Outbound account email
//!
//! [`Mailer`] is the seam: [`SmtpMailer`] delivers through lettre's async
//! SMTP transport, [`MemoryMailbox`] keeps messages in memory for tests and
//! for local runs without an SMTP server.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tokio::sync::Mutex;

use crate::config::EmailConfig;
use crate::error::{Error, Result};

/// Account emails the service sends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailTemplate {
    /// Sent after signup
    Welcome {
        name: String,
        email: String,
        url: String,
    },
    /// Carries the raw reset token inside `url`
    PasswordReset {
        name: String,
        email: String,
        url: String,
    },
}

/// A rendered message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

fn first_name(name: &str) -> &str {
    name.split_whitespace().next().unwrap_or(name)
}

impl EmailTemplate {
    /// Subject and plain-text body
    pub fn render(&self) -> OutgoingEmail {
        match self {
            Self::Welcome { name, email, url } => OutgoingEmail {
                to: email.clone(),
                subject: "Welcome to the Natours Family!".to_string(),
                body: format!(
                    "Hi {},\n\n\
                    Welcome to Natours, we're glad to have you.\n\n\
                    Upload a profile photo and get started: {}\n",
                    first_name(name),
                    url
                ),
            },
            Self::PasswordReset { name, email, url } => OutgoingEmail {
                to: email.clone(),
                subject: "Your password reset token (valid for only 10 minutes)".to_string(),
                body: format!(
                    "Hi {},\n\n\
                    Forgot your password? Submit a PATCH request with your new password \
                    and passwordConfirm to: {}\n\n\
                    If you didn't forget your password, please ignore this email!\n",
                    first_name(name),
                    url
                ),
            },
        }
    }
}

/// Delivers rendered email
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one message
    async fn send(&self, email: OutgoingEmail) -> Result<()>;
}

/// SMTP delivery through lettre
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build the transport; authenticates only when a username is configured
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let from = Mailbox::new(Some(config.from_name.clone()), config.from_email.parse()?);

        let transport = match &config.username {
            Some(username) => {
                let credentials = Credentials::new(
                    username.clone(),
                    config.password.clone().unwrap_or_default(),
                );
                AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
                    .port(config.smtp_port)
                    .credentials(credentials)
                    .build()
            }
            None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
                .port(config.smtp_port)
                .build(),
        };

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(email.to.parse()?)
            .subject(email.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)?;

        self.transport.send(message).await?;
        tracing::info!(to = %email.to, "email sent");
        Ok(())
    }
}

/// In-memory mailbox
#[derive(Clone, Default)]
pub struct MemoryMailbox {
    sent: Arc<Mutex<Vec<OutgoingEmail>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryMailbox {
    /// Empty mailbox
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later send fail, or succeed again
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Everything delivered so far
    pub async fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().await.clone()
    }

    /// Most recent message to `address`
    pub async fn last_to(&self, address: &str) -> Option<OutgoingEmail> {
        self.sent
            .lock()
            .await
            .iter()
            .rev()
            .find(|email| email.to == address)
            .cloned()
    }
}

#[async_trait]
impl Mailer for MemoryMailbox {
    async fn send(&self, email: OutgoingEmail) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Email("mailbox is refusing messages".to_string()));
        }
        tracing::debug!(to = %email.to, subject = %email.subject, "email stored in memory mailbox");
        self.sent.lock().await.push(email);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_template_carries_url() {
        let email = EmailTemplate::PasswordReset {
            name: "Laura Wilson".to_string(),
            email: "laura@example.com".to_string(),
            url: "http://localhost:3000/api/v1/users/resetPassword/abc".to_string(),
        }
        .render();
        assert_eq!(email.to, "laura@example.com");
        assert!(email.subject.contains("10 minutes"));
        assert!(email.body.starts_with("Hi Laura,"));
        assert!(email.body.contains("/resetPassword/abc"));
    }

    #[tokio::test]
    async fn test_memory_mailbox_records_and_fails_on_demand() {
        let mailbox = MemoryMailbox::new();
        let email = OutgoingEmail {
            to: "a@example.com".to_string(),
            subject: "s".to_string(),
            body: "b".to_string(),
        };
        mailbox.send(email.clone()).await.unwrap();
        assert_eq!(mailbox.last_to("a@example.com").await, Some(email.clone()));

        mailbox.set_failing(true);
        assert!(matches!(mailbox.send(email).await, Err(Error::Email(_))));
        assert_eq!(mailbox.sent().await.len(), 1);
    }

    #[test]
    fn test_smtp_mailer_rejects_bad_sender() {
        let config = EmailConfig {
            smtp_host: "localhost".to_string(),
            smtp_port: 1025,
            username: None,
            password: None,
            from_name: "Natours".to_string(),
            from_email: "not an address".to_string(),
        };
        assert!(matches!(SmtpMailer::new(&config), Err(Error::Email(_))));
    }
}
