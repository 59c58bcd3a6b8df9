//! Moderation outcome notifications.
//!
//! Sending is best effort: callers log a failed send and carry on, a
//! transition is never rolled back because a message could not go out.
//! Supports real SMTP delivery and a mock mode that only logs.

pub mod smtp;
pub mod templates;

use crate::app_config::NotificationsConfig;
use crate::note::Note;
use crate::user::User;
use async_trait::async_trait;
use std::sync::Arc;

pub use smtp::SmtpNotifier;
pub use templates::Message;

pub type NotifyResult<T> = Result<T, NotifyError>;

#[derive(Debug)]
pub enum NotifyError {
    /// Bad sender or recipient configuration
    Config(String),
    /// Message could not be built
    Build(String),
    /// Transport failure
    Send(String),
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyError::Config(msg) => write!(f, "Notification config error: {}", msg),
            NotifyError::Build(msg) => write!(f, "Notification build error: {}", msg),
            NotifyError::Send(msg) => write!(f, "Notification send error: {}", msg),
        }
    }
}

impl std::error::Error for NotifyError {}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_approved(&self, note: &Note, uploader: &User) -> NotifyResult<()>;

    async fn notify_rejected(&self, note: &Note, uploader: &User) -> NotifyResult<()>;
}

/// Writes messages to the log instead of sending them.
pub struct LogNotifier {
    site_name: String,
}

impl LogNotifier {
    pub fn new(site_name: impl Into<String>) -> Self {
        Self {
            site_name: site_name.into(),
        }
    }

    fn log(&self, to: &str, message: &Message) {
        log::info!("MOCK EMAIL:");
        log::info!("  To: {}", to);
        log::info!("  Subject: {}", message.subject);
        log::info!("  Body: {}", message.body);
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new(NotificationsConfig::default().site_name)
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_approved(&self, note: &Note, uploader: &User) -> NotifyResult<()> {
        self.log(
            &uploader.email,
            &templates::approved(note, uploader, &self.site_name),
        );
        Ok(())
    }

    async fn notify_rejected(&self, note: &Note, uploader: &User) -> NotifyResult<()> {
        self.log(
            &uploader.email,
            &templates::rejected(note, uploader, &self.site_name),
        );
        Ok(())
    }
}

/// Drops every message.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify_approved(&self, _note: &Note, _uploader: &User) -> NotifyResult<()> {
        Ok(())
    }

    async fn notify_rejected(&self, _note: &Note, _uploader: &User) -> NotifyResult<()> {
        Ok(())
    }
}

/// Picks the notifier described by `config`.
pub fn from_config(config: &NotificationsConfig) -> Arc<dyn Notifier> {
    if !config.enabled {
        log::info!("Notifications disabled");
        Arc::new(NoopNotifier)
    } else if config.mock {
        Arc::new(LogNotifier::new(config.site_name.clone()))
    } else {
        Arc::new(SmtpNotifier::new(config.clone()))
    }
}
