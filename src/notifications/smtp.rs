/// SMTP delivery of moderation outcome messages
use super::templates::{self, Message as Outgoing};
use super::{Notifier, NotifyError, NotifyResult};
use crate::app_config::NotificationsConfig;
use crate::note::Note;
use crate::user::User;
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

pub struct SmtpNotifier {
    config: NotificationsConfig,
}

impl SmtpNotifier {
    pub fn new(config: NotificationsConfig) -> Self {
        Self { config }
    }

    fn send(&self, to: &str, outgoing: &Outgoing) -> NotifyResult<()> {
        let config = &self.config;

        let from: Mailbox = format!("{} <{}>", config.from_name, config.from_address)
            .parse()
            .map_err(|e| NotifyError::Config(format!("Invalid from address: {}", e)))?;
        let to_mailbox: Mailbox = to
            .parse()
            .map_err(|e| NotifyError::Config(format!("Invalid to address: {}", e)))?;

        let email = Message::builder()
            .from(from)
            .to(to_mailbox)
            .subject(outgoing.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(outgoing.body.clone())
            .map_err(|e| NotifyError::Build(e.to_string()))?;

        let creds = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());

        let mailer = if config.smtp_tls {
            SmtpTransport::relay(&config.smtp_host)
                .map_err(|e| NotifyError::Config(e.to_string()))?
                .credentials(creds)
                .port(config.smtp_port)
                .build()
        } else {
            SmtpTransport::builder_dangerous(&config.smtp_host)
                .credentials(creds)
                .port(config.smtp_port)
                .build()
        };

        mailer
            .send(&email)
            .map_err(|e| NotifyError::Send(e.to_string()))?;

        log::info!("Email sent successfully to: {}", to);
        Ok(())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify_approved(&self, note: &Note, uploader: &User) -> NotifyResult<()> {
        let message = templates::approved(note, uploader, &self.config.site_name);
        self.send(&uploader.email, &message)
    }

    async fn notify_rejected(&self, note: &Note, uploader: &User) -> NotifyResult<()> {
        let message = templates::rejected(note, uploader, &self.config.site_name);
        self.send(&uploader.email, &message)
    }
}
