use super::*;
use config::config::ConfyConfig;

use anyhow::Context;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Mutex;

use log::{error, info};

/// SMTP delivery through lettre, one HTML message per recipient
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &ConfyConfig) -> anyhow::Result<SmtpNotifier> {
        let from: Mailbox = config.mail_from.parse()
            .with_context(|| format!("invalid sender address '{}'", config.mail_from))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_server)
            .with_context(|| format!("invalid SMTP relay '{}'", config.smtp_server))?
            .port(config.smtp_port)
            .credentials(Credentials::new(config.smtp_username.clone(), config.smtp_password.clone()))
            .build();

        Ok(SmtpNotifier { transport, from })
    }
}

#[rocket::async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, notice: &Notice) -> anyhow::Result<()> {
        for recipient in &notice.recipients {
            let to: Mailbox = recipient.parse()
                .with_context(|| format!("invalid recipient '{}'", recipient))?;

            let email = Message::builder()
                .from(self.from.clone())
                .to(to)
                .subject(notice.subject.clone())
                .header(ContentType::TEXT_HTML)
                .body(notice.body.clone())
                .context("failed to build email")?;

            self.transport.send(email).await
                .with_context(|| format!("SMTP delivery to {} failed", recipient))?;
        }
        Ok(())
    }
}

/// Writes notifications to the log instead of mailing them.
/// Used when SMTP is disabled and in tests.
#[derive(Default)]
pub struct LogNotifier {
    sent: Mutex<Vec<Notice>>,
}

impl LogNotifier {
    pub fn new() -> LogNotifier {
        LogNotifier::default()
    }

    /// Everything "sent" so far
    pub fn sent(&self) -> Vec<Notice> {
        match self.sent.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[rocket::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notice: &Notice) -> anyhow::Result<()> {
        info!("{}", format!("Server>>Mail:\t[{}] to {}: {}", notice.subject, notice.recipients.join(", "), notice.body));
        match self.sent.lock() {
            Ok(mut guard) => guard.push(notice.clone()),
            Err(poisoned) => poisoned.into_inner().push(notice.clone()),
        }
        Ok(())
    }
}

/// Picks the notifier the config asks for, falling back to the log
pub fn from_config(config: &ConfyConfig) -> Arc<dyn Notifier> {
    if !config.smtp_enabled {
        return Arc::new(LogNotifier::new());
    }

    match SmtpNotifier::new(config) {
        Ok(value) => Arc::new(value),
        Err(value) => {
            error!("{}", format!("SMTP setup failed, notifications go to the log: {:#}", value));
            Arc::new(LogNotifier::new())
        },
    }
}
