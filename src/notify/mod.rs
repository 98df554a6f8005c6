//!
//! Documentation of the notify module.
//! Best-effort email notifications about ride events.
//!
//! Sending never blocks or fails a request: `dispatch` spawns the delivery
//! and only logs what went wrong.
//!

use super::config;
use super::ODM;

pub mod mailer;
pub mod messages;

use std::sync::Arc;
use log::{error, info};

/// A single outgoing notification
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
}

#[rocket::async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers `notice` to every recipient, failing on the first error
    async fn send(&self, notice: &Notice) -> anyhow::Result<()>;
}

/// Fires `notice` in the background. Empty recipient lists are dropped.
pub fn dispatch(notifier: Arc<dyn Notifier>, notice: Notice) {
    if notice.recipients.is_empty() {
        return;
    }

    rocket::tokio::spawn(async move {
        match notifier.send(&notice).await {
            Ok(_) => info!("{}", format!("Server>>Mail:\tSent '{}' to {} recipient(s)", notice.subject, notice.recipients.len())),
            Err(value) => error!("{}", format!("Mail failed while sending '{}': {:#}", notice.subject, value)),
        }
    });
}
