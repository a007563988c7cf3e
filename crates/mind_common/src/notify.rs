//! Outbound notifications - verification codes, recovery codes, support mail.
//!
//! Delivery is fire-and-forget: [`dispatch`] runs the sender on a blocking
//! task and only logs failures. Nothing here can fail a state-machine call.

use crate::error::{MindError, MindResult};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Verification,
    PasswordReset,
    Support,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub from: String,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn verification(from: &str, to: &str, name: &str, code: &str, ttl_minutes: i64) -> Self {
        Self {
            kind: NotificationKind::Verification,
            from: from.to_string(),
            to: to.to_string(),
            reply_to: None,
            subject: "Your verification code".to_string(),
            body: format!(
                "Hi {}, your code is: {}. It expires in {} minutes.",
                name, code, ttl_minutes
            ),
        }
    }

    pub fn password_reset(from: &str, to: &str, code: &str, ttl_minutes: i64) -> Self {
        Self {
            kind: NotificationKind::PasswordReset,
            from: from.to_string(),
            to: to.to_string(),
            reply_to: None,
            subject: "Reset your password".to_string(),
            body: format!(
                "Your password reset code is: {}. It expires in {} minutes.",
                code, ttl_minutes
            ),
        }
    }

    pub fn support(from: &str, support_address: &str, learner_email: &str, message: &str) -> Self {
        Self {
            kind: NotificationKind::Support,
            from: from.to_string(),
            to: support_address.to_string(),
            reply_to: Some(learner_email.to_string()),
            subject: format!("New support request from {}", learner_email),
            body: format!("User: {}\n\nMessage:\n{}", learner_email, message),
        }
    }
}

/// Outbound notification sender
pub trait Notifier: Send + Sync {
    fn send(&self, notification: &Notification) -> MindResult<()>;
}

/// Writes notifications to the log instead of delivering them
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, notification: &Notification) -> MindResult<()> {
        info!(
            "[notify] {:?} to {}: {} / {}",
            notification.kind, notification.to, notification.subject, notification.body
        );
        Ok(())
    }
}

/// Posts notifications as JSON to a mail relay webhook.
///
/// The blocking HTTP client is built on first use, which always happens on
/// a blocking task (see [`dispatch`]).
pub struct WebhookNotifier {
    url: String,
    timeout: Duration,
    client: OnceLock<reqwest::blocking::Client>,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration) -> Self {
        Self {
            url: url.to_string(),
            timeout,
            client: OnceLock::new(),
        }
    }

    fn client(&self) -> MindResult<&reqwest::blocking::Client> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("mind-devs/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MindError::UpstreamUnavailable(format!("Failed to create HTTP client: {}", e)))?;
        Ok(self.client.get_or_init(|| client))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Notifier for WebhookNotifier {
    fn send(&self, notification: &Notification) -> MindResult<()> {
        let response = self
            .client()?
            .post(&self.url)
            .json(notification)
            .send()
            .map_err(|e| MindError::UpstreamUnavailable(format!("notification relay: {}", e)))?;

        if !response.status().is_success() {
            return Err(MindError::UpstreamUnavailable(format!(
                "notification relay returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Send in the background; failures are logged, never returned
pub fn dispatch(notifier: Arc<dyn Notifier>, notification: Notification) {
    tokio::task::spawn_blocking(move || {
        if let Err(e) = notifier.send(&notification) {
            warn!(
                "Failed to deliver {:?} notification to {}: {}",
                notification.kind, notification.to, e
            );
        }
    });
}
