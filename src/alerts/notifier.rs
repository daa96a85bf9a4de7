//! Notification handlers for alerts

use std::collections::HashMap;

use chrono::{DateTime, Local, Utc};
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;

use super::config::{EmailConfig, NotifyTarget};
use crate::data::MetricKind;

/// A threshold breach to report
#[derive(Debug, Clone, PartialEq)]
pub struct AlertMessage {
    pub kind: MetricKind,
    pub value: f64,
    pub threshold: f64,
    pub at: DateTime<Utc>,
}

impl AlertMessage {
    pub fn subject(&self) -> String {
        format!("ALERT: High {} Usage Detected", self.kind.label())
    }

    fn local_time(&self) -> String {
        self.at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }

    pub fn text(&self) -> String {
        format!(
            "High {} usage: {}% (threshold: {}%) at {}",
            self.kind.label(),
            self.value,
            self.threshold,
            self.local_time()
        )
    }

    pub fn html(&self) -> String {
        let label = self.kind.label();
        format!(
            "<h2>System Resource Alert</h2>\n\
             <p>The system has detected high {label} usage:</p>\n\
             <ul>\n\
             <li><strong>Current {label} Usage:</strong> {value}%</li>\n\
             <li><strong>Threshold:</strong> {threshold}%</li>\n\
             <li><strong>Time:</strong> {time}</li>\n\
             </ul>\n\
             <p>Please check the system to ensure everything is functioning properly.</p>\n",
            label = label,
            value = self.value,
            threshold = self.threshold,
            time = self.local_time(),
        )
    }
}

/// Delivery seam used by the threshold evaluator
pub trait Notify: Send + Sync {
    fn notify<'a>(&'a self, message: &'a AlertMessage) -> BoxFuture<'a, Result<(), NotifierError>>;
}

/// Sends alerts to every configured target
pub struct Notifier {
    client: reqwest::Client,
    targets: Vec<NotifyTarget>,
}

impl Notifier {
    pub fn new(targets: Vec<NotifyTarget>) -> Self {
        Self {
            client: reqwest::Client::new(),
            targets,
        }
    }

    /// Targets taken from `SMTP_*`, `ALERT_TO` and `ALERT_WEBHOOK_URL`
    pub fn from_env() -> Self {
        Self::new(NotifyTarget::from_env())
    }

    pub fn targets(&self) -> &[NotifyTarget] {
        &self.targets
    }

    /// Send to all targets concurrently; fails if any target fails
    pub async fn send(&self, message: &AlertMessage) -> Result<(), NotifierError> {
        tracing::info!(
            metric = %message.kind,
            value = message.value,
            threshold = message.threshold,
            "Attempting to send alert"
        );

        let results = join_all(
            self.targets
                .iter()
                .map(|target| self.notify_target(target, message)),
        )
        .await;

        let errors: Vec<NotifierError> = results.into_iter().filter_map(Result::err).collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(NotifierError::Multiple(errors))
        }
    }

    async fn notify_target(
        &self,
        target: &NotifyTarget,
        message: &AlertMessage,
    ) -> Result<(), NotifierError> {
        match target {
            NotifyTarget::Log => {
                tracing::warn!(metric = %message.kind, "{}", message.text());
                Ok(())
            }
            NotifyTarget::Webhook { url, headers } => {
                self.send_webhook(url, headers, message).await
            }
            NotifyTarget::Email(config) => send_email(config, message).await,
        }
    }

    async fn send_webhook(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        message: &AlertMessage,
    ) -> Result<(), NotifierError> {
        let payload = serde_json::json!({
            "metric": message.kind,
            "value": message.value,
            "threshold": message.threshold,
            "subject": message.subject(),
            "message": message.text(),
            "timestamp": message.at.to_rfc3339(),
        });

        let mut request = self.client.post(url).json(&payload);

        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request.send().await.map_err(|e| {
            NotifierError::Webhook(format!("Failed to send webhook: {}", e))
        })?;

        if !response.status().is_success() {
            return Err(NotifierError::Webhook(format!(
                "Webhook returned status {}",
                response.status()
            )));
        }

        tracing::debug!(url = %url, "Webhook notification sent");
        Ok(())
    }
}

impl Notify for Notifier {
    fn notify<'a>(&'a self, message: &'a AlertMessage) -> BoxFuture<'a, Result<(), NotifierError>> {
        self.send(message).boxed()
    }
}

async fn send_email(config: &EmailConfig, message: &AlertMessage) -> Result<(), NotifierError> {
    use lettre::{
        message::{header::ContentType, Mailbox},
        transport::smtp::authentication::Credentials,
        AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    };

    if config.to.is_empty() {
        return Err(NotifierError::Email("ALERT_TO has no recipients".to_string()));
    }

    let from: Mailbox = format!("\"System Monitor\" <{}>", config.from_address)
        .parse()
        .map_err(email_err)?;

    let mut builder = Message::builder()
        .from(from)
        .subject(message.subject())
        .header(ContentType::TEXT_HTML);

    for to in &config.to {
        let mailbox: Mailbox = to.parse().map_err(email_err)?;
        builder = builder.to(mailbox);
    }

    let email = builder.body(message.html()).map_err(email_err)?;

    let mut transport = if config.secure {
        AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
    }
    .map_err(email_err)?
    .port(config.smtp_port);

    if let (Some(user), Some(pass)) = (&config.smtp_user, &config.smtp_password) {
        transport = transport.credentials(Credentials::new(user.clone(), pass.clone()));
    }

    transport
        .build()
        .send(email)
        .await
        .map_err(email_err)?;

    tracing::info!(recipients = ?config.to, "Alert email sent");
    Ok(())
}

fn email_err(e: impl std::fmt::Display) -> NotifierError {
    NotifierError::Email(e.to_string())
}

/// Notifier errors
#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("Webhook error: {0}")]
    Webhook(String),

    #[error("Email error: {0}")]
    Email(String),

    #[error("Multiple notification failures: {0:?}")]
    Multiple(Vec<NotifierError>),
}
