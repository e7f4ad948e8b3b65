//! Notification transports behind the [`Notifier`] port.

use crate::config::toml_config::{SmtpConfig, TomlConfig, Transport, WebhookConfig};
use crate::core::Notifier;
use crate::domain::model::Notification;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;

const DEFAULT_SMTP_PORT: u16 = 587;

/// Picks the transport from config. `dry_run` always yields a [`LogNotifier`].
pub fn build_notifier(config: &TomlConfig, dry_run: bool) -> Result<Box<dyn Notifier>> {
    if dry_run {
        tracing::info!("🔍 Dry run: notifications will be logged, not delivered");
        return Ok(Box::new(LogNotifier));
    }

    match config.notify.transport {
        Transport::Log => Ok(Box::new(LogNotifier)),
        Transport::Webhook => {
            let webhook = config
                .notify
                .webhook
                .as_ref()
                .ok_or_else(|| EtlError::MissingConfigError {
                    field: "notify.webhook".to_string(),
                })?;
            Ok(Box::new(WebhookNotifier::new(webhook)))
        }
        Transport::Smtp => {
            let smtp = config
                .notify
                .smtp
                .as_ref()
                .ok_or_else(|| EtlError::MissingConfigError {
                    field: "notify.smtp".to_string(),
                })?;
            let from = config
                .notify
                .from
                .as_deref()
                .ok_or_else(|| EtlError::MissingConfigError {
                    field: "notify.from".to_string(),
                })?;

            match (non_empty(&smtp.username), non_empty(&smtp.password)) {
                (Some(username), Some(password)) => Ok(Box::new(SmtpNotifier::new(
                    smtp,
                    from,
                    Credentials::new(username.to_string(), password.to_string()),
                )?)),
                _ => {
                    tracing::error!(
                        "❌ SMTP credentials not configured. Set notify.smtp.username and notify.smtp.password"
                    );
                    Ok(Box::new(UnconfiguredNotifier::new(
                        "SMTP credentials not configured",
                    )))
                }
            }
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Logs each notification and reports it as delivered.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        tracing::info!(
            "📨 Would send '{}' to {} <{}>",
            notification.subject,
            notification.name,
            notification.to
        );
        Ok(())
    }

    fn transport(&self) -> &'static str {
        "log"
    }
}

/// Stands in for a transport that cannot be used; every delivery fails.
#[derive(Debug, Clone)]
pub struct UnconfiguredNotifier {
    reason: String,
}

impl UnconfiguredNotifier {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Notifier for UnconfiguredNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        tracing::warn!(
            "Notification would have been sent to {} ({})",
            notification.name,
            notification.to
        );
        Err(EtlError::NotificationError {
            recipient: notification.to.clone(),
            message: self.reason.clone(),
        })
    }

    fn transport(&self) -> &'static str {
        "unconfigured"
    }
}

/// POSTs each notification as JSON.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    endpoint: String,
    headers: HashMap<String, String>,
    timeout: Option<Duration>,
}

impl WebhookNotifier {
    pub fn new(config: &WebhookConfig) -> Self {
        Self {
            client: Client::new(),
            endpoint: config.endpoint.clone(),
            headers: config.headers.clone().unwrap_or_default(),
            timeout: config.timeout_seconds.map(Duration::from_secs),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        let mut request = self.client.post(&self.endpoint).json(notification);

        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        tracing::debug!("Posting notification for {} to {}", notification.to, self.endpoint);
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(EtlError::NotificationError {
                recipient: notification.to.clone(),
                message: format!("webhook responded with {}", status),
            });
        }

        tracing::info!("✅ Notification delivered to {}", notification.to);
        Ok(())
    }

    fn transport(&self) -> &'static str {
        "webhook"
    }
}

/// Plain-text mail over a STARTTLS relay.
pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig, from: &str, credentials: Credentials) -> Result<Self> {
        let from = parse_mailbox("notify.from", from)?;
        let port = config.port.unwrap_or(DEFAULT_SMTP_PORT);

        tracing::info!("Using SMTP relay {}:{}", config.host, port);
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| EtlError::ConfigError {
                message: format!("Cannot use SMTP relay {}: {}", config.host, e),
            })?
            .port(port)
            .credentials(credentials)
            .build();

        Ok(Self { mailer, from })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        let message = compose_email(&self.from, notification)?;

        self.mailer
            .send(message)
            .await
            .map_err(|e| EtlError::NotificationError {
                recipient: notification.to.clone(),
                message: e.to_string(),
            })?;

        tracing::info!("✅ Successfully sent email to {}", notification.to);
        Ok(())
    }

    fn transport(&self) -> &'static str {
        "smtp"
    }
}

fn parse_mailbox(field: &str, value: &str) -> Result<Mailbox> {
    value
        .parse::<Mailbox>()
        .map_err(|e| EtlError::InvalidConfigValueError {
            field: field.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}

pub fn compose_email(from: &Mailbox, notification: &Notification) -> Result<Message> {
    let address = notification
        .to
        .parse()
        .map_err(|e: lettre::address::AddressError| EtlError::NotificationError {
            recipient: notification.to.clone(),
            message: e.to_string(),
        })?;
    let to = Mailbox::new(Some(notification.name.clone()), address);

    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(notification.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(notification.body.clone())
        .map_err(|e| EtlError::NotificationError {
            recipient: notification.to.clone(),
            message: e.to_string(),
        })
}
