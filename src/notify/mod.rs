//! Outbound notification collaborator.
//!
//! Password-reset and similar flows hand a message to a `NotificationSender`
//! and move on; delivery is fire and forget and failures never affect the
//! triggering request. The default sender for local development logs the
//! payload; deployments configure a webhook endpoint that receives the
//! message as JSON and owns actual delivery (SMTP, provider API, etc.).

use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info};
use url::Url;

use crate::APP_USER_AGENT;

#[derive(Clone, Debug, Serialize)]
pub struct Notification {
    pub to_email: String,
    pub template: String,
    pub payload: serde_json::Value,
}

/// Delivery abstraction; implementations decide how a message leaves.
pub trait NotificationSender: Send + Sync {
    /// Hand off a message. Implementations must not block the caller on
    /// delivery.
    ///
    /// # Errors
    /// Returns an error when the message cannot even be handed off.
    fn send(&self, notification: &Notification) -> Result<()>;
}

/// Local dev sender that logs the payload instead of delivering it.
#[derive(Clone, Debug)]
pub struct LogNotificationSender;

impl NotificationSender for LogNotificationSender {
    fn send(&self, notification: &Notification) -> Result<()> {
        info!(
            to_email = %notification.to_email,
            template = %notification.template,
            payload = %notification.payload,
            "notification send stub"
        );
        Ok(())
    }
}

/// Posts each notification as JSON to a configured webhook.
#[derive(Clone, Debug)]
pub struct WebhookNotificationSender {
    endpoint: Url,
    client: reqwest::Client,
}

impl WebhookNotificationSender {
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(endpoint: Url) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(Duration::from_secs(5))
            .build()
            .context("failed to build notification HTTP client")?;
        Ok(Self { endpoint, client })
    }
}

impl NotificationSender for WebhookNotificationSender {
    fn send(&self, notification: &Notification) -> Result<()> {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let body = serde_json::to_value(notification)
            .context("failed to serialize notification payload")?;

        // Delivery happens off the request path; the task logs its own
        // failures and nothing is retried.
        tokio::spawn(async move {
            match client.post(endpoint).json(&body).send().await {
                Ok(response) => {
                    if let Err(err) = response.error_for_status() {
                        error!("Notification webhook rejected delivery: {err}");
                    }
                }
                Err(err) => {
                    error!("Notification webhook delivery failed: {err}");
                }
            }
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn log_sender_accepts_messages() {
        let sender = LogNotificationSender;
        let notification = Notification {
            to_email: "jane@x.com".to_string(),
            template: "password_reset".to_string(),
            payload: json!({"reset_token": "token"}),
        };
        assert!(sender.send(&notification).is_ok());
    }

    #[test]
    fn notification_serializes_with_payload() {
        let notification = Notification {
            to_email: "jane@x.com".to_string(),
            template: "password_reset".to_string(),
            payload: json!({"reset_token": "token"}),
        };
        let value = serde_json::to_value(&notification).expect("serialization failed");
        assert_eq!(value["to_email"], "jane@x.com");
        assert_eq!(value["template"], "password_reset");
        assert_eq!(value["payload"]["reset_token"], "token");
    }
}
