//! # Alert Dispatch
//!
//! Contract for notifying external channels about critical security events.
//! Delivery transports live outside this crate; the gateway only needs the
//! `trigger_alert` call. Channels are enabled independently through
//! [`AlertConfig`].

use crate::core::config::AlertConfig;
use crate::core::types::Severity;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// Delivery channel for an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertChannel {
    Email,
    ChatWebhook,
    Webhook,
    Sms,
}

/// Channels enabled by a configuration.
pub fn enabled_channels(config: &AlertConfig) -> Vec<AlertChannel> {
    if !config.enabled {
        return Vec::new();
    }

    let mut channels = Vec::new();
    if config.email {
        channels.push(AlertChannel::Email);
    }
    if config.chat_webhook {
        channels.push(AlertChannel::ChatWebhook);
    }
    if config.webhook {
        channels.push(AlertChannel::Webhook);
    }
    if config.sms {
        channels.push(AlertChannel::Sms);
    }
    channels
}

/// External alert collaborator contract.
#[async_trait]
pub trait AlertDispatcher: Send + Sync {
    /// Dispatch an alert to every enabled channel. Failures are the
    /// dispatcher's problem; the pipeline never blocks on delivery.
    async fn trigger_alert(
        &self,
        category: &str,
        severity: Severity,
        message: &str,
        payload: serde_json::Value,
    );
}

/// Default dispatcher: emits structured log events per enabled channel.
///
/// Stands in until a deployment wires real transports; the log stream is
/// what on-call tooling tails in the meantime.
pub struct TracingAlertDispatcher {
    config: AlertConfig,
}

impl TracingAlertDispatcher {
    pub fn new(config: AlertConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl AlertDispatcher for TracingAlertDispatcher {
    async fn trigger_alert(
        &self,
        category: &str,
        severity: Severity,
        message: &str,
        payload: serde_json::Value,
    ) {
        for channel in enabled_channels(&self.config) {
            match severity {
                Severity::Critical => error!(
                    category = %category,
                    channel = ?channel,
                    severity = %severity,
                    payload = %payload,
                    "{}",
                    message
                ),
                _ => warn!(
                    category = %category,
                    channel = ?channel,
                    severity = %severity,
                    payload = %payload,
                    "{}",
                    message
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_config_has_no_channels() {
        let config = AlertConfig {
            enabled: false,
            email: true,
            chat_webhook: true,
            webhook: true,
            sms: true,
        };
        assert!(enabled_channels(&config).is_empty());
    }

    #[test]
    fn channels_toggle_independently() {
        let config = AlertConfig {
            enabled: true,
            email: true,
            chat_webhook: false,
            webhook: true,
            sms: false,
        };
        assert_eq!(
            enabled_channels(&config),
            vec![AlertChannel::Email, AlertChannel::Webhook]
        );
    }
}
