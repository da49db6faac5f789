//! Platform delivery.
//!
//! Telegram goes through the official Bot API; WhatsApp goes through a
//! self-hosted HTTP gateway of the kind the bridge projects expose (one
//! GET with group, text and api key as query parameters). Both platforms
//! share one HTTP client. Missing credentials surface as a per-group
//! `NotConfigured` failure instead of aborting the run, so a deployment
//! with only Telegram wired up still delivers to its Telegram groups.

use std::time::Duration;

use tracing::{debug, info};

use crate::config::GroupConfig;
use crate::errors::SendError;
use crate::models::Platform;

/// Delivery seam for the distribution orchestrator. Production uses
/// [`PlatformClients`]; dry runs and tests swap in [`NoopMessenger`] or a
/// recording mock.
pub trait Messenger {
    async fn send(&self, group: &GroupConfig, text: &str) -> Result<(), SendError>;
}

/// Real platform clients. Holds whatever credentials the deployment has;
/// sends to a platform without credentials fail as `NotConfigured`.
pub struct PlatformClients {
    client: reqwest::Client,
    telegram_token: Option<String>,
    whatsapp_gateway: Option<String>,
    whatsapp_api_key: Option<String>,
}

impl PlatformClients {
    pub fn new(
        telegram_token: Option<String>,
        whatsapp_gateway: Option<String>,
        whatsapp_api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, SendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SendError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            telegram_token,
            whatsapp_gateway,
            whatsapp_api_key,
        })
    }

    async fn send_telegram(&self, group: &GroupConfig, text: &str) -> Result<(), SendError> {
        let Some(token) = self.telegram_token.as_deref() else {
            return Err(SendError::NotConfigured(Platform::Telegram));
        };
        let url = format!("https://api.telegram.org/bot{token}/sendMessage");
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "chat_id": group.group_id,
                "text": text,
                "parse_mode": "Markdown",
            }))
            .send()
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SendError::Http(status.as_u16()));
        }
        debug!(group = group.id.as_str(), "telegram message delivered");
        Ok(())
    }

    async fn send_whatsapp(&self, group: &GroupConfig, text: &str) -> Result<(), SendError> {
        let (Some(gateway), Some(key)) = (
            self.whatsapp_gateway.as_deref(),
            self.whatsapp_api_key.as_deref(),
        ) else {
            return Err(SendError::NotConfigured(Platform::Whatsapp));
        };
        let url = whatsapp_url(gateway, &group.group_id, text, key);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SendError::Http(status.as_u16()));
        }
        debug!(group = group.id.as_str(), "whatsapp message delivered");
        Ok(())
    }
}

impl Messenger for PlatformClients {
    async fn send(&self, group: &GroupConfig, text: &str) -> Result<(), SendError> {
        match group.platform {
            Platform::Telegram => self.send_telegram(group, text).await,
            Platform::Whatsapp => self.send_whatsapp(group, text).await,
        }
    }
}

fn whatsapp_url(gateway: &str, group_id: &str, text: &str, api_key: &str) -> String {
    format!(
        "{gateway}?group={}&text={}&apikey={}",
        urlencoding::encode(group_id),
        urlencoding::encode(text),
        urlencoding::encode(api_key)
    )
}

/// Logs instead of sending. Used by dry runs.
pub struct NoopMessenger;

impl Messenger for NoopMessenger {
    async fn send(&self, group: &GroupConfig, text: &str) -> Result<(), SendError> {
        info!(
            group = group.id.as_str(),
            platform = %group.platform,
            chars = text.len(),
            "dry run, message not sent"
        );
        Ok(())
    }
}
