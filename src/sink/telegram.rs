use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::config::TelegramConfig;
use crate::error::SourceError;
use crate::market_data::adapters::{check_status, http_client};

use super::traits::Notifier;

const SERVICE: &str = "telegram";
const API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct SendResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Bot API `sendMessage` with HTML parse mode.
pub struct TelegramNotifier {
    client: Client,
    config: TelegramConfig,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Result<Self, SourceError> {
        Ok(Self {
            client: http_client()?,
            config,
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, message: &str) -> Result<(), SourceError> {
        let resp = self
            .client
            .post(format!("{API_URL}/bot{}/sendMessage", self.config.bot_token))
            .json(&json!({
                "chat_id": self.config.chat_id,
                "text": message,
                "parse_mode": "HTML",
            }))
            .send()
            .await?;
        let body: SendResponse = check_status(SERVICE, resp)?.json().await?;
        if !body.ok {
            return Err(SourceError::Rejected {
                service: SERVICE,
                reason: body.description.unwrap_or_default(),
            });
        }
        Ok(())
    }
}
