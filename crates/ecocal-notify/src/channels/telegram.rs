use super::{retry_backoff, MAX_ATTEMPTS};
use crate::error::NotifyError;
use crate::plugin::ChannelPlugin;
use crate::template::Markup;
use crate::utils::{truncate_body, MAX_BODY_LENGTH};
use crate::{NotificationChannel, SendResponse};
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Sends messages through the Telegram Bot API (`sendMessage`).
pub struct TelegramChannel {
    instance_id: String,
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
    parse_mode: Option<String>,
    markup: Markup,
    disable_notification: bool,
}

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Option<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

impl TelegramChannel {
    /// An unsupported `parse_mode` falls back to plain text; the plugin
    /// rejects it before a channel is ever built.
    pub fn new(instance_id: &str, config: TelegramConfig) -> Self {
        let markup = Markup::from_parse_mode(config.parse_mode.as_deref()).unwrap_or_default();
        let parse_mode = match markup {
            Markup::Plain => None,
            _ => config.parse_mode,
        };
        Self {
            instance_id: instance_id.to_string(),
            client: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bot_token: config.bot_token,
            parse_mode,
            markup,
            disable_notification: config.disable_notification,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }

    pub fn build_payload(&self, chat_id: &str, text: &str) -> Value {
        let mut payload = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(mode) = &self.parse_mode {
            payload["parse_mode"] = Value::String(mode.clone());
        }
        if self.disable_notification {
            payload["disable_notification"] = Value::Bool(true);
        }
        payload
    }

    async fn send_once(&self, payload: &Value) -> std::result::Result<(u16, Option<i64>), NotifyError> {
        let resp = self.client.post(self.endpoint()).json(payload).send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;

        let envelope: Option<ApiEnvelope> = serde_json::from_str(&body).ok();
        match envelope {
            Some(env) if (200..300).contains(&status) && env.ok => {
                Ok((status, env.result.map(|m| m.message_id)))
            }
            Some(env) => Err(NotifyError::Rejected {
                service: "telegram",
                status,
                body: env
                    .description
                    .unwrap_or_else(|| truncate_body(&body, MAX_BODY_LENGTH)),
            }),
            None => Err(NotifyError::Rejected {
                service: "telegram",
                status,
                body: truncate_body(&body, MAX_BODY_LENGTH),
            }),
        }
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    async fn send(&self, destination: &str, text: &str) -> Result<SendResponse> {
        let payload = self.build_payload(destination, text);
        let mut last_err = None;

        for attempt in 0..MAX_ATTEMPTS {
            match self.send_once(&payload).await {
                Ok((status, message_id)) => {
                    tracing::debug!(
                        chat_id = %destination,
                        attempts = attempt + 1,
                        "Telegram message sent"
                    );
                    return Ok(SendResponse {
                        http_status: Some(status),
                        retry_count: attempt,
                        api_message_id: message_id.map(|id| id.to_string()),
                    });
                }
                Err(e) => {
                    let retryable = e.is_retryable();
                    tracing::warn!(
                        chat_id = %destination,
                        attempt = attempt + 1,
                        retryable,
                        error = %e,
                        "Telegram send failed"
                    );
                    last_err = Some(e);
                    if !retryable {
                        break;
                    }
                }
            }
            if attempt + 1 < MAX_ATTEMPTS {
                tokio::time::sleep(retry_backoff(attempt)).await;
            }
        }

        match last_err {
            Some(e) => Err(e.into()),
            None => Err(anyhow::anyhow!("Telegram send gave up without an error")),
        }
    }

    fn channel_type(&self) -> &str {
        "telegram"
    }

    fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn markup(&self) -> Markup {
        self.markup
    }
}

// Plugin

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    #[serde(default)]
    pub parse_mode: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub disable_notification: bool,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn parse_config(config: &Value) -> Result<TelegramConfig> {
    let cfg: TelegramConfig = serde_json::from_value(config.clone())
        .map_err(|e| NotifyError::InvalidConfig {
            channel: "telegram",
            reason: e.to_string(),
        })?;
    if cfg.bot_token.trim().is_empty() {
        return Err(NotifyError::InvalidConfig {
            channel: "telegram",
            reason: "bot_token is empty".to_string(),
        }
        .into());
    }
    Markup::from_parse_mode(cfg.parse_mode.as_deref())
        .map_err(|reason| NotifyError::InvalidConfig {
            channel: "telegram",
            reason,
        })?;
    Ok(cfg)
}

pub struct TelegramPlugin;

impl ChannelPlugin for TelegramPlugin {
    fn name(&self) -> &'static str {
        "telegram"
    }

    fn recipient_type(&self) -> &'static str {
        "chat_id"
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        parse_config(config).map(|_| ())
    }

    fn create_channel(
        &self,
        instance_id: &str,
        config: &Value,
    ) -> Result<Box<dyn NotificationChannel>> {
        Ok(Box::new(TelegramChannel::new(instance_id, parse_config(config)?)))
    }

}
