use super::{retry_backoff, MAX_ATTEMPTS};
use crate::error::NotifyError;
use crate::plugin::ChannelPlugin;
use crate::utils::{truncate_body, MAX_BODY_LENGTH};
use crate::{NotificationChannel, SendResponse};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

/// POSTs every message to one fixed URL. The destination travels in the
/// body so a single receiver can fan out to several chats.
pub struct WebhookChannel {
    instance_id: String,
    client: reqwest::Client,
    url: String,
    body_template: Option<String>,
}

impl WebhookChannel {
    pub fn new(instance_id: &str, url: String, body_template: Option<String>) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            client: reqwest::Client::new(),
            url,
            body_template,
        }
    }

    pub fn render_body(&self, destination: &str, text: &str) -> String {
        if let Some(template) = &self.body_template {
            // Values are JSON-escaped so they can sit inside a quoted field.
            template
                .replace("{{destination}}", &json_escape(destination))
                .replace("{{text}}", &json_escape(text))
                .replace("{{sent_at}}", &Utc::now().to_rfc3339())
        } else {
            serde_json::json!({
                "destination": destination,
                "text": text,
                "sent_at": Utc::now().to_rfc3339(),
            })
            .to_string()
        }
    }
}

fn json_escape(s: &str) -> String {
    let quoted = Value::String(s.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    async fn send(&self, destination: &str, text: &str) -> Result<SendResponse> {
        let body = self.render_body(destination, text);
        let mut last_err: Option<NotifyError> = None;

        for attempt in 0..MAX_ATTEMPTS {
            match self
                .client
                .post(self.url.as_str())
                .header("Content-Type", "application/json")
                .body(body.clone())
                .send()
                .await
            {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(SendResponse {
                            http_status: Some(status.as_u16()),
                            retry_count: attempt,
                            api_message_id: None,
                        });
                    }
                    let resp_body = match resp.text().await {
                        Ok(text) => truncate_body(&text, MAX_BODY_LENGTH),
                        Err(e) => format!("[Failed to read response body: {e}]"),
                    };
                    tracing::warn!(
                        attempt = attempt + 1,
                        status = %status,
                        "Webhook returned non-success status"
                    );
                    last_err = Some(NotifyError::Rejected {
                        service: "webhook",
                        status: status.as_u16(),
                        body: resp_body,
                    });
                }
                Err(e) => {
                    tracing::warn!(attempt = attempt + 1, error = %e, "Webhook send failed");
                    last_err = Some(e.into());
                }
            }

            if !last_err.as_ref().is_some_and(NotifyError::is_retryable) {
                break;
            }
            if attempt + 1 < MAX_ATTEMPTS {
                tokio::time::sleep(retry_backoff(attempt)).await;
            }
        }

        match last_err {
            Some(e) => {
                tracing::error!(url = %self.url, error = %e, "Webhook delivery failed");
                Err(e.into())
            }
            None => Err(anyhow::anyhow!("Webhook send gave up without an error")),
        }
    }

    fn channel_type(&self) -> &str {
        "webhook"
    }

    fn instance_id(&self) -> &str {
        &self.instance_id
    }
}

// Plugin

#[derive(Deserialize)]
struct WebhookConfig {
    url: String,
    body_template: Option<String>,
}

fn parse_config(config: &Value) -> Result<WebhookConfig> {
    let cfg: WebhookConfig = serde_json::from_value(config.clone())
        .map_err(|e| NotifyError::InvalidConfig {
            channel: "webhook",
            reason: e.to_string(),
        })?;
    if !(cfg.url.starts_with("http://") || cfg.url.starts_with("https://")) {
        return Err(NotifyError::InvalidConfig {
            channel: "webhook",
            reason: format!("url must be http(s), got '{}'", cfg.url),
        }
        .into());
    }
    Ok(cfg)
}

pub struct WebhookPlugin;

impl ChannelPlugin for WebhookPlugin {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn recipient_type(&self) -> &'static str {
        "routing_key"
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        parse_config(config).map(|_| ())
    }

    fn create_channel(
        &self,
        instance_id: &str,
        config: &Value,
    ) -> Result<Box<dyn NotificationChannel>> {
        let cfg = parse_config(config)?;
        Ok(Box::new(WebhookChannel::new(
            instance_id,
            cfg.url,
            cfg.body_template,
        )))
    }

}
