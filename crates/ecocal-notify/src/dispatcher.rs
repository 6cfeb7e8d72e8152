use crate::template::{self, Markup};
use crate::{NotificationChannel, SendResponse};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::FixedOffset;
use ecocal_alert::DeliveryChannel;
use ecocal_common::types::{CategoryRule, EconomicEvent};

/// Renders matcher groups into text and pushes them through one channel.
pub struct NotificationDispatcher {
    channel: Box<dyn NotificationChannel>,
    display_offset: FixedOffset,
}

impl NotificationDispatcher {
    pub fn new(channel: Box<dyn NotificationChannel>, display_offset: FixedOffset) -> Self {
        Self {
            channel,
            display_offset,
        }
    }

    pub fn display_offset(&self) -> FixedOffset {
        self.display_offset
    }

    pub fn channel_type(&self) -> &str {
        self.channel.channel_type()
    }

    pub fn markup(&self) -> Markup {
        self.channel.markup()
    }

    /// Sends pre-rendered text (daily summary, ad-hoc messages).
    pub async fn send_text(&self, destination: &str, text: &str) -> Result<SendResponse> {
        self.channel
            .send(destination, text)
            .await
            .with_context(|| {
                format!(
                    "{} channel '{}' failed to deliver to {destination}",
                    self.channel.channel_type(),
                    self.channel.instance_id()
                )
            })
    }
}

#[async_trait]
impl DeliveryChannel for NotificationDispatcher {
    async fn deliver(
        &self,
        destination: &str,
        events: &[EconomicEvent],
        rule: &CategoryRule,
    ) -> Result<()> {
        let text = template::render_grouped_alert(events, rule, self.display_offset, self.markup());
        let response = self.send_text(destination, &text).await?;
        tracing::debug!(
            destination = %destination,
            channel = self.channel.channel_type(),
            retries = response.retry_count,
            message_id = ?response.api_message_id,
            "Grouped alert delivered"
        );
        Ok(())
    }
}
