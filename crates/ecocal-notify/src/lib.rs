//! Outbound delivery for economic-calendar alerts.
//!
//! A [`NotificationChannel`] pushes rendered text to one destination
//! (a Telegram chat, a webhook). Channels are built from JSON config through
//! the [`plugin::ChannelRegistry`], and the [`dispatcher::NotificationDispatcher`]
//! adapts a channel to the matcher's `DeliveryChannel` port.

pub mod channels;
pub mod dispatcher;
pub mod error;
pub mod plugin;
pub mod template;
pub mod utils;

#[cfg(test)]
mod tests;

use anyhow::Result;
use async_trait::async_trait;
use crate::template::Markup;

/// What the remote side told us about an accepted message.
#[derive(Debug, Clone, Default)]
pub struct SendResponse {
    pub http_status: Option<u16>,
    /// Attempts beyond the first.
    pub retry_count: u32,
    /// Provider-side message id, when the API returns one.
    pub api_message_id: Option<String>,
}

/// A delivery channel that sends text to an external service.
///
/// Implementations are created by the corresponding [`plugin::ChannelPlugin`].
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Sends `text` to `destination` (chat id, routing key, ...).
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails after retries (if applicable).
    async fn send(&self, destination: &str, text: &str) -> Result<SendResponse>;

    /// Returns the channel type name (e.g., `"telegram"`, `"webhook"`).
    fn channel_type(&self) -> &str;

    fn instance_id(&self) -> &str;

    /// Dialect messages must be rendered in before [`NotificationChannel::send`].
    fn markup(&self) -> Markup {
        Markup::Plain
    }
}
