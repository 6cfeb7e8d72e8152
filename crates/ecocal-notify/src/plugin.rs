use crate::error::NotifyError;
use crate::utils::redact_secrets;
use crate::NotificationChannel;
use anyhow::Result;
use serde_json::Value;
use std::collections::BTreeMap;

/// Builds one kind of [`NotificationChannel`] from the JSON table under
/// `[notification.config]`.
pub trait ChannelPlugin: Send + Sync {
    /// Name used as `channel_type` in the server config.
    fn name(&self) -> &'static str;

    /// What a rule's `destination` means for this channel (`"chat_id"`, ...).
    fn recipient_type(&self) -> &'static str;

    fn validate_config(&self, config: &Value) -> Result<()>;

    fn create_channel(&self, instance_id: &str, config: &Value) -> Result<Box<dyn NotificationChannel>>;

    /// `config` with secrets masked, safe to log at startup.
    fn redact_config(&self, config: &Value) -> Value {
        redact_secrets(config)
    }
}

/// Channel plugins by name.
///
/// # Examples
///
/// ```
/// use ecocal_notify::plugin::ChannelRegistry;
///
/// let registry = ChannelRegistry::with_builtin();
/// assert_eq!(registry.plugin_names(), vec!["telegram", "webhook"]);
/// assert!(registry.get_plugin("email").is_none());
/// ```
#[derive(Default)]
pub struct ChannelRegistry {
    plugins: BTreeMap<&'static str, Box<dyn ChannelPlugin>>,
}

impl ChannelRegistry {
    /// Registry holding the Telegram and webhook plugins.
    pub fn with_builtin() -> Self {
        let mut registry = Self::default();
        registry.register(Box::new(crate::channels::telegram::TelegramPlugin));
        registry.register(Box::new(crate::channels::webhook::WebhookPlugin));
        registry
    }

    /// Adds `plugin`, replacing any plugin with the same name.
    pub fn register(&mut self, plugin: Box<dyn ChannelPlugin>) {
        self.plugins.insert(plugin.name(), plugin);
    }

    pub fn get_plugin(&self, type_name: &str) -> Option<&dyn ChannelPlugin> {
        self.plugins.get(type_name).map(|p| p.as_ref())
    }

    /// Sorted plugin names.
    pub fn plugin_names(&self) -> Vec<&'static str> {
        self.plugins.keys().copied().collect()
    }

    /// Validates `config` with the named plugin and builds the channel.
    pub fn build_channel(
        &self,
        type_name: &str,
        instance_id: &str,
        config: &Value,
    ) -> Result<Box<dyn NotificationChannel>> {
        let plugin = self
            .get_plugin(type_name)
            .ok_or_else(|| NotifyError::UnknownChannelType(type_name.to_string()))?;
        plugin.validate_config(config)?;
        plugin.create_channel(instance_id, config)
    }
}
