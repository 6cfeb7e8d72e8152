use anyhow::Context;
use chrono::{Duration, FixedOffset, NaiveTime};
use ecocal_alert::engine::MatcherConfig;
use ecocal_alert::window::MatchWindow;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Notification log rows older than this are deleted.
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u32,

    #[serde(default)]
    pub matcher: MatcherSettings,
    #[serde(default)]
    pub notification: NotificationSettings,
    #[serde(default)]
    pub daily_summary: DailySummaryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherSettings {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Must be at least `poll_interval_secs`.
    #[serde(default = "default_window_tolerance_secs")]
    pub window_tolerance_secs: u64,
    #[serde(default = "default_dedup_lookback_hours")]
    pub dedup_lookback_hours: u64,
    #[serde(default = "default_delivery_timeout_secs")]
    pub delivery_timeout_secs: u64,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            window_tolerance_secs: default_window_tolerance_secs(),
            dedup_lookback_hours: default_dedup_lookback_hours(),
            delivery_timeout_secs: default_delivery_timeout_secs(),
        }
    }
}

impl MatcherSettings {
    pub fn to_matcher_config(&self) -> anyhow::Result<MatcherConfig> {
        let window = MatchWindow::from_secs(self.poll_interval_secs, self.window_tolerance_secs)?;
        let dedup_lookback = i64::try_from(self.dedup_lookback_hours)
            .ok()
            .and_then(Duration::try_hours)
            .with_context(|| {
                format!(
                    "dedup_lookback_hours ({}) is too large",
                    self.dedup_lookback_hours
                )
            })?;
        Ok(MatcherConfig {
            window,
            dedup_lookback,
            delivery_timeout: std::time::Duration::from_secs(self.delivery_timeout_secs),
        })
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSettings {
    /// Registered channel plugin name, `telegram` or `webhook`.
    #[serde(default = "default_channel_type")]
    pub channel_type: String,
    /// Offset used when rendering event times in messages.
    #[serde(default)]
    pub display_utc_offset_minutes: i32,
    /// Plugin-specific settings, validated by the plugin.
    #[serde(default = "default_channel_config")]
    pub config: serde_json::Value,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            channel_type: default_channel_type(),
            display_utc_offset_minutes: 0,
            config: default_channel_config(),
        }
    }
}

impl NotificationSettings {
    pub fn display_offset(&self) -> FixedOffset {
        ecocal_notify::template::offset_from_minutes(self.display_utc_offset_minutes)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySummaryConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Local `HH:MM` in the display offset.
    #[serde(default = "default_summary_time")]
    pub time: String,
    #[serde(default)]
    pub destination: Option<String>,
}

impl Default for DailySummaryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            time: default_summary_time(),
            destination: None,
        }
    }
}

impl DailySummaryConfig {
    pub fn send_time(&self) -> anyhow::Result<NaiveTime> {
        NaiveTime::parse_from_str(self.time.trim(), "%H:%M")
            .with_context(|| format!("daily_summary.time must be HH:MM, got '{}'", self.time))
    }
}

fn default_http_port() -> u16 {
    8080
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_log_retention_days() -> u32 {
    30
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_window_tolerance_secs() -> u64 {
    72
}

fn default_dedup_lookback_hours() -> u64 {
    4
}

fn default_delivery_timeout_secs() -> u64 {
    10
}

fn default_channel_type() -> String {
    "telegram".to_string()
}

fn default_channel_config() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

fn default_summary_time() -> String {
    "08:00".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            data_dir: default_data_dir(),
            log_retention_days: default_log_retention_days(),
            matcher: MatcherSettings::default(),
            notification: NotificationSettings::default(),
            daily_summary: DailySummaryConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{path}'"))?;
        Self::from_toml(&content).with_context(|| format!("invalid config file '{path}'"))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the server cannot start with.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.matcher.to_matcher_config()?;
        if u64::from(self.log_retention_days) * 24 <= self.matcher.dedup_lookback_hours {
            anyhow::bail!(
                "log_retention_days ({}) must cover the dedup lookback ({}h)",
                self.log_retention_days,
                self.matcher.dedup_lookback_hours
            );
        }
        if self.daily_summary.enabled {
            self.daily_summary.send_time()?;
        }
        Ok(())
    }

    pub fn data_dir(&self) -> &Path {
        Path::new(&self.data_dir)
    }

    pub fn db_url(&self) -> String {
        ecocal_storage::store::sqlite_url(self.data_dir())
    }
}
