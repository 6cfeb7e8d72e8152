//! Alert matcher for economic-calendar notifications.
//!
//! Each tick loads the active category rules and the upcoming events,
//! finds the (event, rule) pairs whose lead-time boundary falls inside the
//! current [`window::MatchWindow`], drops pairs already present in the
//! notification log, groups the rest by destination and event minute, and
//! delivers every group once. The matcher keeps no state between ticks;
//! the notification log is the idempotency boundary.

pub mod engine;
pub mod error;
pub mod window;


use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ecocal_common::types::{CategoryRule, EconomicEvent, NotificationRecord};

/// Supplies the calendar events the matcher evaluates.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Returns events scheduled strictly after `now`, ascending by time.
    async fn list_upcoming_events(&self, now: DateTime<Utc>) -> Result<Vec<EconomicEvent>>;
}

/// Supplies the user-configured category rules.
#[async_trait]
pub trait RuleSource: Send + Sync {
    /// Returns every rule whose active flag is set.
    async fn list_active_category_rules(&self) -> Result<Vec<CategoryRule>>;
}

/// Append-only record of delivery attempts, queried for deduplication.
#[async_trait]
pub trait NotificationLog: Send + Sync {
    /// Whether any attempt for this (event, rule) pair was recorded after
    /// `since`, regardless of its outcome.
    async fn was_recently_notified(
        &self,
        event_id: &str,
        rule_id: &str,
        since: DateTime<Utc>,
    ) -> Result<bool>;

    async fn append_record(&self, record: &NotificationRecord) -> Result<()>;
}

/// Outbound channel that receives one message per delivery group.
///
/// Implementations should not retry beyond their own transport-level retry
/// policy; the matcher bounds each call with a timeout and treats both an
/// error and a timeout as a failed delivery.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Delivers `events` (all due for `rule`) to `destination` as one message.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel rejected the message.
    async fn deliver(
        &self,
        destination: &str,
        events: &[EconomicEvent],
        rule: &CategoryRule,
    ) -> Result<()>;
}
