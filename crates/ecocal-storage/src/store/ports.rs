//! The matcher reads and writes through these; the inherent `Store`
//! methods do the work.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ecocal_alert::{EventSource, NotificationLog, RuleSource};
use ecocal_common::types::{CategoryRule, EconomicEvent, NotificationRecord};

use crate::store::Store;

#[async_trait]
impl EventSource for Store {
    async fn list_upcoming_events(&self, now: DateTime<Utc>) -> Result<Vec<EconomicEvent>> {
        Store::list_upcoming_events(self, now).await
    }
}

#[async_trait]
impl RuleSource for Store {
    async fn list_active_category_rules(&self) -> Result<Vec<CategoryRule>> {
        Store::list_active_category_rules(self).await
    }
}

#[async_trait]
impl NotificationLog for Store {
    async fn was_recently_notified(
        &self,
        event_id: &str,
        rule_id: &str,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        Store::was_recently_notified(self, event_id, rule_id, since).await
    }

    async fn append_record(&self, record: &NotificationRecord) -> Result<()> {
        Store::append_notification_record(self, record).await
    }
}
