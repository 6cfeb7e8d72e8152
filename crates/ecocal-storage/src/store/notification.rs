use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use ecocal_common::types::{DeliveryStatus, NotificationRecord};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};

use crate::entities::notification_log::{self, Column, Entity};
use crate::error::StorageError;
use crate::store::Store;

fn to_record(m: notification_log::Model) -> Result<NotificationRecord> {
    let status = m
        .status
        .parse::<DeliveryStatus>()
        .map_err(|_| StorageError::InvalidColumn {
            column: "notification_logs.status",
            value: m.status.clone(),
        })?;
    Ok(NotificationRecord {
        id: m.id,
        event_id: m.event_id,
        rule_id: m.rule_id,
        message: m.message,
        status,
        destination: m.destination,
        error_message: m.error_message,
        attempted_at: m.created_at.with_timezone(&Utc),
    })
}

impl Store {
    // ---- notification_logs ----

    pub async fn append_notification_record(&self, record: &NotificationRecord) -> Result<()> {
        let am = notification_log::ActiveModel {
            id: Set(record.id.clone()),
            event_id: Set(record.event_id.clone()),
            rule_id: Set(record.rule_id.clone()),
            message: Set(record.message.clone()),
            status: Set(record.status.to_string()),
            destination: Set(record.destination.clone()),
            error_message: Set(record.error_message.clone()),
            created_at: Set(record.attempted_at.fixed_offset()),
        };
        am.insert(self.db()).await?;
        Ok(())
    }

    /// Whether any record for the pair is newer than `since`, whatever its
    /// status.
    pub async fn was_recently_notified(
        &self,
        event_id: &str,
        rule_id: &str,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        let count = Entity::find()
            .filter(Column::EventId.eq(event_id))
            .filter(Column::RuleId.eq(rule_id))
            .filter(Column::CreatedAt.gt(since.fixed_offset()))
            .count(self.db())
            .await?;
        Ok(count > 0)
    }

    /// Newest first.
    pub async fn list_recent_notification_logs(&self, limit: u64) -> Result<Vec<NotificationRecord>> {
        let rows = Entity::find()
            .order_by(Column::CreatedAt, Order::Desc)
            .limit(limit)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_record).collect()
    }

    /// Every attempt for one (event, rule) pair, oldest first.
    pub async fn list_notification_logs_for_pair(
        &self,
        event_id: &str,
        rule_id: &str,
    ) -> Result<Vec<NotificationRecord>> {
        let rows = Entity::find()
            .filter(Column::EventId.eq(event_id))
            .filter(Column::RuleId.eq(rule_id))
            .order_by(Column::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_record).collect()
    }

    /// Deletes records older than `retention_days`. Returns the number removed.
    pub async fn cleanup_notification_logs(&self, retention_days: u32) -> Result<u64> {
        self.cleanup_notification_logs_before(Utc::now() - Duration::days(retention_days as i64))
            .await
    }

    pub async fn cleanup_notification_logs_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let res = Entity::delete_many()
            .filter(Column::CreatedAt.lt(cutoff.fixed_offset()))
            .exec(self.db())
            .await?;
        if res.rows_affected > 0 {
            tracing::info!(deleted = res.rows_affected, cutoff = %cutoff, "Cleaned up notification logs");
        }
        Ok(res.rows_affected)
    }
}
