use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m001_initial_schema"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.get_connection().execute_unprepared(UP_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(DOWN_SQL)
            .await?;
        Ok(())
    }
}

// Timestamps are written with a +00:00 offset, so string comparison orders them.
const UP_SQL: &str = "
CREATE TABLE IF NOT EXISTS economic_events (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    scheduled_at TEXT NOT NULL,
    impact TEXT NOT NULL,
    forecast TEXT,
    previous TEXT,
    actual TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(name, scheduled_at)
);
CREATE INDEX IF NOT EXISTS idx_economic_events_scheduled_at ON economic_events(scheduled_at);

CREATE TABLE IF NOT EXISTS category_rules (
    id TEXT PRIMARY KEY NOT NULL,
    impact TEXT NOT NULL,
    lead_time_secs INTEGER NOT NULL,
    destination TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(impact, lead_time_secs, destination)
);
CREATE INDEX IF NOT EXISTS idx_category_rules_active ON category_rules(active);

CREATE TABLE IF NOT EXISTS notification_logs (
    id TEXT PRIMARY KEY NOT NULL,
    event_id TEXT NOT NULL,
    rule_id TEXT NOT NULL,
    message TEXT NOT NULL,
    status TEXT NOT NULL,
    destination TEXT NOT NULL,
    error_message TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_notif_logs_created_at ON notification_logs(created_at);
CREATE INDEX IF NOT EXISTS idx_notif_logs_status ON notification_logs(status);
";

const DOWN_SQL: &str = "
DROP TABLE IF EXISTS notification_logs;
DROP TABLE IF EXISTS category_rules;
DROP TABLE IF EXISTS economic_events;
";
