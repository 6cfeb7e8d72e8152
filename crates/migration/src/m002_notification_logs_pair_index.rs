use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m002_notification_logs_pair_index"
    }
}

/// The dedup lookup filters on (event_id, rule_id, created_at) every tick.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.get_connection().execute_unprepared(UP_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP INDEX IF EXISTS idx_notif_logs_pair;")
            .await?;
        Ok(())
    }
}

const UP_SQL: &str = "
CREATE INDEX IF NOT EXISTS idx_notif_logs_pair
    ON notification_logs(event_id, rule_id, created_at DESC);
";
