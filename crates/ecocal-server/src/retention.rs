use ecocal_storage::Store;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

const CLEANUP_EVERY: Duration = Duration::from_secs(24 * 3600);

/// Periodically drops notification log rows past the retention period.
///
/// Retention must stay well above the dedup lookback, or pairs still inside
/// their window could be delivered again.
pub struct LogRetentionTask {
    store: Arc<Store>,
    retention_days: u32,
}

impl LogRetentionTask {
    pub fn new(store: Arc<Store>, retention_days: u32) -> Self {
        Self {
            store,
            retention_days,
        }
    }

    pub async fn run(&self) {
        let mut ticker = time::interval(CLEANUP_EVERY);
        loop {
            ticker.tick().await;
            match self
                .store
                .cleanup_notification_logs(self.retention_days)
                .await
            {
                Ok(removed) if removed > 0 => {
                    tracing::info!(removed, "Cleaned up expired notification logs")
                }
                Err(e) => tracing::error!(error = %e, "Notification log cleanup failed"),
                _ => {}
            }
        }
    }
}
