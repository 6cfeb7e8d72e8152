use crate::config::ServerConfig;
use chrono::{DateTime, Utc};
use ecocal_alert::engine::AlertMatcher;
use ecocal_storage::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub matcher: Arc<AlertMatcher>,
    pub start_time: DateTime<Utc>,
    pub config: Arc<ServerConfig>,
}
