use anyhow::{Context, Result};
use ecocal_storage::{NewEconomicEvent, Store};
use serde::{Deserialize, Serialize};

/// `init-events` input file. Times are RFC 3339 with any offset and are
/// stored in UTC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsSeedFile {
    #[serde(default)]
    pub events: Vec<NewEconomicEvent>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EventImportSummary {
    pub created: u32,
    pub updated: u32,
    pub failed: u32,
}

pub fn parse_events_seed(content: &str) -> Result<EventsSeedFile> {
    serde_json::from_str(content).context("failed to parse events seed file")
}

pub async fn import_events(store: &Store, seed: &EventsSeedFile) -> Result<EventImportSummary> {
    let mut summary = EventImportSummary::default();
    for event in &seed.events {
        match store.upsert_event(event).await {
            Ok((_, true)) => summary.created += 1,
            Ok((_, false)) => summary.updated += 1,
            Err(e) => {
                tracing::error!(event = %event.name, error = %e, "Failed to import event");
                summary.failed += 1;
            }
        }
    }
    tracing::info!(
        created = summary.created,
        updated = summary.updated,
        failed = summary.failed,
        "Events imported"
    );
    Ok(summary)
}
