use anyhow::Result;
use async_trait::async_trait;
use chrono::{FixedOffset, NaiveTime, TimeZone, Utc};
use ecocal_common::types::Impact;
use ecocal_notify::dispatcher::NotificationDispatcher;
use ecocal_notify::{NotificationChannel, SendResponse};
use ecocal_server::summary::{DailySummaryScheduler, SummaryOutcome};
use ecocal_storage::{NewEconomicEvent, Store};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct Outbox(Arc<Mutex<Vec<(String, String)>>>);

#[async_trait]
impl NotificationChannel for Outbox {
    async fn send(&self, destination: &str, text: &str) -> Result<SendResponse> {
        self.0
            .lock()
            .unwrap()
            .push((destination.to_string(), text.to_string()));
        Ok(SendResponse::default())
    }

    fn channel_type(&self) -> &str {
        "outbox"
    }

    fn instance_id(&self) -> &str {
        "test"
    }
}

fn brt() -> FixedOffset {
    FixedOffset::west_opt(3 * 3600).unwrap()
}

async fn add_event(store: &Store, name: &str, hour: u32, minute: u32, day: u32) {
    store
        .upsert_event(&NewEconomicEvent {
            name: name.to_string(),
            scheduled_at: Utc.with_ymd_and_hms(2030, 5, day, hour, minute, 0).unwrap(),
            impact: Impact::High,
            forecast: None,
            previous: None,
            actual: None,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn summary_covers_the_local_day_only() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(Store::open_in(dir.path()).await.unwrap());
    // 14 May in BRT runs from 03:00 UTC on the 14th to 03:00 UTC on the 15th.
    add_event(&store, "CPI m/m", 12, 30, 14).await;
    add_event(&store, "FOMC Minutes", 2, 0, 15).await;
    add_event(&store, "Late Yesterday", 2, 0, 14).await;
    add_event(&store, "Tomorrow Open", 3, 0, 15).await;

    let outbox = Outbox::default();
    let dispatcher = Arc::new(NotificationDispatcher::new(Box::new(outbox.clone()), brt()));
    let summary = DailySummaryScheduler::new(
        store,
        dispatcher,
        "chat-9".to_string(),
        NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        brt(),
    );

    let now = Utc.with_ymd_and_hms(2030, 5, 14, 11, 0, 0).unwrap();
    let outcome = summary.send_for(now).await.unwrap();
    assert_eq!(outcome, SummaryOutcome::Sent { events: 2 });

    let sent = outbox.0.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "chat-9");
    assert!(sent[0].1.contains("09:30"), "{}", sent[0].1);
    assert!(sent[0].1.contains("23:00"), "{}", sent[0].1);
    assert!(!sent[0].1.contains("Late Yesterday"));
    assert!(!sent[0].1.contains("Tomorrow Open"));
}

#[tokio::test]
async fn summary_is_skipped_without_events() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(Store::open_in(dir.path()).await.unwrap());
    let outbox = Outbox::default();
    let dispatcher = Arc::new(NotificationDispatcher::new(Box::new(outbox.clone()), brt()));
    let summary = DailySummaryScheduler::new(
        store,
        dispatcher,
        "chat-9".to_string(),
        NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        brt(),
    );

    let outcome = summary.send_for(Utc::now()).await.unwrap();
    assert_eq!(outcome, SummaryOutcome::NoEvents);
    assert!(outbox.0.lock().unwrap().is_empty());
}
