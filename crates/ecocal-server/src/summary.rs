use anyhow::{Context, Result};
use chrono::{DateTime, Days, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use ecocal_notify::dispatcher::NotificationDispatcher;
use ecocal_notify::template;
use ecocal_storage::Store;
use std::sync::Arc;

/// Sends the list of the day's events once a day at a local wall-clock time.
pub struct DailySummaryScheduler {
    store: Arc<Store>,
    dispatcher: Arc<NotificationDispatcher>,
    destination: String,
    send_at: NaiveTime,
    offset: FixedOffset,
}

/// What a summary run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryOutcome {
    Sent { events: usize },
    NoEvents,
}

impl DailySummaryScheduler {
    pub fn new(
        store: Arc<Store>,
        dispatcher: Arc<NotificationDispatcher>,
        destination: String,
        send_at: NaiveTime,
        offset: FixedOffset,
    ) -> Self {
        Self {
            store,
            dispatcher,
            destination,
            send_at,
            offset,
        }
    }

    pub async fn run(&self) {
        tracing::info!(
            send_at = %self.send_at.format("%H:%M"),
            utc_offset_secs = self.offset.local_minus_utc(),
            destination = %self.destination,
            "Daily summary scheduler started"
        );
        loop {
            let now = Utc::now();
            let next = next_run_after(now, self.send_at, self.offset);
            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            match self.send_for(Utc::now()).await {
                Ok(SummaryOutcome::Sent { events }) => {
                    tracing::info!(events, "Daily summary sent")
                }
                Ok(SummaryOutcome::NoEvents) => {
                    tracing::info!("No events today, daily summary skipped")
                }
                Err(e) => tracing::error!(error = %e, "Daily summary failed"),
            }
        }
    }

    /// Sends the summary for the local day containing `now`.
    pub async fn send_for(&self, now: DateTime<Utc>) -> Result<SummaryOutcome> {
        let local_date = now.with_timezone(&self.offset).date_naive();
        let (from, to) = local_day_bounds(local_date, self.offset);
        let events = self
            .store
            .list_events_between(from, to)
            .await
            .context("failed to load today's events")?;

        let markup = self.dispatcher.markup();
        let Some(text) = template::render_daily_summary(&events, self.offset, markup) else {
            return Ok(SummaryOutcome::NoEvents);
        };
        self.dispatcher.send_text(&self.destination, &text).await?;
        Ok(SummaryOutcome::Sent {
            events: events.len(),
        })
    }
}

/// UTC instants of local midnight on `date` and on the following day.
pub fn local_day_bounds(date: NaiveDate, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_to_utc(date, NaiveTime::MIN, offset);
    let next = date.checked_add_days(Days::new(1)).unwrap_or(date);
    (start, local_to_utc(next, NaiveTime::MIN, offset))
}

/// The first instant strictly after `now` whose local time is `at`.
pub fn next_run_after(now: DateTime<Utc>, at: NaiveTime, offset: FixedOffset) -> DateTime<Utc> {
    let today = now.with_timezone(&offset).date_naive();
    let candidate = local_to_utc(today, at, offset);
    if candidate > now {
        return candidate;
    }
    let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
    local_to_utc(tomorrow, at, offset)
}

fn local_to_utc(date: NaiveDate, time: NaiveTime, offset: FixedOffset) -> DateTime<Utc> {
    date.and_time(time).and_utc() - Duration::seconds(offset.local_minus_utc() as i64)
}
