use ecocal_alert::engine::{AlertMatcher, TickTrigger};
use std::io::ErrorKind;
use std::net::{Ipv4Addr, TcpListener};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};

/// Drives the matcher at a fixed poll interval.
///
/// The interval must match the one the matcher's window was built with,
/// otherwise lead-time boundaries can fall between ticks.
pub struct AlertScheduler {
    matcher: Arc<AlertMatcher>,
    poll_interval: Duration,
}

impl AlertScheduler {
    pub fn new(matcher: Arc<AlertMatcher>, poll_interval: Duration) -> Self {
        Self {
            matcher,
            poll_interval,
        }
    }

    pub async fn run(&self) {
        tracing::info!(
            poll_secs = self.poll_interval.as_secs(),
            tolerance_secs = self.matcher.config().window.tolerance().num_seconds(),
            "Alert scheduler started"
        );

        let mut ticker = time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if let Err(e) = self.matcher.run_tick_from(TickTrigger::Scheduler).await {
                tracing::error!(error = %e, "Alert tick failed");
            }
        }
    }
}

/// Refuses a one-shot CLI tick while a server holds `http_port`.
///
/// Ticks are serialized only inside one process, so a cron-driven
/// `ecocal-server tick` next to a live server could deliver a pair twice.
/// A running server should be ticked through `POST /v1/cron/alerts`.
pub fn ensure_no_running_server(http_port: u16) -> anyhow::Result<()> {
    match TcpListener::bind((Ipv4Addr::UNSPECIFIED, http_port)) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AddrInUse => anyhow::bail!(
            "port {http_port} is in use, an ecocal server is probably running; \
             trigger it with POST /v1/cron/alerts instead of the tick command"
        ),
        Err(e) => {
            tracing::warn!(port = http_port, error = %e, "Could not check for a running server");
            Ok(())
        }
    }
}
