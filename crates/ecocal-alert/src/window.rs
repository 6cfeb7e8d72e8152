use crate::error::WindowError;
use chrono::Duration;
use ecocal_common::types::LeadTime;

const DEFAULT_POLL_SECS: i64 = 60;
/// 0.02 h.
const DEFAULT_TOLERANCE_SECS: i64 = 72;

/// The slice of time before a lead-time boundary during which a pair counts
/// as due.
///
/// The tolerance is tied to the polling period: it must be at least one
/// poll long so some tick observes every boundary, and should stay close to
/// it so a boundary is not observed by several ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchWindow {
    poll_interval: Duration,
    tolerance: Duration,
}

impl MatchWindow {
    pub fn new(poll_interval: Duration, tolerance: Duration) -> Result<Self, WindowError> {
        if poll_interval <= Duration::zero() {
            return Err(WindowError::NonPositivePollInterval(
                poll_interval.num_seconds(),
            ));
        }
        if tolerance < poll_interval {
            return Err(WindowError::ToleranceBelowPollInterval {
                tolerance_secs: tolerance.num_seconds(),
                poll_secs: poll_interval.num_seconds(),
            });
        }
        Ok(Self {
            poll_interval,
            tolerance,
        })
    }

    pub fn from_secs(poll_secs: u64, tolerance_secs: u64) -> Result<Self, WindowError> {
        Self::new(
            checked_seconds("poll interval", poll_secs)?,
            checked_seconds("tolerance", tolerance_secs)?,
        )
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn tolerance(&self) -> Duration {
        self.tolerance
    }

    /// `remaining <= lead && remaining > lead - tolerance`
    pub fn is_due(&self, remaining: Duration, lead_time: LeadTime) -> bool {
        let lead = lead_time.as_duration();
        remaining <= lead && remaining > lead - self.tolerance
    }
}

fn checked_seconds(field: &'static str, secs: u64) -> Result<Duration, WindowError> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or(WindowError::OutOfRange { field, secs })
}

impl Default for MatchWindow {
    fn default() -> Self {
        Self {
            poll_interval: Duration::seconds(DEFAULT_POLL_SECS),
            tolerance: Duration::seconds(DEFAULT_TOLERANCE_SECS),
        }
    }
}
