use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Expected market impact of an economic event, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use ecocal_common::types::Impact;
///
/// let impact: Impact = "HIGH".parse().unwrap();
/// assert_eq!(impact, Impact::High);
/// assert_eq!(impact.to_string(), "high");
/// assert!(Impact::High > Impact::Low);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Impact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Impact::Low => write!(f, "low"),
            Impact::Medium => write!(f, "medium"),
            Impact::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for Impact {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Impact::Low),
            "medium" => Ok(Impact::Medium),
            "high" => Ok(Impact::High),
            _ => Err(format!("unknown impact: {s}")),
        }
    }
}

/// How long before an event a rule fires, held as whole seconds.
///
/// Rules are configured in fractional hours (`0.5` = 30 minutes); the value
/// is rounded to the nearest second so equality between two rules is exact.
/// Lead times are bounded by [`LeadTime::MAX_SECS`] so that
/// [`LeadTime::as_duration`] can never overflow.
///
/// # Examples
///
/// ```
/// use ecocal_common::types::LeadTime;
///
/// let lead = LeadTime::from_hours(0.0333).unwrap();
/// assert_eq!(lead, LeadTime::from_minutes(2));
/// assert!(LeadTime::from_hours(-1.0).is_err());
/// assert!(LeadTime::from_hours(1e13).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct LeadTime {
    secs: i64,
}

impl LeadTime {
    /// One leap year.
    pub const MAX_SECS: i64 = 366 * 24 * 3600;

    /// Clamps into `0..=MAX_SECS`.
    pub fn from_secs(secs: i64) -> Self {
        Self {
            secs: secs.clamp(0, Self::MAX_SECS),
        }
    }

    /// Like [`LeadTime::from_secs`] but rejects values outside `0..=MAX_SECS`
    /// instead of clamping them.
    pub fn try_from_secs(secs: i64) -> Result<Self, String> {
        if !(0..=Self::MAX_SECS).contains(&secs) {
            return Err(format!(
                "lead time out of range: {secs} seconds (max {})",
                Self::MAX_SECS
            ));
        }
        Ok(Self { secs })
    }

    pub fn from_minutes(minutes: i64) -> Self {
        Self::from_secs(minutes.saturating_mul(60))
    }

    pub fn from_hours(hours: f64) -> Result<Self, String> {
        if !hours.is_finite() || hours < 0.0 {
            return Err(format!("invalid lead time: {hours} hours"));
        }
        let secs = (hours * 3600.0).round();
        if secs > Self::MAX_SECS as f64 {
            return Err(format!(
                "lead time too large: {hours} hours (max {} hours)",
                Self::MAX_SECS / 3600
            ));
        }
        Ok(Self { secs: secs as i64 })
    }

    pub fn as_secs(&self) -> i64 {
        self.secs
    }

    pub fn as_hours(&self) -> f64 {
        self.secs as f64 / 3600.0
    }

    pub fn as_duration(&self) -> Duration {
        Duration::seconds(self.secs)
    }
}

impl TryFrom<i64> for LeadTime {
    type Error = String;

    fn try_from(secs: i64) -> Result<Self, Self::Error> {
        Self::try_from_secs(secs)
    }
}

impl From<LeadTime> for i64 {
    fn from(lead: LeadTime) -> i64 {
        lead.secs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicEvent {
    pub id: String,
    pub name: String,
    /// Release time, always normalized to UTC at import.
    pub scheduled_at: DateTime<Utc>,
    pub impact: Impact,
    pub forecast: Option<String>,
    pub previous: Option<String>,
    /// Filled in after the release.
    pub actual: Option<String>,
}

/// A "notify `destination` `lead_time` before every `impact` event" rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub id: String,
    pub impact: Impact,
    pub lead_time: LeadTime,
    /// Delivery target, e.g. a Telegram chat id.
    pub destination: String,
    pub active: bool,
}

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::Sent => write!(f, "sent"),
            DeliveryStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sent" => Ok(DeliveryStatus::Sent),
            "failed" => Ok(DeliveryStatus::Failed),
            _ => Err(format!("unknown delivery status: {s}")),
        }
    }
}

/// One row of the notification log: a delivery attempt for an (event, rule) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: String,
    pub event_id: String,
    pub rule_id: String,
    pub message: String,
    pub status: DeliveryStatus,
    pub destination: String,
    pub error_message: Option<String>,
    pub attempted_at: DateTime<Utc>,
}
