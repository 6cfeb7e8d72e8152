/// Errors that abort a whole matcher tick.
///
/// Failures local to one delivery group (channel errors, timeouts, a failed
/// log append) never surface here; they are logged and counted in the
/// [`crate::engine::TickReport`] instead.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("Matcher: event store unavailable: {0:#}")]
    EventStore(#[source] anyhow::Error),

    #[error("Matcher: rule store unavailable: {0:#}")]
    RuleStore(#[source] anyhow::Error),

    /// The dedup lookup failed. Nothing has been delivered at this point.
    #[error("Matcher: notification log unavailable: {0:#}")]
    NotificationLog(#[source] anyhow::Error),
}

/// Invalid [`crate::window::MatchWindow`] configuration.
///
/// # Examples
///
/// ```rust
/// use ecocal_alert::error::WindowError;
///
/// let err = WindowError::ToleranceBelowPollInterval { tolerance_secs: 30, poll_secs: 60 };
/// assert!(err.to_string().contains("poll interval"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error("Window: poll interval must be positive (got {0}s)")]
    NonPositivePollInterval(i64),

    /// A tolerance shorter than the polling period lets a lead-time boundary
    /// fall between two ticks and never fire.
    #[error(
        "Window: tolerance ({tolerance_secs}s) must be at least the poll interval ({poll_secs}s)"
    )]
    ToleranceBelowPollInterval { tolerance_secs: i64, poll_secs: i64 },

    #[error("Window: {field} of {secs}s is too large to represent")]
    OutOfRange { field: &'static str, secs: u64 },
}

/// Convenience `Result` alias for matcher operations.
pub type Result<T> = std::result::Result<T, MatchError>;
