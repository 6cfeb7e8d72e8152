/// Why a channel could not be built or a message was not accepted.
///
/// Channel and plugin trait methods return `anyhow::Result`; these variants
/// sit inside those errors so callers can downcast to tell a bad config
/// from a provider rejection.
///
/// # Examples
///
/// ```rust
/// use ecocal_notify::error::NotifyError;
///
/// let err = NotifyError::InvalidConfig {
///     channel: "telegram",
///     reason: "bot_token is empty".to_string(),
/// };
/// assert!(err.to_string().contains("bot_token"));
/// assert!(!err.is_retryable());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notify: {channel} config rejected: {reason}")]
    InvalidConfig {
        channel: &'static str,
        reason: String,
    },

    /// No plugin is registered under this name.
    #[error("Notify: no channel plugin named '{0}'")]
    UnknownChannelType(String),

    /// The request never got an HTTP response (DNS, connect, TLS, timeout).
    #[error("Notify: transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered but did not accept the message.
    #[error("Notify: {service} rejected the message (HTTP {status}): {body}")]
    Rejected {
        service: &'static str,
        status: u16,
        body: String,
    },
}

impl NotifyError {
    /// Transport failures, 5xx and 429 may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            NotifyError::Transport(_) => true,
            NotifyError::Rejected { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, NotifyError>;
