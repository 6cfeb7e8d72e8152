pub mod telegram;
pub mod webhook;

/// Attempts per message, including the first one.
pub(crate) const MAX_ATTEMPTS: u32 = 3;

/// Backoff before retry `attempt` (0-based): 100ms, 200ms, ...
pub(crate) fn retry_backoff(attempt: u32) -> std::time::Duration {
    std::time::Duration::from_millis(100 * 2u64.pow(attempt))
}
