//! Connect backoff: doubling delay with a ceiling, retried indefinitely.

use std::time::Duration;

use crate::config::ConnectionSettings;

/// Doubling backoff used while establishing a session.
///
/// Unlike a bounded retry budget, the connect loop never gives up: once the
/// ceiling is reached every further attempt waits the ceiling.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    initial: Duration,
    max: Duration,
    current: Duration,
    current_attempt: u32,
}

impl ReconnectBackoff {
    /// Create a backoff from connection settings.
    #[must_use]
    pub const fn new(settings: &ConnectionSettings) -> Self {
        Self::with_params(
            settings.reconnect_initial_backoff,
            settings.reconnect_max_backoff,
        )
    }

    /// Create with explicit bounds.
    #[must_use]
    pub const fn with_params(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
            current_attempt: 0,
        }
    }

    /// Delay to wait now; doubles the next one up to the ceiling.
    pub fn next_backoff(&mut self) -> Duration {
        let delay = self.current.min(self.max);
        self.current = self.current.saturating_mul(2).min(self.max);
        self.current_attempt = self.current_attempt.saturating_add(1);
        delay
    }

    /// Reset after a successful connection.
    pub const fn reset(&mut self) {
        self.current = self.initial;
        self.current_attempt = 0;
    }

    /// Number of backoffs handed out since the last reset.
    #[must_use]
    pub const fn current_attempt(&self) -> u32 {
        self.current_attempt
    }
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::with_params(
            ConnectionSettings::DEFAULT_RECONNECT_INITIAL_BACKOFF,
            ConnectionSettings::DEFAULT_RECONNECT_MAX_BACKOFF,
        )
    }
}
