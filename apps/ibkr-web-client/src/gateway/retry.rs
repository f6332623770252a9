//! Status-aware retry policy for gateway responses.
//!
//! | Status | Class | Delay before retry `k` | Retries |
//! |--------|-------|------------------------|---------|
//! | `< 400` | Success | n/a | n/a |
//! | 401 | AuthExpired | `initial` for k = 0, `retry` after | 12 |
//! | 429/502/503/504 (configurable) | Transient | `min(initial * 2^k, max)` | 3 |
//! | any other `>= 400` | Fatal | never retried | 0 |
//!
//! The policy is pure: the dispatcher owns the per-class attempt counters.

use std::time::Duration;

use crate::config::{AuthRetrySettings, RetrySettings, TransientRetrySettings};

/// Status code signalling an expired session.
pub const AUTH_EXPIRED_STATUS: u16 = 401;

/// Outcome class of an HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryClass {
    /// Status below 400.
    Success,
    /// Session expired; long recovery window.
    AuthExpired,
    /// Overload, rate limit or upstream unavailability.
    Transient,
    /// Any other error status.
    Fatal,
}

impl RetryClass {
    /// Get the class name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::AuthExpired => "auth_expired",
            Self::Transient => "transient",
            Self::Fatal => "fatal",
        }
    }

    /// Whether the class can be retried at all.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::AuthExpired | Self::Transient)
    }
}

/// Delay and retry budget for one attempt of one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryClassParams {
    /// Wait before re-sending.
    pub delay: Duration,
    /// Retries allowed for this class.
    pub max_attempts: u32,
}

impl RetryClassParams {
    const NONE: Self = Self {
        delay: Duration::ZERO,
        max_attempts: 0,
    };

    /// Whether a retry numbered `attempt` (0-based) is still within budget.
    #[must_use]
    pub const fn allows(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Classifies statuses and computes per-class retry schedules.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    transient: TransientRetrySettings,
    auth: AuthRetrySettings,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetrySettings::default())
    }
}

impl RetryPolicy {
    /// Create a policy from retry settings.
    #[must_use]
    pub fn new(settings: RetrySettings) -> Self {
        Self {
            transient: settings.transient,
            auth: settings.auth,
        }
    }

    /// Classify an HTTP status.
    #[must_use]
    pub fn classify(&self, status: u16) -> RetryClass {
        if status < 400 {
            RetryClass::Success
        } else if status == AUTH_EXPIRED_STATUS {
            RetryClass::AuthExpired
        } else if self.transient.statuses.contains(&status) {
            RetryClass::Transient
        } else {
            RetryClass::Fatal
        }
    }

    /// Delay and budget for retry number `attempt` (0-based) of a class.
    #[must_use]
    pub fn params_for(&self, class: RetryClass, attempt: u32) -> RetryClassParams {
        match class {
            RetryClass::AuthExpired => RetryClassParams {
                delay: if attempt == 0 {
                    self.auth.initial_delay
                } else {
                    self.auth.retry_delay
                },
                max_attempts: self.auth.max_attempts,
            },
            RetryClass::Transient => RetryClassParams {
                delay: self.transient_delay(attempt),
                max_attempts: self.transient.max_attempts,
            },
            RetryClass::Success | RetryClass::Fatal => RetryClassParams::NONE,
        }
    }

    fn transient_delay(&self, attempt: u32) -> Duration {
        let max = self.transient.max_delay;
        // Past 2^31 every realistic initial delay is already above the cap.
        let factor = 1_u32 << attempt.min(31);
        self.transient
            .initial_delay
            .checked_mul(factor)
            .map_or(max, |delay| delay.min(max))
    }
}
