//! Request pacing against per-endpoint rate ceilings.
//!
//! Each caller reserves its dispatch slot under the lock and sleeps after
//! releasing it, so concurrent callers queue up behind each other instead of
//! observing the same stale timestamp. A reservation is committed before the
//! sleep starts; dropping the future mid-sleep leaves the table consistent.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use super::endpoints::MAX_MIN_INTERVAL;
use crate::config::PacingScope;

const GLOBAL_KEY: &str = "";

/// Tracks the last dispatch time and spaces out new dispatches.
#[derive(Debug)]
pub struct RatePacer {
    scope: PacingScope,
    last_dispatch: Mutex<HashMap<String, Instant>>,
}

impl RatePacer {
    /// Create a pacer with the given timestamp sharing.
    #[must_use]
    pub fn new(scope: PacingScope) -> Self {
        Self {
            scope,
            last_dispatch: Mutex::new(HashMap::new()),
        }
    }

    /// Pacing scope in effect.
    #[must_use]
    pub const fn scope(&self) -> PacingScope {
        self.scope
    }

    /// Wait until a request to `endpoint` may be sent.
    ///
    /// Returns the time spent waiting.
    pub async fn await_slot(&self, endpoint: &str, min_interval: Duration) -> Duration {
        let key = match self.scope {
            PacingScope::Global => GLOBAL_KEY,
            PacingScope::PerEndpoint => endpoint,
        };

        let min_interval = min_interval.min(MAX_MIN_INTERVAL);

        let mut table = self.last_dispatch.lock().await;
        let now = Instant::now();
        let scheduled = match table.get(key) {
            Some(last) => last
                .checked_add(min_interval)
                .map_or(now + MAX_MIN_INTERVAL, |next| next.max(now)),
            None => now,
        };
        table.insert(key.to_string(), scheduled);
        drop(table);

        let wait = scheduled - now;
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        wait
    }
}
