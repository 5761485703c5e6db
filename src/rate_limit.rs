//! Request-rate budget for a remote source
//!
//! The limiter counts calls in a fixed window that starts at the first call and
//! resets once the window length has fully elapsed. It does not slide: a burst
//! at the end of one window followed by a burst at the start of the next can
//! together reach twice the limit within a short span.

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::clock::SharedClock;
use crate::error::FetchError;

/// Counter state for the current window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateWindow {
    /// Calls consumed in the current window
    pub count: u32,
    /// Time of the first call in the current window; `None` before any call
    pub window_start: Option<DateTime<Utc>>,
}

/// Fixed-window call limiter shared by every caller of one source
pub struct RateLimiter {
    name: &'static str,
    limit: u32,
    window: Duration,
    state: Mutex<RateWindow>,
    clock: SharedClock,
}

impl RateLimiter {
    /// Creates a limiter allowing `limit` calls per `window`
    pub fn new(name: &'static str, limit: u32, window: Duration, clock: SharedClock) -> Self {
        Self {
            name,
            limit,
            window,
            state: Mutex::new(RateWindow::default()),
            clock,
        }
    }

    /// Consumes one call from the budget
    ///
    /// # Returns
    /// * `Ok(())` if the call may proceed
    /// * `Err(FetchError::RateLimited)` if the window's budget is spent
    pub async fn check_and_consume(&self) -> Result<(), FetchError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;

        match state.window_start {
            Some(start) if now - start <= self.window => {}
            _ => {
                if state.window_start.is_some() {
                    debug!(limiter = self.name, "rate window reset");
                }
                state.count = 0;
                state.window_start = Some(now);
            }
        }

        if state.count >= self.limit {
            warn!(limiter = self.name, limit = self.limit, "rate limit reached");
            return Err(FetchError::RateLimited);
        }
        state.count += 1;
        Ok(())
    }

    /// Current counter state
    pub async fn snapshot(&self) -> RateWindow {
        *self.state.lock().await
    }
}
