use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::trace;

/// Sliding-window rate limiter for outbound API requests.
///
/// `acquire` suspends the caller until issuing another request would not
/// exceed the configured ceiling within any trailing one-second window. The
/// limiter only delays; it never rejects. Waiters contend on a tokio mutex,
/// which wakes them in FIFO order, so no caller is starved indefinitely.
#[derive(Debug)]
pub struct RateLimiter {
    /// Maximum grants per window
    limit: usize,
    /// Trailing window length
    window: Duration,
    /// Grant instants still inside the window, oldest first
    grants: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter allowing `per_second` grants per trailing second
    pub fn new(per_second: u32) -> Self {
        Self::with_window(per_second.max(1) as usize, Duration::from_secs(1))
    }

    /// Create a limiter with an explicit window length
    pub fn with_window(limit: usize, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window,
            grants: Mutex::new(VecDeque::with_capacity(limit.max(1))),
        }
    }

    /// Suspend until another request may be issued, then record the grant
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut grants = self.grants.lock().await;
                let now = Instant::now();
                while grants
                    .front()
                    .map_or(false, |&t| now.duration_since(t) >= self.window)
                {
                    grants.pop_front();
                }
                if grants.len() < self.limit {
                    grants.push_back(now);
                    return;
                }
                // Oldest grant leaves the window first; wait for it.
                let oldest = *grants.front().unwrap_or(&now);
                self.window.saturating_sub(now.duration_since(oldest))
            };
            trace!(?wait, "rate limiter saturated, waiting");
            sleep(wait.max(Duration::from_millis(1))).await;
        }
    }

    /// Configured grants-per-window ceiling
    pub fn limit(&self) -> usize {
        self.limit
    }
}
