use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use notion_sync_core::error::SyncResult;

/// Delay progression between retry attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay between every attempt
    Fixed,
    /// Delay doubles after each failed attempt: base, 2x, 4x, ...
    Exponential,
}

/// Retry policy for transiently failing remote operations.
///
/// `attempts` counts total invocations: with `attempts = 3` the operation
/// runs at most three times. Only errors classified transient are retried;
/// auth, validation, and terminal remote errors surface immediately.
/// Exhausting the attempts surfaces the final error to the caller; one
/// item's exhaustion never aborts its siblings.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    attempts: u32,
    delay: Duration,
    backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    /// Create a policy with exponential backoff
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts: attempts.max(1), delay, backoff: Backoff::Exponential }
    }

    /// Override the backoff shape
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Total invocation ceiling
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Run `op`, retrying transient failures until success or exhaustion
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> SyncResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SyncResult<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        operation = what,
                        attempt,
                        max_attempts = self.attempts,
                        ?delay,
                        error = %err,
                        "transient failure, retrying"
                    );
                    sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Delay before the attempt following `attempt` (1-based)
    fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => self.delay * 2u32.saturating_pow(attempt - 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use notion_sync_core::error::SyncError;

    #[tokio::test(start_paused = true)]
    async fn always_transient_runs_exactly_attempts_times() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_secs(1));

        let result: SyncResult<()> = policy
            .run("upload", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(SyncError::transient("connection reset")) }
            })
            .await;

        assert!(matches!(result, Err(SyncError::TransientNetwork(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_millis(100));

        let result = policy
            .run("download", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(SyncError::transient("flaky"))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn auth_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_secs(1));

        let result: SyncResult<()> = policy
            .run("fetch", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(SyncError::auth("token revoked")) }
            })
            .await;

        assert!(matches!(result, Err(SyncError::Auth(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exponential_delays_double() {
        let policy = RetryPolicy::new(4, Duration::from_secs(1));
        let start = tokio::time::Instant::now();

        let _: SyncResult<()> = policy
            .run("op", || async { Err(SyncError::transient("down")) })
            .await;

        // Delays of 1s + 2s + 4s between the four attempts
        assert!(start.elapsed() >= Duration::from_secs(7));
        assert!(start.elapsed() < Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_backoff_keeps_constant_delay() {
        let policy =
            RetryPolicy::new(3, Duration::from_secs(2)).with_backoff(Backoff::Fixed);
        let start = tokio::time::Instant::now();

        let _: SyncResult<()> = policy
            .run("op", || async { Err(SyncError::transient("down")) })
            .await;

        assert!(start.elapsed() >= Duration::from_secs(4));
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
