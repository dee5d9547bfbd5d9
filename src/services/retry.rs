use crate::config::LedgerSettings;
use crate::error::Result;
use std::future::Future;
use std::time::Duration;

/// Retry policy for operations that lost a lock race.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(20),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Linear backoff: `base_delay * attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

impl From<&LedgerSettings> for RetryPolicy {
    fn from(settings: &LedgerSettings) -> Self {
        Self::new(settings.max_conflict_retries)
    }
}

/// Re-runs `operation` while it fails with a retryable error.
///
/// Only [`AppError::Conflict`](crate::error::AppError::Conflict) is retried.
/// Each attempt is a fresh unit of work, so a failed attempt has left no
/// state behind. The last error is returned once retries are exhausted.
pub async fn with_conflict_retry<T, F, Fut>(policy: RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                tracing::warn!(
                    attempt,
                    max_retries = policy.max_retries,
                    error = %err,
                    "Retrying after conflict"
                );
                tokio::time::sleep(policy.delay_for(attempt)).await;
            }
            outcome => return outcome,
        }
    }
}
