//! Bounded retry with exponential backoff and jitter.
//!
//! Every outbound call in the gateway runs under this executor. The
//! policy is deliberately simple: attempt, sleep
//! `base_delay * 2^(attempt-1) + jitter`, attempt again, up to the cap.
//! Terminal errors (auth, malformed payloads) can short-circuit via the
//! classified variant so they do not burn attempts that cannot succeed.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{error, warn};

use crate::error::GatewayError;

/// Upper bound (exclusive) of the random jitter added to each backoff.
const JITTER_MS: u64 = 1000;

/// Retry policy: attempt cap and base backoff delay.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        RetryPolicy {
            max_attempts,
            base_delay,
        }
    }

    /// Run `op` until it succeeds or the attempt cap is reached.
    ///
    /// Every failure is retried. On exhaustion the last error is wrapped
    /// in [`GatewayError::ExhaustedRetries`] with the operation name and
    /// attempt count for diagnostics.
    pub async fn execute<T, F, Fut>(&self, name: &str, op: F) -> Result<T, GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        self.execute_classified(name, op, |_| true).await
    }

    /// Like [`execute`](Self::execute), but consults `retryable` before
    /// spending another attempt. A non-retryable error propagates
    /// immediately, unwrapped.
    pub async fn execute_classified<T, F, Fut, P>(
        &self,
        name: &str,
        mut op: F,
        retryable: P,
    ) -> Result<T, GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
        P: Fn(&GatewayError) -> bool,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(operation = name, attempt, error = %e, "attempt failed");

                    if !retryable(&e) {
                        return Err(e);
                    }
                    if attempt >= self.max_attempts {
                        error!(operation = name, attempts = attempt, "all retries exhausted");
                        return Err(GatewayError::ExhaustedRetries {
                            operation: name.to_string(),
                            attempts: attempt,
                            source: Box::new(e),
                        });
                    }

                    tokio::time::sleep(self.backoff_delay(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Delay before the attempt following `attempt` (1-based).
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self.base_delay * 2u32.saturating_pow(attempt - 1);
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..JITTER_MS));
        exp + jitter
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
