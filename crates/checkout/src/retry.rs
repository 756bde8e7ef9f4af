use std::{future::Future, time::Duration};

use anyhow::{anyhow, Result};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Bounded timeout and retry policy applied to every external call made
/// while submitting an order.
///
/// A call that times out is never retried: it may still have landed, and a
/// second attempt would upload the proof twice or duplicate an item.
#[derive(Debug, Clone)]
pub struct CallPolicy {
    pub timeout: Duration,
    /// Attempts for uploads that fail with an error response. 1 by default.
    pub upload_attempts: u32,
    pub create_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            upload_attempts: 1,
            create_attempts: 1,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl CallPolicy {
    pub async fn run<T, F, Fut>(&self, label: &'static str, attempts: u32, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = attempts.max(1);
        let mut delay = self.initial_backoff;
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(call = label, attempt, attempts, "calling backend");

            let error = match timeout(self.timeout, operation()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(error)) => error,
                Err(_) => {
                    warn!(call = label, attempt, "backend call timed out, not retrying");
                    return Err(anyhow!("{label} timed out after {:?}", self.timeout));
                }
            };

            if attempt >= attempts {
                return Err(error);
            }

            warn!(
                call = label,
                attempt,
                error = %error,
                delay_ms = delay.as_millis() as u64,
                "backend call failed, retrying"
            );
            sleep(delay).await;
            delay = (delay * 2).min(self.max_backoff);
        }
    }
}
