use crate::backend::error::BackendError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};

/// Outcome of one attempt of a retried operation. The operation itself owns
/// error classification: it decides which failures are worth another attempt
/// and which must abort the whole flow.
#[derive(Debug)]
pub enum Attempt<T> {
    Done(T),
    Retry(BackendError),
    Fatal(BackendError),
}

#[derive(Debug, Error)]
pub enum RetryError {
    #[error("{0}")]
    Fatal(BackendError),

    #[error("gave up after {attempts} attempts, last error: {last}")]
    Exhausted { attempts: u32, last: BackendError },
}

impl RetryError {
    /// The backend error this outcome ended on, whatever the path there.
    pub fn backend_error(&self) -> &BackendError {
        match self {
            RetryError::Fatal(err) => err,
            RetryError::Exhausted { last, .. } => last,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    8
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    60_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Runs an operation until it reports `Done` or `Fatal`, sleeping between
/// `Retry` outcomes with doubling backoff capped at `max_delay_ms`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// The current attempt number (starting at 1) is passed to the operation
    /// so call sites can log it.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, RetryError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        let mut backoff = Duration::from_millis(self.config.base_delay_ms);
        let mut attempt = 1u32;

        loop {
            match operation(attempt).await {
                Attempt::Done(value) => return Ok(value),
                Attempt::Fatal(err) => {
                    error!(attempt, error = %err, "operation failed fatally, not retrying");
                    return Err(RetryError::Fatal(err));
                }
                Attempt::Retry(err) => {
                    if attempt >= self.config.max_attempts {
                        error!(
                            attempts = attempt,
                            error = %err,
                            "retry budget exhausted"
                        );
                        return Err(RetryError::Exhausted {
                            attempts: attempt,
                            last: err,
                        });
                    }

                    warn!(
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "operation failed, retrying"
                    );

                    tokio::time::sleep(backoff).await;
                    backoff = std::cmp::min(
                        backoff * 2,
                        Duration::from_millis(self.config.max_delay_ms),
                    );
                    attempt += 1;
                }
            }
        }
    }
}
