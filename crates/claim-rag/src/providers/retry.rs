//! Time-bounded calls with optional retry and exponential backoff

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};

use crate::error::{Error, Result};

/// How an external service call is bounded and retried
#[derive(Debug, Clone)]
pub struct CallPolicy {
    /// Service label used in errors and logs
    service: &'static str,
    /// Bound on a single attempt
    timeout: Duration,
    /// Retries after the first failed attempt
    max_retries: u32,
}

impl CallPolicy {
    pub fn new(service: &'static str, timeout_secs: u64, max_retries: u32) -> Self {
        Self {
            service,
            timeout: Duration::from_secs(timeout_secs),
            max_retries,
        }
    }

    /// Use a sub-second bound (tests)
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    /// Error reported when an attempt exceeds its bound
    fn timeout_error(&self) -> Error {
        Error::timeout(self.service, self.timeout.as_secs().max(1))
    }

    /// Run `operation`, bounding every attempt and retrying with exponential backoff
    pub async fn run<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            let outcome = match timeout(self.timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(self.timeout_error()),
            };

            match outcome {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if attempt < self.max_retries {
                        let delay = Duration::from_secs(2u64.pow(attempt));
                        tracing::warn!(
                            "{} request failed (attempt {}/{}): {}, retrying in {:?}",
                            self.service,
                            attempt + 1,
                            self.max_retries + 1,
                            e,
                            delay
                        );
                        sleep(delay).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::internal("call policy ran no attempts")))
    }

    /// Map a transport error, keeping timeouts distinguishable
    pub fn transport_error(&self, err: reqwest::Error, wrap: fn(String) -> Error) -> Error {
        if err.is_timeout() {
            self.timeout_error()
        } else {
            wrap(format!("{} request failed: {}", self.service, err))
        }
    }
}
