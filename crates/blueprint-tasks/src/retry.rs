//! Retrying execution of background operations.
//!
//! A background task dispatch observes a retry counter: failed attempts
//! short of the budget are rethrown silently into the next attempt, with
//! exponential backoff in between; only the final attempt is reported
//! through the error-logger service, with the retry count attached as
//! metadata.

use std::sync::Arc;
use std::time::Duration;

use blueprint_core::{error_logger_type, ErrorLoggerHandle, OperationResult};
use blueprint_runtime::{ExecutorRegistry, OperationInstance};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Attempt budget and backoff shape for background dispatches.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles per attempt after.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// Creates the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the attempt budget.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sets the backoff before the second attempt.
    #[must_use]
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Backoff after the given failed attempt (1-based).
    #[must_use]
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        self.initial_backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Runs operations through the registry with retry semantics.
pub struct BackgroundTaskRunner {
    registry: Arc<ExecutorRegistry>,
    policy: RetryPolicy,
}

impl BackgroundTaskRunner {
    /// Creates a runner with the default policy.
    #[must_use]
    pub fn new(registry: Arc<ExecutorRegistry>) -> Self {
        Self {
            registry,
            policy: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Dispatches the operation, retrying on raw failures.
    ///
    /// Each attempt runs in its own fresh scope. Transient failures are
    /// not logged; the final failed attempt is recorded through the
    /// error-logger service with `retry_count` metadata and returned.
    ///
    /// # Errors
    ///
    /// The error of the final attempt once the budget is exhausted.
    pub async fn run(&self, operation: OperationInstance) -> anyhow::Result<OperationResult> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self
                .registry
                .execute_rethrowing(operation.clone(), CancellationToken::new())
                .await
            {
                Ok(result) => return Ok(result),
                Err(error) => {
                    if attempt >= self.policy.max_attempts {
                        self.report(&operation, &error, attempt);
                        return Err(error);
                    }
                    debug!(
                        operation = %operation.type_ref,
                        attempt,
                        "transient task failure, retrying"
                    );
                    tokio::time::sleep(self.policy.backoff_after(attempt)).await;
                }
            }
        }
    }

    fn report(&self, operation: &OperationInstance, error: &anyhow::Error, attempt: u32) {
        let metadata = json!({ "retry_count": attempt });
        let logger = self
            .registry
            .services()
            .get_singleton(&error_logger_type())
            .ok()
            .and_then(|instance| instance.downcast::<ErrorLoggerHandle>().ok());
        match logger {
            Some(logger) => logger.record(
                &operation.type_ref.fully_qualified(),
                &error.to_string(),
                metadata,
            ),
            None => tracing::error!(
                operation = %operation.type_ref,
                retry_count = attempt,
                "background task failed: {error}"
            ),
        }
    }
}

impl std::fmt::Debug for BackgroundTaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundTaskRunner")
            .field("policy", &self.policy)
            .finish()
    }
}
