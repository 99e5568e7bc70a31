use std::time::Duration;

use crate::backend::ModelBackend;
use crate::types::{ModelError, ModelRequest, ModelVerdict};

/// Bounded exponential backoff for the external large-model endpoint.
///
/// Delay calculation uses a single exponential backoff strategy: base delay
/// multiplied by `factor` once per attempt, capped at `max_delay`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub factor: u32,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            factor: 2,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    fn delay_for(&self, attempt: u32) -> Duration {
        let pow = attempt.saturating_sub(1).min(16);
        let delay = self.initial_delay.saturating_mul(self.factor.saturating_pow(pow));
        delay.min(self.max_delay)
    }
}

/// Whether a `ModelError` should be retried at all. Timeouts and transport
/// errors are transient; an unparseable response from the external model
/// (already retried once inside the call) and rate-limiting are not retried
/// here, rate-limiting is surfaced to the caller, who defers the item
/// rather than spinning.
fn is_retryable(error: &ModelError) -> bool {
    matches!(error, ModelError::Timeout(_) | ModelError::Transport(_))
}

/// Calls the external large-model endpoint with bounded retry.
/// Budget enforcement happens one layer up, before this is ever called.
pub async fn classify_with_retry(
    backend: &dyn ModelBackend,
    request: &ModelRequest,
    policy: &RetryPolicy,
) -> Result<ModelVerdict, ModelError> {
    let mut attempt = 1;
    loop {
        match backend.classify(request).await {
            Ok(verdict) => return Ok(verdict),
            Err(error) if attempt < policy.max_attempts && is_retryable(&error) => {
                tracing::warn!(attempt, error = %error, "external model call failed, retrying");
                tokio::time::sleep(policy.delay_for(attempt)).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;

    struct FlakyBackend {
        failures_before_success: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ModelBackend for FlakyBackend {
        async fn classify(&self, _request: &ModelRequest) -> Result<ModelVerdict, ModelError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                Err(ModelError::Timeout(Duration::from_secs(1)))
            } else {
                Ok(ModelVerdict {
                    doc_kind: pipeline_types::DocumentKind::Invoice,
                    fields: Default::default(),
                    confidence: 0.9,
                })
            }
        }
    }

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        let backend = FlakyBackend {
            failures_before_success: 2,
            calls: AtomicU32::new(0),
        };
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            factor: 2,
            max_delay: Duration::from_millis(5),
        };
        let request = ModelRequest::new("big-model", "prompt", Duration::from_secs(5));
        let result = classify_with_retry(&backend, &request, &policy).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let backend = FlakyBackend {
            failures_before_success: 10,
            calls: AtomicU32::new(0),
        };
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            factor: 2,
            max_delay: Duration::from_millis(5),
        };
        let request = ModelRequest::new("big-model", "prompt", Duration::from_secs(5));
        let result = classify_with_retry(&backend, &request, &policy).await;
        assert!(result.is_err());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }
}
