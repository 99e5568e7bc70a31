use std::future::Future;
use std::time::Duration;

use crate::error::DeliveryError;

/// Bounded exponential backoff for delivery calls. Same shape as
/// `pipeline_llm::external::RetryPolicy`, ported here because the retryable
/// condition is `DeliveryError::Transient` rather than a model-specific enum.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub factor: u32,
    pub max_delay: Duration,
}

impl From<pipeline_config::RetryPolicy> for RetryPolicy {
    fn from(policy: pipeline_config::RetryPolicy) -> Self {
        Self {
            max_attempts: policy.max_attempts,
            initial_delay: Duration::from_secs(policy.initial_backoff_seconds),
            factor: policy.backoff_factor.round() as u32,
            max_delay: Duration::from_secs(policy.max_backoff_seconds),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    fn delay_for(&self, attempt: u32) -> Duration {
        let pow = attempt.saturating_sub(1).min(16);
        let delay = self.initial_delay.saturating_mul(self.factor.max(1).saturating_pow(pow));
        delay.min(self.max_delay)
    }
}

/// Calls `f` up to `policy.max_attempts` times, retrying only on
/// [`DeliveryError::Transient`]. `Conflict` and `Fatal` are returned to the
/// caller on the first attempt.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut f: F) -> Result<T, DeliveryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DeliveryError>>,
{
    let mut attempt = 1;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(DeliveryError::Transient(message)) if attempt < policy.max_attempts => {
                tracing::warn!(attempt, error = %message, "delivery call failed, retrying");
                tokio::time::sleep(policy.delay_for(attempt)).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
