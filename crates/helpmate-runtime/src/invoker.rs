//! Fault-tolerant provider invocation.
//!
//! One logical "ask" wraps a raw driver call with wall-clock timing,
//! classification of unclassified failures, and bounded retry with jittered
//! exponential backoff. Every failure leaving this module is a classified
//! [`ProviderError`]; nothing untyped escapes.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

use helpmate_core::config::RetrySettings;

use crate::providers::{
    classify, LlmProvider, ProviderError, ProviderErrorKind, ProviderRequest, ProviderResponse,
    RawCallError,
};

/// Default retry attempts per logical ask.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base backoff between attempts.
pub const DEFAULT_BASE_BACKOFF: Duration = Duration::from_millis(500);

/// Safety cap on any single backoff wait.
const BACKOFF_CAP: Duration = Duration::from_millis(5_000);

/// Wraps one driver with timing, classification and retry.
pub struct ResilientInvoker {
    driver: Arc<dyn LlmProvider>,
    max_attempts: u32,
    base_backoff: Duration,
    deadline: Option<Duration>,
}

impl ResilientInvoker {
    /// Create an invoker with the default retry policy (3 attempts, 500 ms).
    pub fn new(driver: Arc<dyn LlmProvider>) -> Self {
        Self {
            driver,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff: DEFAULT_BASE_BACKOFF,
            deadline: None,
        }
    }

    /// Create an invoker with a configured retry policy.
    pub fn with_retry(driver: Arc<dyn LlmProvider>, retry: &RetrySettings) -> Self {
        Self {
            driver,
            max_attempts: retry.max_attempts,
            base_backoff: retry.base_backoff,
            deadline: retry.deadline,
        }
    }

    /// Registry key of the wrapped driver.
    pub fn driver_id(&self) -> &'static str {
        self.driver.id()
    }

    /// Main invocation point: retry with the configured policy.
    ///
    /// When a deadline is configured the whole ask (attempts and backoff
    /// waits included) runs under `tokio::time::timeout`; expiry cancels the
    /// in-flight wait and surfaces as a Timeout-kind error instead of
    /// silently abandoning the loop.
    pub async fn ask(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        match self.deadline {
            Some(deadline) => {
                let attempt = self.ask_with_retry(request, self.max_attempts, self.base_backoff);
                match tokio::time::timeout(deadline, attempt).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::timeout(format!(
                        "ask abandoned after deadline of {}ms",
                        deadline.as_millis()
                    ))),
                }
            }
            None => {
                self.ask_with_retry(request, self.max_attempts, self.base_backoff)
                    .await
            }
        }
    }

    /// Single attempt without retry. Use for tests or manual retry handling.
    ///
    /// Stamps the response with the attempt's wall-clock duration. A raw
    /// driver failure is mapped through the default classifier; an already
    /// classified error passes through unchanged.
    pub async fn ask_direct(
        &self,
        request: &ProviderRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        let started = tokio::time::Instant::now();
        match self.driver.call(request).await {
            Ok(mut response) => {
                response.elapsed = started.elapsed();
                tracing::debug!(
                    driver = self.driver.id(),
                    elapsed_ms = response.elapsed_ms(),
                    "provider call succeeded"
                );
                Ok(response)
            }
            Err(RawCallError::Classified(err)) => Err(err),
            Err(RawCallError::Raw(err)) => Err(classify(err)),
        }
    }

    /// Retry loop around [`Self::ask_direct`].
    ///
    /// Attempts run `1..=max(1, max_attempts)`. A non-retryable error or the
    /// final attempt's error is returned as-is; otherwise the loop sleeps
    /// [`backoff_for`] and tries again.
    pub async fn ask_with_retry(
        &self,
        request: &ProviderRequest,
        max_attempts: u32,
        base_backoff: Duration,
    ) -> Result<ProviderResponse, ProviderError> {
        let attempts = max_attempts.max(1);

        for attempt in 1..=attempts {
            match self.ask_direct(request).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    if err.is_not_retryable() || attempt == attempts {
                        return Err(err);
                    }
                    let wait = backoff_for(&err, attempt, base_backoff);
                    tracing::warn!(
                        driver = self.driver.id(),
                        attempt,
                        backoff_ms = wait.as_millis() as u64,
                        error = %err,
                        "provider call failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }

        // The final attempt always returns above.
        Err(ProviderError::provider("retry loop exhausted"))
    }
}

/// Delay before the next retry for a given failure.
///
/// A rate-limit error with a positive retry-after hint is honored exactly,
/// without jitter; everything else gets [`jittered_backoff`].
pub fn backoff_for(err: &ProviderError, attempt: u32, base: Duration) -> Duration {
    if let ProviderErrorKind::RateLimit {
        retry_after: Some(hint),
    } = *err.kind()
    {
        if !hint.is_zero() {
            return hint;
        }
    }

    jittered_backoff(base, attempt)
}

/// Exponential backoff with full jitter.
///
/// `cap = min(base * 2^(attempt-1), 5000ms)`; the result is drawn uniformly
/// from `[0, cap]` inclusive so simultaneous failures do not retry in
/// lockstep. `attempt` is 1-based: attempt 1 caps at `base`.
pub fn jittered_backoff(base: Duration, attempt: u32) -> Duration {
    let base_ms = base.as_millis() as u64;
    let exponent = attempt.saturating_sub(1).min(63);
    let uncapped = base_ms.saturating_mul(1_u64 << exponent);
    let cap = uncapped.min(BACKOFF_CAP.as_millis() as u64);

    Duration::from_millis(rand::thread_rng().gen_range(0..=cap))
}
