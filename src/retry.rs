//! Bounded retry with exponential backoff around remote calls.
//!
//! Errors are sorted into three groups: cancellation (`Aborted`), conditions
//! no retry can fix (`QuotaExceeded`, `InvalidCredential`), and everything
//! else, which is treated as transient.

use crate::cancel::CancellationSignal;
use crate::config::GenerationConfig;
use crate::error::{NarrateError, Result};
use log::{debug, warn};
use std::future::Future;
use std::time::Duration;

const QUOTA_MARKERS: &[&str] = &["429", "Quota exceeded", "RESOURCE_EXHAUSTED"];
const CREDENTIAL_MARKERS: &[&str] = &[
    "Requested entity was not found",
    "entity not found",
    "API key not valid",
];

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero behaves like one.
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: crate::defaults::MAX_RETRIES,
            backoff_base: Duration::from_millis(crate::defaults::BACKOFF_BASE_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            max_attempts,
            backoff_base,
        }
    }

    pub fn from_config(config: &GenerationConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.backoff_base_ms),
        )
    }

    /// Delay after failed attempt number `attempt` (1-based): `base × 2^attempt`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.backoff_base.saturating_mul(factor)
    }
}

/// Map a raw remote error onto the error kinds callers act on.
///
/// Already-classified errors pass through; unknown ones are returned as-is.
pub fn classify(error: NarrateError) -> NarrateError {
    let message = match &error {
        NarrateError::Provider { message }
        | NarrateError::GenerationFailed { message }
        | NarrateError::Other(message) => message.clone(),
        _ => return error,
    };

    if QUOTA_MARKERS.iter().any(|m| message.contains(m)) {
        NarrateError::QuotaExceeded { message }
    } else if CREDENTIAL_MARKERS.iter().any(|m| message.contains(m)) {
        NarrateError::InvalidCredential { message }
    } else {
        error
    }
}

/// Whether another attempt could change the outcome.
pub fn is_retryable(error: &NarrateError) -> bool {
    !error.is_fatal_to_session()
}

/// Run `operation` until it succeeds, hits a non-retryable error, runs out
/// of attempts, or `signal` fires.
///
/// `operation` receives the 1-based attempt number. Each attempt and each
/// backoff wait races the signal; a cancelled signal always wins and
/// yields `Aborted`.
pub async fn call_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    signal: &CancellationSignal,
    mut operation: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        if signal.is_cancelled() {
            return Err(NarrateError::Aborted);
        }
        attempt += 1;

        let outcome = tokio::select! {
            biased;
            _ = signal.cancelled() => return Err(NarrateError::Aborted),
            outcome = operation(attempt) => outcome,
        };

        let error = match outcome {
            Ok(value) => return Ok(value),
            Err(_) if signal.is_cancelled() => return Err(NarrateError::Aborted),
            Err(e) => classify(e),
        };

        if !is_retryable(&error) {
            debug!("Not retrying after attempt {attempt}: {error}");
            return Err(error);
        }
        if attempt >= max_attempts {
            warn!("Giving up after {attempt} attempt(s): {error}");
            return Err(error);
        }

        let delay = policy.backoff_for(attempt);
        warn!(
            "Attempt {attempt}/{max_attempts} failed: {error}. Retrying in {:.1}s",
            delay.as_secs_f64()
        );

        tokio::select! {
            biased;
            _ = signal.cancelled() => return Err(NarrateError::Aborted),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
