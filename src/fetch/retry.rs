//! Retry policy for attachment fetches.
//!
//! The default policy makes a single attempt: one fetch call is one
//! round-trip. Raising `max_attempts` enables exponential backoff with jitter
//! for transient failures (timeouts, 408, 429, 5xx). Other 4xx statuses are
//! never retried.

use std::time::Duration;

use rand::Rng;
use tracing::debug;

use super::FetchError;

/// Attempts per attachment unless configured otherwise.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 1;

const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(8);
const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;
const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(250);

/// How a failed fetch should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// May succeed on another attempt.
    Transient,
    /// Will not succeed however often it is tried.
    Permanent,
    /// The host asked us to slow down (HTTP 429).
    RateLimited,
}

/// Outcome of [`RetryPolicy::should_retry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after `delay`.
    Retry {
        /// Wait before the next attempt.
        delay: Duration,
        /// Number of the upcoming attempt (1-indexed).
        attempt: u32,
    },
    /// Give up on this attachment.
    DoNotRetry {
        /// Why no further attempt is made.
        reason: String,
    },
}

/// Exponential backoff configuration.
///
/// `delay = min(base_delay * multiplier^(attempt-1), max_delay) + jitter`
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f32,
    max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy; `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f32,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            backoff_multiplier,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }

    /// Default delays with a custom attempt count.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Overrides the upper bound of the random jitter.
    #[must_use]
    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Maximum attempts, including the first one.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decides whether attempt number `attempt` (1-indexed) should be followed
    /// by another one.
    #[must_use]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure".to_string(),
            };
        }
        if attempt >= self.max_attempts {
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = self.delay_for(attempt);
        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );
        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let exponent = f64::from(attempt.saturating_sub(1));
        let delay_ms = base_ms * f64::from(self.backoff_multiplier).powf(exponent);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);

        let jitter_cap = self.max_jitter.as_millis() as u64;
        let jitter_ms = if jitter_cap == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_cap)
        };
        Duration::from_millis(capped_ms as u64 + jitter_ms)
    }
}

/// Classifies a fetch error for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | Timeout | Transient |
/// | Network | Transient |
/// | Body read | Transient |
/// | 408, 5xx | Transient |
/// | 429 | RateLimited |
/// | other statuses | Permanent |
#[must_use]
pub fn classify_error(error: &FetchError) -> FailureType {
    match error {
        FetchError::HttpStatus { status, .. } => match *status {
            408 => FailureType::Transient,
            429 => FailureType::RateLimited,
            s if (500..600).contains(&s) => FailureType::Transient,
            _ => FailureType::Permanent,
        },
        FetchError::Timeout { .. } | FetchError::Network { .. } | FetchError::Body { .. } => {
            FailureType::Transient
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::AttachmentId;

    fn status(code: u16) -> FetchError {
        FetchError::http_status(AttachmentId(1), "https://x/attachments/1/download", code)
    }

    #[test]
    fn test_default_policy_makes_single_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 1);
        assert!(matches!(
            policy.should_retry(FailureType::Transient, 1),
            RetryDecision::DoNotRetry { .. }
        ));
    }

    #[test]
    fn test_max_attempts_minimum_is_one() {
        assert_eq!(RetryPolicy::with_max_attempts(0).max_attempts(), 1);
    }

    #[test]
    fn test_permanent_never_retried() {
        let policy = RetryPolicy::with_max_attempts(5);
        let decision = policy.should_retry(FailureType::Permanent, 1);
        assert!(matches!(decision, RetryDecision::DoNotRetry { .. }));
    }

    #[test]
    fn test_transient_retried_until_exhausted() {
        let policy = RetryPolicy::with_max_attempts(3).with_max_jitter(Duration::ZERO);
        assert!(matches!(
            policy.should_retry(FailureType::Transient, 1),
            RetryDecision::Retry { attempt: 2, .. }
        ));
        assert!(matches!(
            policy.should_retry(FailureType::RateLimited, 2),
            RetryDecision::Retry { attempt: 3, .. }
        ));
        match policy.should_retry(FailureType::Transient, 3) {
            RetryDecision::DoNotRetry { reason } => {
                assert!(reason.contains("exhausted"), "Expected 'exhausted' in: {reason}");
            }
            RetryDecision::Retry { .. } => panic!("should not retry after max attempts"),
        }
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy::new(10, Duration::from_millis(100), Duration::from_millis(350), 2.0)
            .with_max_jitter(Duration::ZERO);
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(350));
    }

    #[test]
    fn test_delay_jitter_bounded() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100), Duration::from_secs(1), 2.0)
            .with_max_jitter(Duration::from_millis(50));
        for _ in 0..20 {
            let delay = policy.delay_for(1);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(150));
        }
    }

    #[test]
    fn test_classify_statuses() {
        assert_eq!(classify_error(&status(404)), FailureType::Permanent);
        assert_eq!(classify_error(&status(403)), FailureType::Permanent);
        assert_eq!(classify_error(&status(408)), FailureType::Transient);
        assert_eq!(classify_error(&status(429)), FailureType::RateLimited);
        assert_eq!(classify_error(&status(503)), FailureType::Transient);
    }

    #[test]
    fn test_classify_timeout_is_transient() {
        let error = FetchError::timeout(AttachmentId(1), "https://x");
        assert_eq!(classify_error(&error), FailureType::Transient);
    }
}
