//! # Rate-Limit Retry
//!
//! Re-issues an upstream call after the server-provided reset instant.
//!
//! ```text
//! attempt() ──Complete(outcome)──▶ return outcome
//!     │
//!     └──RateLimited{reset}──▶ sleep(max(reset - now, 0)) ──▶ attempt() ...
//! ```
//!
//! Only rate-limit signals are retried. Every other failure is already an
//! `Outcome::failure` inside `Complete` and is returned as-is.

use relay_types::{Clock, Outcome};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Delay used when a rate-limited response carries no usable reset instant.
pub const FALLBACK_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Reset values below this are Unix seconds, otherwise Unix milliseconds.
const SECONDS_THRESHOLD: f64 = 1e11;

/// Result of one upstream attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt<T> {
    Complete(Outcome<T>),
    /// Rate limited until `reset_at_ms` (Unix milliseconds), if known.
    RateLimited { reset_at_ms: Option<u64> },
}

/// How many rate-limited attempts to tolerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub fn unbounded() -> Self {
        Self { max_attempts: None }
    }

    pub fn bounded(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts.max(1)),
        }
    }
}

/// Parse a reset header value into Unix milliseconds.
pub fn parse_reset_instant(raw: &str) -> Option<u64> {
    let value: f64 = raw.trim().parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }

    if value < SECONDS_THRESHOLD {
        Some((value * 1000.0) as u64)
    } else {
        Some(value as u64)
    }
}

/// Run `attempt` until it completes, sleeping through rate limits.
pub async fn retry_rate_limited<T, F, Fut>(
    clock: &dyn Clock,
    policy: RetryPolicy,
    operation: &str,
    mut attempt: F,
) -> Outcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    let mut attempts: u32 = 0;

    loop {
        attempts = attempts.saturating_add(1);

        let reset_at_ms = match attempt().await {
            Attempt::Complete(outcome) => return outcome,
            Attempt::RateLimited { reset_at_ms } => reset_at_ms,
        };

        if let Some(max) = policy.max_attempts {
            if attempts >= max {
                warn!(operation, attempts, "Rate limited; giving up");
                return Outcome::failure(format!("rate limited after {attempts} attempts"));
            }
        }

        let delay = match reset_at_ms {
            Some(reset) => Duration::from_millis(reset.saturating_sub(clock.now_ms())),
            None => FALLBACK_RETRY_DELAY,
        };

        warn!(
            operation,
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            "Rate limited; retrying after reset"
        );

        clock.sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_types::ManualClock;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_parse_reset_instant_units() {
        assert_eq!(parse_reset_instant("1700000000"), Some(1_700_000_000_000));
        assert_eq!(parse_reset_instant("1700000000.5"), Some(1_700_000_000_500));
        assert_eq!(parse_reset_instant("1700000000123"), Some(1_700_000_000_123));
        assert_eq!(parse_reset_instant("soon"), None);
        assert_eq!(parse_reset_instant("-5"), None);
    }

    #[tokio::test]
    async fn test_retries_after_reset_instant() {
        let clock = ManualClock::new(10_000);
        let calls = AtomicU32::new(0);

        let outcome = retry_rate_limited(&clock, RetryPolicy::unbounded(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Attempt::RateLimited {
                        reset_at_ms: Some(10_200),
                    }
                } else {
                    Attempt::Complete(Outcome::ok("done"))
                }
            }
        })
        .await;

        assert_eq!(outcome, Outcome::ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(200)]);
    }

    #[tokio::test]
    async fn test_past_reset_clamps_to_zero() {
        let clock = ManualClock::new(10_000);
        let calls = AtomicU32::new(0);

        let outcome = retry_rate_limited(&clock, RetryPolicy::unbounded(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Attempt::RateLimited {
                        reset_at_ms: Some(5_000),
                    }
                } else {
                    Attempt::Complete(Outcome::ok(1))
                }
            }
        })
        .await;

        assert!(outcome.success);
        assert_eq!(clock.sleeps(), vec![Duration::ZERO]);
    }

    #[tokio::test]
    async fn test_missing_reset_uses_fallback_delay() {
        let clock = ManualClock::new(0);
        let calls = AtomicU32::new(0);

        retry_rate_limited(&clock, RetryPolicy::unbounded(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Attempt::RateLimited { reset_at_ms: None }
                } else {
                    Attempt::Complete(Outcome::ok(()))
                }
            }
        })
        .await;

        assert_eq!(clock.sleeps(), vec![FALLBACK_RETRY_DELAY, FALLBACK_RETRY_DELAY]);
    }

    #[tokio::test]
    async fn test_failures_are_not_retried() {
        let clock = ManualClock::new(0);
        let calls = AtomicU32::new(0);

        let outcome: Outcome<()> = retry_rate_limited(&clock, RetryPolicy::unbounded(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Attempt::Complete(Outcome::failure("Got unexpected status 500")) }
        })
        .await;

        assert!(!outcome.success);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_bounded_policy_gives_up() {
        let clock = ManualClock::new(0);
        let calls = AtomicU32::new(0);

        let outcome: Outcome<()> = retry_rate_limited(&clock, RetryPolicy::bounded(3), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Attempt::RateLimited { reset_at_ms: Some(100) } }
        })
        .await;

        assert_eq!(outcome.error(), Some("rate limited after 3 attempts"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(clock.sleeps().len(), 2);
    }
}
