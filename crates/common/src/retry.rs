use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Fixed-delay retry policy.
///
/// `max_attempts` counts every call to the operation, including the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Every attempt failed; carries the error from the last one.
    Exhausted { attempts: u32, last: E },
    /// The cancel flag was raised before an attempt succeeded.
    Cancelled { attempts: u32 },
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Exhausted { attempts, last } => {
                write!(f, "gave up after {} attempts: {}", attempts, last)
            }
            RetryError::Cancelled { attempts } => {
                write!(f, "cancelled after {} attempts", attempts)
            }
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RetryError<E> {}

/// Retry `f` with a fixed delay between attempts.
///
/// The closure receives the 1-based attempt number. `cancel` is checked before
/// every attempt, so raising it stops the loop within one `delay`.
///
/// # Arguments
/// * `policy` - Attempt budget and inter-attempt delay
/// * `cancel` - Flag that aborts the remaining attempts when set
/// * `operation_name` - Human-readable name for logging
/// * `f` - The operation to retry
pub fn retry_fixed<F, T, E>(
    policy: RetryPolicy,
    cancel: &AtomicBool,
    operation_name: &str,
    mut f: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Result<T, E>,
    E: fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        if cancel.load(Ordering::Acquire) {
            tracing::info!("{} cancelled before attempt {}", operation_name, attempt);
            return Err(RetryError::Cancelled {
                attempts: attempt - 1,
            });
        }

        match f(attempt) {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max_attempts => {
                tracing::error!(
                    "{} failed after {} attempts: {}",
                    operation_name,
                    max_attempts,
                    e
                );
                return Err(RetryError::Exhausted {
                    attempts: max_attempts,
                    last: e,
                });
            }
            Err(e) => {
                tracing::warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {}ms...",
                    operation_name,
                    attempt,
                    max_attempts,
                    e,
                    policy.delay.as_millis()
                );
                std::thread::sleep(policy.delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    const FAST: RetryPolicy = RetryPolicy::new(5, Duration::from_millis(1));

    #[test]
    fn succeeds_on_first_attempt_without_sleeping() {
        let cancel = AtomicBool::new(false);
        let start = Instant::now();
        let result: Result<u32, RetryError<String>> =
            retry_fixed(RetryPolicy::new(3, Duration::from_secs(5)), &cancel, "op", Ok);

        assert_eq!(result, Ok(1));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn retries_until_success() {
        let cancel = AtomicBool::new(false);
        let mut calls = 0;
        let result = retry_fixed(FAST, &cancel, "op", |attempt| {
            calls += 1;
            if attempt < 3 { Err("not yet") } else { Ok(attempt) }
        });

        assert_eq!(result, Ok(3));
        assert_eq!(calls, 3);
    }

    #[test]
    fn exhausts_after_max_attempts() {
        let cancel = AtomicBool::new(false);
        let mut calls = 0;
        let result: Result<(), _> = retry_fixed(FAST, &cancel, "op", |attempt| {
            calls += 1;
            Err(format!("failure {}", attempt))
        });

        assert_eq!(calls, 5);
        assert_eq!(
            result,
            Err(RetryError::Exhausted {
                attempts: 5,
                last: "failure 5".to_string()
            })
        );
    }

    #[test]
    fn cancel_flag_stops_remaining_attempts() {
        let cancel = AtomicBool::new(false);
        let result: Result<(), _> = retry_fixed(FAST, &cancel, "op", |attempt| {
            if attempt == 2 {
                cancel.store(true, Ordering::Release);
            }
            Err("busy")
        });

        assert_eq!(result, Err(RetryError::Cancelled { attempts: 2 }));
    }

    #[test]
    fn zero_attempt_budget_still_tries_once() {
        let cancel = AtomicBool::new(false);
        let result: Result<(), _> =
            retry_fixed(RetryPolicy::new(0, Duration::ZERO), &cancel, "op", |_| Err("nope"));

        assert_eq!(
            result,
            Err(RetryError::Exhausted {
                attempts: 1,
                last: "nope"
            })
        );
    }
}
