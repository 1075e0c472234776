use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

/// Last error seen, after `attempts` tries.
#[derive(Debug)]
pub struct RetryError<E> {
    pub attempts: u32,
    pub last: E,
}

/// Run `op` until it succeeds, `should_retry` rejects its error, or
/// `policy.max_attempts` attempts have been made. Sleeps `policy.backoff`
/// between attempts. `op` receives the 1-based attempt number.
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    policy: RetryPolicy,
    label: &str,
    mut op: F,
    should_retry: P,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= max_attempts || !should_retry(&err) {
                    return Err(RetryError { attempts: attempt, last: err });
                }
                warn!(
                    "🔄 [{}] attempt {}/{} failed: {} - retrying in {}s",
                    label,
                    attempt,
                    max_attempts,
                    err,
                    policy.backoff.as_secs()
                );
                sleep(policy.backoff).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const FAST: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        backoff: Duration::ZERO,
    };

    #[tokio::test]
    async fn stops_at_first_success() {
        let calls = Cell::new(0);
        let res: Result<u32, RetryError<String>> = retry_with_backoff(
            FAST,
            "test",
            |attempt| {
                calls.set(calls.get() + 1);
                async move {
                    if attempt < 2 {
                        Err("transient".to_string())
                    } else {
                        Ok(attempt)
                    }
                }
            },
            |_| true,
        )
        .await;
        assert_eq!(res.unwrap(), 2);
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let res: Result<(), RetryError<String>> = retry_with_backoff(
            FAST,
            "test",
            |attempt| {
                calls.set(calls.get() + 1);
                async move { Err(format!("fail {}", attempt)) }
            },
            |_| true,
        )
        .await;
        let err = res.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(err.last, "fail 3");
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_stops_immediately() {
        let calls = Cell::new(0);
        let res: Result<(), RetryError<&str>> = retry_with_backoff(
            FAST,
            "test",
            |_| {
                calls.set(calls.get() + 1);
                async { Err("fatal") }
            },
            |e| *e != "fatal",
        )
        .await;
        assert_eq!(res.unwrap_err().attempts, 1);
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn zero_max_attempts_still_tries_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            backoff: Duration::ZERO,
        };
        let res: Result<(), RetryError<&str>> =
            retry_with_backoff(policy, "test", |_| async { Err("no") }, |_| true).await;
        assert_eq!(res.unwrap_err().attempts, 1);
    }
}
