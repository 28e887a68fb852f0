use anyhow::{anyhow, Result};
use std::future::Future;
use tokio::time;
use tracing::{debug, warn};

/// Limits how long an operation may be retried.
#[derive(Clone, Debug)]
pub(crate) struct Budget {
    /// Total number of attempts, including the first.
    pub attempts: u32,
    /// Bounds each attempt.
    pub timeout: time::Duration,
    /// Delay between attempts.
    pub backoff: time::Duration,
}

/// Runs `op` until it succeeds or the budget's attempts are exhausted,
/// returning the last error.
pub(crate) async fn bounded<F, Fut, T>(budget: &Budget, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let error = match time::timeout(budget.timeout, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(error)) => error,
            Err(_) => anyhow!("timed out after {:?}", budget.timeout),
        };

        if attempt >= budget.attempts {
            debug!(attempt, "Retry budget exhausted");
            return Err(error.context(format!("gave up after {attempt} attempts")));
        }

        warn!(attempt, error = format_args!("{error:#}"), "Retrying");
        time::sleep(budget.backoff).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn budget(attempts: u32) -> Budget {
        Budget {
            attempts,
            timeout: time::Duration::from_secs(1),
            backoff: time::Duration::from_secs(2),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let start = time::Instant::now();

        let value = bounded(&budget(5), || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                anyhow::bail!("conflict");
            }
            Ok(42)
        })
        .await
        .expect("must succeed");

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), time::Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_when_attempts_are_exhausted() {
        let calls = AtomicU32::new(0);

        let error = bounded(&budget(3), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(anyhow!("conflict"))
        })
        .await
        .expect_err("must fail");

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(format!("{error:#}"), "gave up after 3 attempts: conflict");
    }

    #[tokio::test(start_paused = true)]
    async fn bounds_each_attempt() {
        let calls = AtomicU32::new(0);

        let error = bounded(&budget(2), || {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending::<Result<()>>()
        })
        .await
        .expect_err("must time out");

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(format!("{error:#}").contains("timed out"), "{error:#}");
    }
}
