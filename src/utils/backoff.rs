use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::BackoffPolicy;
use crate::CoordinationError;
use crate::Error;
use crate::Result;

/// Run `task` until it succeeds, a non-retryable error comes back, the
/// policy's retry budget is exhausted or `cancel` fires.
///
/// Every attempt is bounded by `policy.timeout_ms`; the delay between
/// attempts doubles from `base_delay_ms` up to `max_delay_ms` with up to 25%
/// random jitter. Cancellation returns `Error::Closed`.
pub(crate) async fn retry_with_backoff<F, Fut, T>(
    name: &str,
    policy: &BackoffPolicy,
    cancel: &CancellationToken,
    mut task: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retries = 0usize;
    loop {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Closed),
            r = timeout(policy.timeout(), task()) => r,
        };

        let error = match outcome {
            Ok(Ok(value)) => {
                if retries > 0 {
                    debug!(task = name, retries, "task succeeded after retries");
                }
                return Ok(value);
            }
            Ok(Err(e)) => e,
            Err(_) => Error::Coordination(CoordinationError::Timeout(policy.timeout())),
        };

        if !error.is_retryable() {
            return Err(error);
        }

        if !policy.is_unlimited() && retries >= policy.max_retries {
            warn!(task = name, retries, ?error, "task failed after max retries");
            return Err(error);
        }

        let delay = with_jitter(policy.delay_for(retries));
        retries += 1;
        warn!(task = name, retries, ?delay, ?error, "task failed, backing off");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Closed),
            _ = sleep(delay) => {}
        }
    }
}

fn with_jitter(delay: Duration) -> Duration {
    let max_jitter = delay.as_millis() as u64 / 4;
    if max_jitter == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::thread_rng().gen_range(0..=max_jitter))
}
