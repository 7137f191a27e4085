use super::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Bounded attempts with jittered exponential backoff:
/// `base * 2^(attempt-1) + uniform(0, max_jitter)` between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub max_jitter: Duration,
}

impl RetryPolicy {
    pub const LOGIN: RetryPolicy = RetryPolicy::new(2, Duration::from_secs(1), Duration::from_millis(500));
    pub const FETCH: RetryPolicy = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_millis(500));

    pub const fn new(max_attempts: u32, base: Duration, max_jitter: Duration) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base,
            max_jitter,
        }
    }

    /// Delay to wait after failed `attempt` (1-based) before the next one.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponential = self.base * 2u32.saturating_pow(attempt.saturating_sub(1));
        if self.max_jitter.is_zero() {
            exponential
        } else {
            let jitter = rand::thread_rng().gen_range(0.0..self.max_jitter.as_secs_f64());
            exponential + Duration::from_secs_f64(jitter)
        }
    }
}

/// Run `operation` until it succeeds or `policy.max_attempts` is reached, returning the last error.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, what: &str, mut operation: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= policy.max_attempts => {
                log::debug!("{} failed (attempt {}/{}): {}", what, attempt, policy.max_attempts, e);
                return Err(e);
            }
            Err(e) => {
                let delay = policy.delay(attempt);
                match e {
                    Error::Timeout => log::warn!(
                        "{} timed out (attempt {}/{})",
                        what,
                        attempt,
                        policy.max_attempts
                    ),
                    _ => log::debug!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        what,
                        attempt,
                        policy.max_attempts,
                        e,
                        delay
                    ),
                }
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
