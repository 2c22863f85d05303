/// Exponential backoff for blockchain provider calls
use std::future::Future;
use tokio::time::{sleep, Duration};
use tracing::warn;

/// Retry schedule applied to every provider call. Exhausting the budget
/// surfaces the last error to the caller.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,

    /// Delay after the first failed attempt; doubles after every failure
    pub initial_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
        }
    }
}

/// Run an operation under a backoff policy
pub async fn with_backoff<T, E, F, Fut>(
    policy: BackoffPolicy,
    label: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = policy.initial_delay;
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts => {
                warn!(
                    "{}: attempt {}/{} failed ({}), retrying in {:?}",
                    label, attempt, policy.max_attempts, err, delay
                );
                sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(err) => {
                warn!(
                    "{}: giving up after {} attempts ({})",
                    label, policy.max_attempts, err
                );
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn fails_twice_then_succeeds_with_doubling_delays() {
        let calls: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));
        let calls_inner = Arc::clone(&calls);

        let result = with_backoff(BackoffPolicy::default(), "fake", move || {
            let calls = Arc::clone(&calls_inner);
            async move {
                let mut calls = calls.lock().unwrap();
                calls.push(Instant::now());
                if calls.len() < 3 {
                    Err("transient")
                } else {
                    Ok(42u32)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(42));

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1] - calls[0], Duration::from_millis(1000));
        assert_eq!(calls[2] - calls[1], Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_last_error() {
        let mut attempts = 0u32;
        let result: Result<(), String> =
            with_backoff(BackoffPolicy::default(), "fake", || {
                attempts += 1;
                let message = format!("boom {}", attempts);
                async move { Err(message) }
            })
            .await;

        assert_eq!(result, Err("boom 3".to_string()));
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn first_try_success_skips_sleeping() {
        let result: Result<u32, &str> =
            with_backoff(BackoffPolicy::default(), "fake", || async { Ok(7) }).await;
        assert_eq!(result, Ok(7));
    }
}
