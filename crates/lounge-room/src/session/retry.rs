//! Bounded retry with exponential backoff for session steps.

use std::future::Future;
use std::time::Duration;

use lounge_config::RetryConfig;
use tokio::sync::mpsc;
use tracing::warn;

use super::{emit, SessionEvent};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_backoff: Duration::from_millis(config.base_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

impl RetryPolicy {
    /// Delay after the `attempt`-th failure (1-based): base, 2×base, 4×base…
    /// capped at `max_backoff`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts are used up. Every failure that will be retried is
    /// announced on `events`.
    pub(crate) async fn run<T, F, Fut>(
        &self,
        step: &'static str,
        events: &mpsc::Sender<SessionEvent>,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => {
                    warn!(step, attempt, error = %e, "Not retryable");
                    return Err(e);
                }
                Err(e) if attempt >= self.max_attempts => {
                    warn!(step, attempt, error = %e, "Giving up");
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.backoff(attempt);
                    warn!(
                        step,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying"
                    );
                    emit(
                        events,
                        SessionEvent::RetryScheduled {
                            step,
                            attempt,
                            delay,
                            error: e.to_string(),
                        },
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::error::RoomError;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_millis(1500),
        }
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let p = policy(5);
        assert_eq!(p.backoff(1), Duration::from_millis(500));
        assert_eq!(p.backoff(2), Duration::from_millis(1000));
        assert_eq!(p.backoff(3), Duration::from_millis(1500));
        assert_eq!(p.backoff(40), Duration::from_millis(1500));
    }

    #[test]
    fn zero_attempts_means_one() {
        let p = RetryPolicy::from(&RetryConfig {
            max_attempts: 0,
            ..RetryConfig::default()
        });
        assert_eq!(p.max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let (tx, mut rx) = mpsc::channel(8);
        let calls = &AtomicU32::new(0);
        let result = policy(3)
            .run("create", &tx, move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(RoomError::Network("down".into()))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert!(matches!(
            rx.try_recv(),
            Ok(SessionEvent::RetryScheduled { attempt: 1, .. })
        ));
        assert!(matches!(
            rx.try_recv(),
            Ok(SessionEvent::RetryScheduled { attempt: 2, .. })
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_last_error() {
        let (tx, _rx) = mpsc::channel(8);
        let calls = &AtomicU32::new(0);
        let result: Result<()> = policy(2)
            .run("token", &tx, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RoomError::Backend {
                    status: 503,
                    body: String::new(),
                })
            })
            .await;

        assert!(matches!(result, Err(RoomError::Backend { status: 503, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn final_errors_fail_fast() {
        let (tx, mut rx) = mpsc::channel(8);
        let calls = &AtomicU32::new(0);
        let result: Result<()> = policy(5)
            .run("token", &tx, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RoomError::Backend {
                    status: 401,
                    body: "bad key".into(),
                })
            })
            .await;

        assert!(matches!(result, Err(RoomError::Backend { status: 401, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(rx.try_recv().is_err());
    }
}
