//! Fixed-delay bounded retry policy.
//!
//! This is the only retry discipline in the scanner: no exponential backoff,
//! no jitter. An attempt failing with [`ScanError::UnsupportedTransport`]
//! ends the loop at once with a WebSocket-only [`ScanError::Unreachable`].

use std::future::Future;
use std::time::Duration;

use crate::config::ScannerConfig;
use crate::error::{DeadReason, ScanError};
use crate::request::RpcOutcome;

/// Configuration for the retry policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_tries: u32,
    /// Pause between two attempts.
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_tries: 3,
            delay: Duration::from_secs(2),
        }
    }
}

impl From<&ScannerConfig> for RetryConfig {
    fn from(cfg: &ScannerConfig) -> Self {
        Self {
            max_tries: cfg.max_tries,
            delay: cfg.retry_delay,
        }
    }
}

/// Stateless retry policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    fn max_tries(&self) -> u32 {
        self.config.max_tries.max(1)
    }

    /// Delay before the next attempt after `attempt` (1-based) failed.
    /// `None` once every attempt is used up.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.max_tries()).then_some(self.config.delay)
    }

    /// Drive `op` until it succeeds, fails terminally or runs out of attempts.
    ///
    /// `op` receives the 1-based attempt number. The returned outcome carries
    /// the number of attempts it took.
    pub async fn run<T, F, Fut>(
        &self,
        host: &str,
        label: &str,
        mut op: F,
    ) -> Result<RpcOutcome<T>, ScanError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<RpcOutcome<T>, ScanError>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            tracing::debug!(host, method = label, attempt, "attempting call");
            let err = match op(attempt).await {
                Ok(mut outcome) => {
                    outcome.attempts = attempt;
                    return Ok(outcome);
                }
                Err(ScanError::UnsupportedTransport { .. }) => {
                    tracing::error!(host, method = label, "server only supports websockets");
                    return Err(ScanError::Unreachable {
                        host: host.to_string(),
                        attempts: attempt,
                        reason: DeadReason::WsOnly,
                        last_error: None,
                    });
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => e,
            };

            match self.next_delay(attempt) {
                Some(delay) => {
                    tracing::warn!(
                        host,
                        method = label,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    tracing::error!(host, method = label, attempt, error = %err, "max tries exceeded");
                    return Err(ScanError::Unreachable {
                        host: host.to_string(),
                        attempts: attempt,
                        reason: DeadReason::RetriesExhausted,
                        last_error: Some(Box::new(err)),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_tries: u32) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            max_tries,
            delay: Duration::from_millis(1),
        })
    }

    fn transient() -> ScanError {
        ScanError::Transient {
            host: "https://node".into(),
            reason: "connection refused".into(),
            http_status: None,
        }
    }

    #[test]
    fn next_delay_is_fixed() {
        let p = RetryPolicy::new(RetryConfig::default());
        assert_eq!(p.next_delay(1), Some(Duration::from_secs(2)));
        assert_eq!(p.next_delay(2), Some(Duration::from_secs(2)));
        assert!(p.next_delay(3).is_none());
    }

    #[tokio::test]
    async fn succeeds_after_k_failures() {
        let calls = AtomicU32::new(0);
        let out = policy(3)
            .run("https://node", "m", |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(transient())
                    } else {
                        Ok(RpcOutcome::new("ok", Duration::from_millis(5)))
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(out.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_tries() {
        let calls = AtomicU32::new(0);
        let err = policy(4)
            .run::<(), _, _>("https://node", "m", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(transient()) }
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match err {
            ScanError::Unreachable {
                attempts,
                reason,
                last_error,
                ..
            } => {
                assert_eq!(attempts, 4);
                assert_eq!(reason, DeadReason::RetriesExhausted);
                assert!(matches!(last_error.as_deref(), Some(ScanError::Transient { .. })));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn unsupported_transport_short_circuits() {
        let calls = AtomicU32::new(0);
        let err = policy(3)
            .run::<(), _, _>("https://ws", "m", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(ScanError::UnsupportedTransport {
                        host: "https://ws".into(),
                    })
                }
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(err.is_ws_only());
        assert!(matches!(err, ScanError::Unreachable { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn zero_max_tries_still_attempts_once() {
        let out = policy(0)
            .run("https://node", "m", |_| async {
                Ok(RpcOutcome::new(1u8, Duration::ZERO))
            })
            .await
            .unwrap();
        assert_eq!(out.attempts, 1);
    }
}
