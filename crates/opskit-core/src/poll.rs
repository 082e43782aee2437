//! Cancellable fixed-interval polling
//!
//! Polling strategies repeat one backend call until the operator cancels or
//! the call fails. Cancellation is observed through a [`CancellationToken`]
//! both between polls and while sleeping.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::OpsResult;

/// Why a poll loop stopped without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The cancellation token fired after `polls` successful polls
    Cancelled { polls: u64 },
}

/// Fixed-interval loop bounded by a cancellation token
#[derive(Debug, Clone)]
pub struct PollLoop {
    interval: Duration,
    cancel: CancellationToken,
}

impl PollLoop {
    pub fn new(interval: Duration, cancel: CancellationToken) -> Self {
        Self { interval, cancel }
    }

    pub fn from_secs(secs: u64, cancel: CancellationToken) -> Self {
        Self::new(Duration::from_secs(secs), cancel)
    }

    /// Poll until cancelled or until `poll` fails.
    ///
    /// The first poll happens immediately. A failing poll ends the loop and
    /// its error is returned; there is no retry.
    pub async fn run<F, Fut>(&self, mut poll: F) -> OpsResult<PollOutcome>
    where
        F: FnMut(u64) -> Fut,
        Fut: Future<Output = OpsResult<()>>,
    {
        let mut polls: u64 = 0;
        info!(interval_secs = self.interval.as_secs(), "Poll loop started");

        loop {
            if self.cancel.is_cancelled() {
                info!(polls, "Poll loop cancelled");
                return Ok(PollOutcome::Cancelled { polls });
            }

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                r = poll(polls + 1) => Some(r),
            };

            match result {
                None => {
                    info!(polls, "Poll loop cancelled during poll");
                    return Ok(PollOutcome::Cancelled { polls });
                }
                Some(Ok(())) => {
                    polls += 1;
                    debug!(polls, "Poll succeeded");
                }
                Some(Err(e)) => {
                    error!(polls, error = %e, "Poll failed, stopping loop");
                    return Err(e);
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!(polls, "Poll loop cancelled while waiting");
                    return Ok(PollOutcome::Cancelled { polls });
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OpsError;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_error_after_third_poll_stops_loop() {
        let attempts = Arc::new(AtomicU64::new(0));
        let poll_loop = PollLoop::from_secs(1, CancellationToken::new());

        let counter = attempts.clone();
        let result = poll_loop
            .run(move |_| {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if n > 3 {
                        Err(OpsError::parse("elastic", "boom"))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(result.is_err());
        // three successful polls plus the failing one, never a fifth call
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_between_polls() {
        let cancel = CancellationToken::new();
        let poll_loop = PollLoop::from_secs(1, cancel.clone());
        let attempts = Arc::new(AtomicU64::new(0));

        let counter = attempts.clone();
        let token = cancel.clone();
        let outcome = poll_loop
            .run(move |n| {
                let counter = counter.clone();
                let token = token.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if n == 2 {
                        token.cancel();
                    }
                    Ok(())
                }
            })
            .await
            .unwrap();

        assert_eq!(outcome, PollOutcome::Cancelled { polls: 2 });
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_sleeping() {
        let cancel = CancellationToken::new();
        let poll_loop = PollLoop::from_secs(60, cancel.clone());

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(90)).await;
            trigger.cancel();
        });

        let outcome = poll_loop.run(|_| async { Ok(()) }).await.unwrap();
        // polls at t=0 and t=60, cancelled at t=90 during the second sleep
        assert_eq!(outcome, PollOutcome::Cancelled { polls: 2 });
    }

    #[tokio::test]
    async fn test_already_cancelled_never_polls() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let poll_loop = PollLoop::from_secs(1, cancel);

        let outcome = poll_loop
            .run(|_| async { Err(OpsError::config("must not poll")) })
            .await
            .unwrap();
        assert_eq!(outcome, PollOutcome::Cancelled { polls: 0 });
    }
}
