// src/context.rs
// Per-request deadline and cancellation carried into outbound calls.
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("request canceled")]
    Canceled,

    #[error("request deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl RequestContext {
    /// A context that never expires and is never canceled.
    pub fn background() -> Self {
        Self {
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().deadline(Instant::now() + timeout)
    }

    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Time left before the deadline, `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Clamp a client-side timeout to whatever remains of this context.
    pub fn budget(&self, limit: Duration) -> Duration {
        self.remaining().map_or(limit, |remaining| remaining.min(limit))
    }

    /// Drive `fut` until it completes, the context is canceled or the
    /// deadline passes. Cancellation wins ties, then the deadline.
    pub async fn run<F, T, E>(&self, fut: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<ContextError>,
    {
        if self.cancel.is_cancelled() {
            return Err(ContextError::Canceled.into());
        }

        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ContextError::Canceled.into()),
            _ = expired => Err(ContextError::DeadlineExceeded.into()),
            result = fut => result,
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::background()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Context(ContextError),
    }

    impl From<ContextError> for TestError {
        fn from(err: ContextError) -> Self {
            TestError::Context(err)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn completes_before_deadline() {
        let ctx = RequestContext::with_timeout(Duration::from_millis(100));
        let result: Result<u8, TestError> = ctx
            .run(async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(7)
            })
            .await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_aborts_slow_future() {
        let ctx = RequestContext::with_timeout(Duration::from_millis(50));
        let started = Instant::now();
        let result: Result<(), TestError> = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await;
        assert_eq!(result, Err(TestError::Context(ContextError::DeadlineExceeded)));
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(started.elapsed() < Duration::from_millis(52));
    }

    #[tokio::test]
    async fn canceled_context_never_polls_future() {
        let polled = std::sync::atomic::AtomicBool::new(false);
        let ctx = RequestContext::background();
        ctx.cancel();
        let result: Result<(), TestError> = ctx
            .run(async {
                polled.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert_eq!(result, Err(TestError::Context(ContextError::Canceled)));
        assert!(!polled.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_in_flight_future() {
        let ctx = RequestContext::background();
        let token = ctx.cancel_token().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            token.cancel();
        });
        let result: Result<(), TestError> = ctx
            .run(std::future::pending::<Result<(), TestError>>())
            .await;
        assert_eq!(result, Err(TestError::Context(ContextError::Canceled)));
    }

    #[tokio::test(start_paused = true)]
    async fn budget_is_clamped_to_remaining_time() {
        let ctx = RequestContext::with_timeout(Duration::from_secs(2));
        assert_eq!(ctx.budget(Duration::from_secs(30)), Duration::from_secs(2));
        assert_eq!(ctx.budget(Duration::from_millis(500)), Duration::from_millis(500));
        assert_eq!(
            RequestContext::background().budget(Duration::from_secs(30)),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn earlier_deadline_wins() {
        let now = Instant::now();
        let ctx = RequestContext::background()
            .deadline(now + Duration::from_secs(10))
            .deadline(now + Duration::from_secs(1));
        assert!(ctx.remaining().unwrap() <= Duration::from_secs(1));
    }
}
