//! Cooperative time limits.
//!
//! A timed operation is spawned onto the tokio runtime and its handle is
//! raced against a timer. When the timer wins, the caller stops waiting
//! but the operation keeps running to completion on its own; nothing is
//! aborted or rolled back.

use crate::error::{EngineError, Result};
use crate::step::{Step, StepName, StepOutput, StepRef};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Awaits `op` for at most `limit`.
///
/// Settles with `op`'s own result if it finishes first, or with
/// [`EngineError::Timeout`] otherwise. `message` replaces the default
/// `Timed out after {ms} ms`. The timer is dropped as soon as either side
/// settles. A panic inside `op` is resumed on the caller.
///
/// Callers should not pass a zero `limit`; treat it as "no limit" and await
/// `op` directly instead.
///
/// # Examples
///
/// ```
/// use junban::{race, EngineError};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() {
/// let fast = race(async { Ok::<_, EngineError>(7) }, Duration::from_secs(1), None).await;
/// assert_eq!(fast.unwrap(), 7);
///
/// let slow = race(
///     async {
///         tokio::time::sleep(Duration::from_secs(5)).await;
///         Ok::<_, EngineError>(7)
///     },
///     Duration::from_millis(10),
///     Some("lookup too slow".to_string()),
/// )
/// .await;
/// assert_eq!(slow.unwrap_err().to_string(), "lookup too slow");
/// # }
/// ```
pub async fn race<F, T>(op: F, limit: Duration, message: Option<String>) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::spawn(op);

    match tokio::time::timeout(limit, handle).await {
        Ok(Ok(settled)) => settled,
        Ok(Err(join_error)) => {
            if join_error.is_panic() {
                std::panic::resume_unwind(join_error.into_panic());
            }
            Err(EngineError::Interrupted(join_error.to_string()))
        }
        Err(_) => Err(match message {
            Some(message) => EngineError::Timeout { limit, message },
            None => EngineError::timeout(limit),
        }),
    }
}

/// A step whose every execution is raced against a fixed limit.
///
/// Produced by the engine when a step is registered with a timeout. The
/// wrapper reports the inner step's name, priority and duplicate exemption,
/// but it is a different [`StepRef`]: removing or de-duplicating by the
/// caller's original handle will not find it.
pub struct TimeoutStep<A, V> {
    inner: StepRef<A, V>,
    limit: Duration,
}

impl<A, V> TimeoutStep<A, V> {
    /// Wraps `inner` with `limit`.
    pub fn new(inner: StepRef<A, V>, limit: Duration) -> Self {
        Self { inner, limit }
    }

    /// The configured limit.
    pub fn limit(&self) -> Duration {
        self.limit
    }

    /// The wrapped step.
    pub fn inner(&self) -> &StepRef<A, V> {
        &self.inner
    }
}

impl<A, V> fmt::Debug for TimeoutStep<A, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeoutStep")
            .field("inner", &self.inner.name())
            .field("limit", &self.limit)
            .finish()
    }
}

#[async_trait]
impl<A, V> Step<A, V> for TimeoutStep<A, V>
where
    A: Send + Sync + 'static,
    V: Send + 'static,
{
    async fn execute(&self, args: Arc<A>) -> Result<StepOutput<V>> {
        let inner = Arc::clone(&self.inner);
        let result = race(
            async move { inner.execute(args).await },
            self.limit,
            None,
        )
        .await;

        if let Err(e) = &result {
            if e.is_timeout() {
                warn!("Step '{}' timed out: {}", self.inner.name(), e);
            }
        }
        result
    }

    fn name(&self) -> StepName {
        self.inner.name()
    }

    fn priority(&self) -> Option<f64> {
        self.inner.priority()
    }

    fn allow_duplicates(&self) -> bool {
        self.inner.allow_duplicates()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::from_fn;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn sleeper(ms: u64) -> StepRef<AtomicBool, &'static str> {
        from_fn("sleeper", move |done: Arc<AtomicBool>| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            done.store(true, Ordering::SeqCst);
            Ok::<_, EngineError>(StepOutput::stop("slept"))
        })
        .with_priority(3.0)
        .shared()
    }

    #[tokio::test(start_paused = true)]
    async fn test_race_settles_with_operation_result() {
        let result = race(async { Ok::<_, EngineError>("ok") }, Duration::from_millis(20), None).await;
        assert_eq!(result.unwrap(), "ok");
    }

    #[tokio::test(start_paused = true)]
    async fn test_race_passes_through_operation_error() {
        let result: Result<()> = race(
            async {
                Err(EngineError::StepError {
                    step_name: StepName::new("fetch"),
                    details: "boom".to_string(),
                })
            },
            Duration::from_millis(20),
            None,
        )
        .await;

        match result.unwrap_err() {
            EngineError::StepError { step_name, details } => {
                assert_eq!(step_name, "fetch");
                assert_eq!(details, "boom");
            }
            other => panic!("Unexpected error type: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_race_times_out_with_default_message() {
        let result = race(
            async {
                tokio::time::sleep(Duration::from_millis(40)).await;
                Ok::<_, EngineError>(())
            },
            Duration::from_millis(20),
            None,
        )
        .await;

        let error = result.unwrap_err();
        assert!(error.is_timeout());
        assert_eq!(error.to_string(), "Timed out after 20 ms");
    }

    #[tokio::test(start_paused = true)]
    async fn test_race_loser_keeps_running() {
        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);

        let result = race(
            async move {
                tokio::time::sleep(Duration::from_millis(40)).await;
                flag.store(true, Ordering::SeqCst);
                Ok::<_, EngineError>(())
            },
            Duration::from_millis(20),
            None,
        )
        .await;
        assert!(result.unwrap_err().is_timeout());
        assert!(!done.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_step_fails_when_step_is_slower() {
        let step = TimeoutStep::new(sleeper(40), Duration::from_millis(20));
        let result = step.execute(Arc::new(AtomicBool::new(false))).await;
        assert!(result.unwrap_err().is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_step_passes_when_step_is_faster() {
        let step = TimeoutStep::new(sleeper(20), Duration::from_millis(40));
        let done = Arc::new(AtomicBool::new(false));
        let result = step.execute(Arc::clone(&done)).await;
        assert_eq!(result.unwrap(), StepOutput::Terminate("slept"));
        assert!(done.load(Ordering::SeqCst));
    }

    #[test]
    fn test_timeout_step_delegates_metadata() {
        let inner = sleeper(1);
        let step = TimeoutStep::new(Arc::clone(&inner), Duration::from_millis(5));
        assert_eq!(step.name(), "sleeper");
        assert_eq!(step.priority(), Some(3.0));
        assert!(!step.allow_duplicates());
        assert_eq!(step.limit(), Duration::from_millis(5));
        assert!(Arc::ptr_eq(step.inner(), &inner));
    }
}
