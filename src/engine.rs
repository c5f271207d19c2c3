use crate::error::{EngineError, Result};
use crate::options::EngineOptions;
use crate::registry::StepRegistry;
use crate::step::{StepOutput, StepRef};
use crate::timeout::{race, TimeoutStep};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The result of a run that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<V> {
    /// Every step returned [`StepOutput::Continue`].
    Completed,
    /// A step returned [`StepOutput::Terminate`] with this value.
    Terminated(V),
}

impl<V> Outcome<V> {
    /// The terminating value, if any.
    pub fn into_value(self) -> Option<V> {
        match self {
            Outcome::Completed => None,
            Outcome::Terminated(value) => Some(value),
        }
    }

    /// Returns `true` for [`Outcome::Terminated`].
    pub fn is_terminated(&self) -> bool {
        matches!(self, Outcome::Terminated(_))
    }
}

/// Runs registered steps one at a time against shared arguments.
///
/// Steps run in registration order, or in ascending priority order when
/// [`EngineOptions::sort_by_priority`] is set. A run ends at the first step
/// that terminates or fails.
///
/// # Examples
///
/// ```
/// use junban::prelude::*;
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), EngineError> {
/// let mut engine: Engine<AtomicU32, String> = Engine::new();
///
/// engine.append(
///     from_fn("bump", |n: Arc<AtomicU32>| async move {
///         n.fetch_add(1, Ordering::SeqCst);
///         Ok::<_, EngineError>(StepOutput::next())
///     })
///     .shared(),
///     None,
/// )?;
/// engine.append(
///     from_fn("check", |n: Arc<AtomicU32>| async move {
///         let seen = n.load(Ordering::SeqCst);
///         Ok::<_, EngineError>(StepOutput::stop(format!("seen {}", seen)))
///     })
///     .shared(),
///     None,
/// )?;
///
/// let outcome = engine.execute(AtomicU32::new(0), None).await?;
/// assert_eq!(outcome, Outcome::Terminated("seen 1".to_string()));
/// # Ok(())
/// # }
/// ```
pub struct Engine<A, V> {
    registry: StepRegistry<A, V>,
    options: EngineOptions,
}

impl<A, V> fmt::Debug for Engine<A, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.registry)
            .field("options", &self.options)
            .finish()
    }
}

impl<A, V> Default for Engine<A, V>
where
    A: Send + Sync + 'static,
    V: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A, V> Engine<A, V>
where
    A: Send + Sync + 'static,
    V: Send + 'static,
{
    /// Creates an engine with default options and no steps.
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    /// Creates an engine with `options` and no steps.
    pub fn with_options(options: EngineOptions) -> Self {
        Self {
            registry: StepRegistry::new(),
            options,
        }
    }

    /// Creates an engine and appends `steps` in order.
    ///
    /// Validity and duplicate checks apply exactly as for [`Engine::append`].
    pub fn with_steps<I>(steps: I, options: EngineOptions) -> Result<Self>
    where
        I: IntoIterator<Item = StepRef<A, V>>,
    {
        let mut engine = Self::with_options(options);
        for step in steps {
            engine.append(step, None)?;
        }
        Ok(engine)
    }

    /// Current options.
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Mutable access to the options. Changes apply from the next call.
    pub fn options_mut(&mut self) -> &mut EngineOptions {
        &mut self.options
    }

    /// Replaces the options. Changes apply from the next call.
    pub fn set_options(&mut self, options: EngineOptions) {
        self.options = options;
    }

    /// Adds `step` at the end of the execution order.
    ///
    /// With a non-zero `timeout`, the step is wrapped in a [`TimeoutStep`]
    /// before it is stored. The registry then holds the wrapper, not `step`,
    /// so [`Engine::remove`] and duplicate rejection will not match it through
    /// the handle passed here.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidStep`] if the step's priority hint is NaN
    /// - [`EngineError::DuplicateStep`] if duplicates are rejected and the
    ///   same handle is already registered
    pub fn append(&mut self, step: StepRef<A, V>, timeout: Option<Duration>) -> Result<()> {
        let step = with_step_timeout(step, timeout);
        self.registry.append(step, self.options.reject_duplicates)
    }

    /// Adds `step` at the start of the execution order.
    ///
    /// Same wrapping and errors as [`Engine::append`].
    pub fn prepend(&mut self, step: StepRef<A, V>, timeout: Option<Duration>) -> Result<()> {
        let step = with_step_timeout(step, timeout);
        self.registry.prepend(step, self.options.reject_duplicates)
    }

    /// Removes the first registration of `step`. Returns whether one was found.
    pub fn remove(&mut self, step: &StepRef<A, V>) -> bool {
        self.registry.remove(step)
    }

    /// Removes every step.
    pub fn clear(&mut self) {
        self.registry.clear();
    }

    /// Returns `true` if `step` itself is registered.
    pub fn contains(&self, step: &StepRef<A, V>) -> bool {
        self.registry.contains(step)
    }

    /// Number of registered steps.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Returns `true` if no step is registered.
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Registered steps in registration order, including timeout wrappers.
    pub fn steps(&self) -> &[StepRef<A, V>] {
        self.registry.steps()
    }

    /// Starts a run over the currently registered steps.
    ///
    /// The step order is fixed when this is called: registry changes made
    /// while the returned future is pending do not affect it. With a non-zero
    /// `total_timeout`, the whole run is raced against that limit; on expiry
    /// the run fails with [`EngineError::Timeout`], the step in flight keeps
    /// running in the background, and no further step is started.
    ///
    /// Must be awaited inside a tokio runtime.
    pub fn execute(
        &mut self,
        args: A,
        total_timeout: Option<Duration>,
    ) -> impl Future<Output = Result<Outcome<V>>> + Send + 'static {
        self.execute_shared(Arc::new(args), total_timeout)
    }

    /// Like [`Engine::execute`], for arguments the caller keeps a handle to.
    pub fn execute_shared(
        &mut self,
        args: Arc<A>,
        total_timeout: Option<Duration>,
    ) -> impl Future<Output = Result<Outcome<V>>> + Send + 'static {
        let steps = self.snapshot();
        let total_timeout = total_timeout.filter(|limit| !limit.is_zero());

        async move {
            info!("Starting run with {} steps", steps.len());
            let abandoned = Arc::new(AtomicBool::new(false));
            let _guard = AbandonOnDrop(Arc::clone(&abandoned));
            let run = run_steps(steps, args, Arc::clone(&abandoned));

            let result = match total_timeout {
                Some(limit) => {
                    let result = race(run, limit, None).await;
                    if let Err(e) = &result {
                        if e.is_timeout() {
                            warn!("Run ended on timeout: {}", e);
                        }
                    }
                    result
                }
                None => run.await,
            };

            if let Ok(outcome) = &result {
                info!(
                    "Run finished ({})",
                    if outcome.is_terminated() {
                        "terminated"
                    } else {
                        "completed"
                    }
                );
            }
            result
        }
    }

    fn snapshot(&mut self) -> Vec<StepRef<A, V>> {
        if self.options.sort_by_priority {
            self.registry.sorted().to_vec()
        } else {
            self.registry.steps().to_vec()
        }
    }
}

/// Stops a raced run from starting further steps once nobody is waiting
/// for it: on completion, on timeout, or when the run future is dropped.
struct AbandonOnDrop(Arc<AtomicBool>);

impl Drop for AbandonOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

fn with_step_timeout<A, V>(step: StepRef<A, V>, timeout: Option<Duration>) -> StepRef<A, V>
where
    A: Send + Sync + 'static,
    V: Send + 'static,
{
    match timeout.filter(|limit| !limit.is_zero()) {
        Some(limit) => {
            debug!("Wrapping step '{}' with a {:?} timeout", step.name(), limit);
            Arc::new(TimeoutStep::new(step, limit))
        }
        None => step,
    }
}

async fn run_steps<A, V>(
    steps: Vec<StepRef<A, V>>,
    args: Arc<A>,
    abandoned: Arc<AtomicBool>,
) -> Result<Outcome<V>>
where
    A: Send + Sync + 'static,
    V: Send + 'static,
{
    for step in steps {
        if abandoned.load(Ordering::SeqCst) {
            debug!("Run abandoned before step '{}'", step.name());
            return Err(EngineError::Interrupted("run abandoned".to_string()));
        }

        match step.execute(Arc::clone(&args)).await {
            Ok(StepOutput::Continue) => {
                debug!("Step '{}' completed", step.name());
            }
            Ok(StepOutput::Terminate(value)) => {
                info!("Step '{}' terminated the run", step.name());
                return Ok(Outcome::Terminated(value));
            }
            Err(e) => {
                warn!("Step '{}' failed: {}", step.name(), e);
                return Err(e);
            }
        }
    }
    Ok(Outcome::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::from_fn;
    use std::sync::Mutex;

    type Log = Mutex<Vec<&'static str>>;

    fn record(name: &'static str) -> StepRef<Log, &'static str> {
        from_fn(name, move |log: Arc<Log>| async move {
            log.lock().map_err(|e| EngineError::Interrupted(e.to_string()))?.push(name);
            Ok::<_, EngineError>(StepOutput::next())
        })
        .shared()
    }

    #[tokio::test]
    async fn test_execute_empty_engine() {
        let mut engine: Engine<Log, &'static str> = Engine::new();
        let outcome = engine.execute(Mutex::new(Vec::new()), None).await.unwrap();
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(outcome.into_value(), None);
    }

    #[tokio::test]
    async fn test_execute_runs_in_registration_order() {
        let mut engine: Engine<Log, &'static str> = Engine::new();
        engine.append(record("b"), None).unwrap();
        engine.append(record("c"), None).unwrap();
        engine.prepend(record("a"), None).unwrap();

        let log = Arc::new(Mutex::new(Vec::new()));
        let outcome = engine.execute_shared(Arc::clone(&log), None).await.unwrap();
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_mutation_after_execute_call_does_not_affect_run() {
        let mut engine: Engine<Log, &'static str> = Engine::new();
        engine.append(record("a"), None).unwrap();

        let log = Arc::new(Mutex::new(Vec::new()));
        let run = engine.execute_shared(Arc::clone(&log), None);
        engine.append(record("late"), None).unwrap();
        engine.clear();

        run.await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_zero_timeouts_are_ignored() {
        let mut engine: Engine<Log, &'static str> = Engine::new();
        let a = record("a");
        engine.append(Arc::clone(&a), Some(Duration::ZERO)).unwrap();
        assert!(engine.contains(&a));

        let log = Arc::new(Mutex::new(Vec::new()));
        let outcome = engine
            .execute_shared(Arc::clone(&log), Some(Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Completed);
    }

    #[tokio::test]
    async fn test_step_with_timeout_is_not_removable_by_original_handle() {
        let mut engine: Engine<Log, &'static str> = Engine::new();
        let a = record("a");
        engine.append(Arc::clone(&a), Some(Duration::from_secs(1))).unwrap();

        assert!(!engine.remove(&a));
        assert_eq!(engine.len(), 1);

        let wrapper = Arc::clone(&engine.steps()[0]);
        assert!(engine.remove(&wrapper));
        assert!(engine.is_empty());
    }

    #[tokio::test]
    async fn test_options_are_read_per_call() {
        let mut engine: Engine<Log, &'static str> = Engine::new();
        let a = record("a");
        engine.append(Arc::clone(&a), None).unwrap();
        engine.append(Arc::clone(&a), None).unwrap();

        engine.options_mut().reject_duplicates = true;
        assert!(matches!(
            engine.append(Arc::clone(&a), None),
            Err(EngineError::DuplicateStep(_))
        ));

        engine.set_options(EngineOptions::default());
        engine.append(a, None).unwrap();
        assert_eq!(engine.len(), 3);
    }

    #[test]
    fn test_with_steps_applies_duplicate_check() {
        let a = record("a");
        let result = Engine::with_steps(
            vec![Arc::clone(&a), Arc::clone(&a)],
            EngineOptions {
                reject_duplicates: true,
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(EngineError::DuplicateStep(_))));

        let engine = Engine::with_steps(vec![Arc::clone(&a), a], EngineOptions::default()).unwrap();
        assert_eq!(engine.len(), 2);
    }

    #[test]
    fn test_outcome_helpers() {
        assert!(Outcome::Terminated(1).is_terminated());
        assert_eq!(Outcome::Terminated(1).into_value(), Some(1));
        assert!(!Outcome::<i32>::Completed.is_terminated());
    }
}
