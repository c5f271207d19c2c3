use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Human-readable step name, used in logs and error messages.
///
/// Names are not identities: two distinct steps may share a name, and the
/// registry tells steps apart by reference (see [`StepRef`]).
///
/// # Examples
///
/// ```
/// use junban::StepName;
///
/// let name = StepName::new("LoadConfig");
/// assert_eq!(name.as_str(), "LoadConfig");
///
/// let name: StepName = "Validate".into();
/// assert_eq!(name.to_string(), "Validate");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StepName(String);

impl StepName {
    /// Creates a new StepName
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Creates a StepName from a type's name (last path segment)
    pub fn from_type_name<T: ?Sized>() -> Self {
        let full_name = std::any::type_name::<T>();
        let short_name = full_name.rsplit("::").next().unwrap_or("UnknownStep");
        Self::new(short_name)
    }

    /// Returns the step name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StepName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StepName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<&str> for StepName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// What a step tells the engine once it settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutput<V> {
    /// Nothing to report; run the next step.
    Continue,
    /// Stop the run; the value becomes the run's outcome.
    Terminate(V),
}

impl<V> StepOutput<V> {
    /// Shorthand for [`StepOutput::Continue`].
    pub fn next() -> Self {
        StepOutput::Continue
    }

    /// Shorthand for [`StepOutput::Terminate`].
    pub fn stop(value: V) -> Self {
        StepOutput::Terminate(value)
    }

    /// Returns `true` for [`StepOutput::Terminate`].
    pub fn is_terminate(&self) -> bool {
        matches!(self, StepOutput::Terminate(_))
    }
}

/// One unit of work in a serial run.
///
/// Every step of a run receives the same shared arguments `A`. Steps hand
/// data to later steps by mutating state reachable through `A` (a `Mutex`,
/// atomics, a channel) and only use their return value to stop the run.
///
/// # Examples
///
/// ```
/// use junban::prelude::*;
/// use async_trait::async_trait;
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
///
/// #[derive(Debug)]
/// struct CountStep;
///
/// #[async_trait]
/// impl Step<AtomicU32, u32> for CountStep {
///     async fn execute(&self, counter: Arc<AtomicU32>) -> Result<StepOutput<u32>, EngineError> {
///         let seen = counter.fetch_add(1, Ordering::SeqCst) + 1;
///         if seen >= 3 {
///             return Ok(StepOutput::stop(seen));
///         }
///         Ok(StepOutput::next())
///     }
///
///     fn priority(&self) -> Option<f64> {
///         Some(10.0)
///     }
/// }
///
/// assert_eq!(Step::<AtomicU32, u32>::name(&CountStep), "CountStep");
/// ```
#[async_trait]
pub trait Step<A, V>: Send + Sync {
    /// Runs the step against the shared arguments of the current run.
    ///
    /// # Returns
    ///
    /// - `Ok(StepOutput::Continue)` - Run the next step
    /// - `Ok(StepOutput::Terminate(v))` - End the run with outcome `v`
    /// - `Err(error)` - End the run with `error`, unchanged
    async fn execute(&self, args: Arc<A>) -> Result<StepOutput<V>>;

    /// Returns the step name. Defaults to the type name.
    fn name(&self) -> StepName {
        StepName::from_type_name::<Self>()
    }

    /// Ordering hint used when priority sorting is enabled. Lower runs earlier;
    /// `None` runs after every step that has a hint.
    fn priority(&self) -> Option<f64> {
        None
    }

    /// Exempts this step from duplicate rejection.
    fn allow_duplicates(&self) -> bool {
        false
    }
}

/// Shared handle to a registered step.
///
/// The registry compares handles with [`Arc::ptr_eq`]; keep a clone of the
/// handle you registered to remove it later.
pub type StepRef<A, V> = Arc<dyn Step<A, V>>;

/// A step backed by an async closure.
///
/// ```
/// use junban::prelude::*;
/// use std::sync::{Arc, Mutex};
///
/// type Log = Mutex<Vec<&'static str>>;
///
/// let step: StepRef<Log, ()> = from_fn("record", |log: Arc<Log>| async move {
///     if let Ok(mut entries) = log.lock() {
///         entries.push("record");
///     }
///     Ok::<_, EngineError>(StepOutput::next())
/// })
/// .with_priority(1.0)
/// .shared();
///
/// assert_eq!(step.priority(), Some(1.0));
/// ```
pub struct FnStep<F> {
    name: StepName,
    priority: Option<f64>,
    allow_duplicates: bool,
    f: F,
}

/// Creates a [`FnStep`] named `name` that runs `f`.
pub fn from_fn<F>(name: impl Into<StepName>, f: F) -> FnStep<F> {
    FnStep {
        name: name.into(),
        priority: None,
        allow_duplicates: false,
        f,
    }
}

impl<F> FnStep<F> {
    /// Sets the priority hint.
    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Exempts the step from duplicate rejection.
    pub fn allow_duplicates(mut self) -> Self {
        self.allow_duplicates = true;
        self
    }

    /// Moves the step behind a [`StepRef`].
    pub fn shared<A, V>(self) -> StepRef<A, V>
    where
        Self: Step<A, V> + 'static,
    {
        Arc::new(self)
    }
}

impl<F> fmt::Debug for FnStep<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStep")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("allow_duplicates", &self.allow_duplicates)
            .finish()
    }
}

#[async_trait]
impl<A, V, F, Fut> Step<A, V> for FnStep<F>
where
    A: Send + Sync + 'static,
    V: Send + 'static,
    F: Fn(Arc<A>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<StepOutput<V>>> + Send + 'static,
{
    async fn execute(&self, args: Arc<A>) -> Result<StepOutput<V>> {
        (self.f)(args).await
    }

    fn name(&self) -> StepName {
        self.name.clone()
    }

    fn priority(&self) -> Option<f64> {
        self.priority
    }

    fn allow_duplicates(&self) -> bool {
        self.allow_duplicates
    }
}
