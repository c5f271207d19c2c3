use crate::error::{EngineError, Result};
use crate::sorter::SortCache;
use crate::step::StepRef;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Ordered collection of steps owned by one engine.
///
/// Registration order is the default execution order. Steps are compared by
/// reference ([`Arc::ptr_eq`]), never by name. Every mutation invalidates the
/// cached priority order.
pub(crate) struct StepRegistry<A, V> {
    steps: Vec<StepRef<A, V>>,
    sort_cache: SortCache<A, V>,
}

impl<A, V> Default for StepRegistry<A, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, V> fmt::Debug for StepRegistry<A, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepRegistry")
            .field(
                "steps",
                &self.steps.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("sort_cache_valid", &self.sort_cache.is_valid())
            .finish()
    }
}

impl<A, V> StepRegistry<A, V> {
    pub(crate) fn new() -> Self {
        Self {
            steps: Vec::new(),
            sort_cache: SortCache::default(),
        }
    }

    /// Adds `step` after every registered step.
    pub(crate) fn append(&mut self, step: StepRef<A, V>, reject_duplicates: bool) -> Result<()> {
        self.check(&step, reject_duplicates)?;
        debug!("Appending step '{}'", step.name());
        self.steps.push(step);
        self.sort_cache.invalidate();
        Ok(())
    }

    /// Adds `step` before every registered step.
    pub(crate) fn prepend(&mut self, step: StepRef<A, V>, reject_duplicates: bool) -> Result<()> {
        self.check(&step, reject_duplicates)?;
        debug!("Prepending step '{}'", step.name());
        self.steps.insert(0, step);
        self.sort_cache.invalidate();
        Ok(())
    }

    /// Removes the first entry that is `step`. Returns whether one was found.
    pub(crate) fn remove(&mut self, step: &StepRef<A, V>) -> bool {
        match self.position(step) {
            Some(index) => {
                let removed = self.steps.remove(index);
                debug!("Removed step '{}'", removed.name());
                self.sort_cache.invalidate();
                true
            }
            None => false,
        }
    }

    /// Removes every step.
    pub(crate) fn clear(&mut self) {
        debug!("Clearing {} steps", self.steps.len());
        self.steps.clear();
        self.sort_cache.invalidate();
    }

    /// Returns `true` if `step` itself is registered.
    pub(crate) fn contains(&self, step: &StepRef<A, V>) -> bool {
        self.position(step).is_some()
    }

    /// Number of registered steps.
    pub(crate) fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if no step is registered.
    pub(crate) fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps in registration order.
    pub(crate) fn steps(&self) -> &[StepRef<A, V>] {
        &self.steps
    }

    /// Steps in priority order. See [`Step::priority`](crate::Step::priority).
    pub(crate) fn sorted(&mut self) -> &[StepRef<A, V>] {
        self.sort_cache.sorted(&self.steps)
    }

    fn position(&self, step: &StepRef<A, V>) -> Option<usize> {
        self.steps.iter().position(|s| Arc::ptr_eq(s, step))
    }

    fn check(&self, step: &StepRef<A, V>, reject_duplicates: bool) -> Result<()> {
        if let Some(priority) = step.priority() {
            if priority.is_nan() {
                return Err(EngineError::InvalidStep {
                    step_name: step.name(),
                    reason: "priority hint is NaN".to_string(),
                });
            }
        }

        if reject_duplicates && !step.allow_duplicates() && self.contains(step) {
            return Err(EngineError::DuplicateStep(step.name()));
        }
        Ok(())
    }
}
