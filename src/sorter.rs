use crate::step::StepRef;
use std::cmp::Ordering;
use tracing::debug;

/// Priority order of a registry, cached between mutations.
///
/// The registry calls [`SortCache::invalidate`] on every mutation; the next
/// [`SortCache::sorted`] call recomputes.
pub(crate) struct SortCache<A, V> {
    cached: Option<Vec<StepRef<A, V>>>,
}

impl<A, V> Default for SortCache<A, V> {
    fn default() -> Self {
        Self { cached: None }
    }
}

impl<A, V> SortCache<A, V> {
    pub(crate) fn invalidate(&mut self) {
        self.cached = None;
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.cached.is_some()
    }

    /// Returns `steps` ordered by ascending priority, reusing the last result
    /// while the cache is valid.
    pub(crate) fn sorted(&mut self, steps: &[StepRef<A, V>]) -> &[StepRef<A, V>] {
        self.cached.get_or_insert_with(|| {
            debug!("Recomputing priority order for {} steps", steps.len());
            let mut ordered = steps.to_vec();
            // stable: equal priorities keep registration order
            ordered.sort_by(|a, b| compare_priority(a.priority(), b.priority()));
            ordered
        })
    }
}

/// Hinted steps first, ascending; unhinted steps last.
fn compare_priority(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
