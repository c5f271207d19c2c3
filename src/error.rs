use crate::step::StepName;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by step registration and by engine runs.
///
/// Registration errors ([`EngineError::InvalidStep`], [`EngineError::DuplicateStep`])
/// are returned synchronously and leave the registry untouched. Everything else
/// surfaces as the failure of an [`Engine::execute`](crate::Engine::execute) call.
///
/// # Non-Exhaustive
///
/// New variants may be added, so matches need a wildcard arm:
///
/// ```
/// use junban::EngineError;
///
/// fn describe(error: &EngineError) -> String {
///     match error {
///         EngineError::Timeout { limit, .. } => format!("gave up after {:?}", limit),
///         EngineError::DuplicateStep(name) => format!("{} registered twice", name),
///         other => other.to_string(),
///     }
/// }
/// ```
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum EngineError {
    /// The step cannot be placed in the registry.
    #[error("Invalid step '{step_name}': {reason}")]
    InvalidStep {
        /// Name of the rejected step
        step_name: StepName,
        /// Why it was rejected
        reason: String,
    },

    /// The same step reference is already registered and duplicates are rejected.
    #[error("Step already registered: {0}")]
    DuplicateStep(StepName),

    /// A per-step or whole-run time limit was exceeded.
    ///
    /// Displays as the carried message, `Timed out after {ms} ms` unless overridden.
    #[error("{message}")]
    Timeout {
        /// The limit that was exceeded
        limit: Duration,
        /// Human-readable message
        message: String,
    },

    /// A step failed.
    ///
    /// The engine never produces this itself; it is a ready-made variant for
    /// step implementations. Whatever error a step returns is propagated as is.
    #[error("Step failed: {step_name}, details: {details}")]
    StepError {
        /// The name of the step that failed
        step_name: StepName,
        /// Details about the failure
        details: String,
    },

    /// A raced operation was cancelled by the runtime before it settled.
    #[error("Operation interrupted: {0}")]
    Interrupted(String),
}

impl EngineError {
    /// Builds a [`EngineError::Timeout`] with the default message.
    pub fn timeout(limit: Duration) -> Self {
        Self::Timeout {
            limit,
            message: format!("Timed out after {} ms", limit.as_millis()),
        }
    }

    /// Returns `true` for [`EngineError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result alias used across the crate.
pub type Result<T, E = EngineError> = std::result::Result<T, E>;
