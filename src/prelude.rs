//! Commonly used types and traits

pub use crate::engine::{Engine, Outcome};
pub use crate::error::EngineError;
pub use crate::options::EngineOptions;
pub use crate::step::{from_fn, Step, StepName, StepOutput, StepRef};
