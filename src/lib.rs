//! # Junban (順番)
//!
//! A small serial step-execution engine for async Rust.
//!
//! "Junban" (順番) means "order" or "one's turn" in Japanese: every step
//! waits for its turn, and a run ends as soon as one of them has something
//! to say.
//!
//! ## Features
//!
//! - **Serial**: steps run one at a time against one shared argument value
//! - **Early exit**: a step returns [`StepOutput::Terminate`] to end the run
//! - **Priorities**: optional ascending-priority order, cached between changes
//! - **Duplicate rejection**: optional, reference-based, with per-step exemption
//! - **Timeouts**: per-step and whole-run, cooperative (the caller stops
//!   waiting; the step is not aborted)
//!
//! ## Quick Start
//!
//! ```rust
//! use junban::prelude::*;
//! use std::sync::Mutex;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! type Order = Mutex<Vec<&'static str>>;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), EngineError> {
//! let mut engine: Engine<Order, String> = Engine::new();
//! engine.options_mut().sort_by_priority = true;
//!
//! engine.append(
//!     from_fn("ship", |order: Arc<Order>| async move {
//!         let items = order.lock().map(|o| o.len()).unwrap_or(0);
//!         Ok::<_, EngineError>(StepOutput::stop(format!("shipped {} items", items)))
//!     })
//!     .with_priority(2.0)
//!     .shared(),
//!     Some(Duration::from_secs(5)),
//! )?;
//! engine.append(
//!     from_fn("pack", |order: Arc<Order>| async move {
//!         if let Ok(mut items) = order.lock() {
//!             items.push("book");
//!         }
//!         Ok::<_, EngineError>(StepOutput::next())
//!     })
//!     .with_priority(1.0)
//!     .shared(),
//!     None,
//! )?;
//!
//! let outcome = engine
//!     .execute(Mutex::new(Vec::new()), Some(Duration::from_secs(30)))
//!     .await?;
//! assert_eq!(outcome.into_value().as_deref(), Some("shipped 1 items"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use junban::prelude::*;
//! use std::time::Duration;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let mut engine: Engine<(), ()> = Engine::new();
//! engine
//!     .append(
//!         from_fn("slow", |_: Arc<()>| async {
//!             tokio::time::sleep(Duration::from_secs(1)).await;
//!             Ok::<_, EngineError>(StepOutput::next())
//!         })
//!         .shared(),
//!         None,
//!     )
//!     .expect("valid step");
//!
//! match engine.execute((), Some(Duration::from_millis(10))).await {
//!     Ok(outcome) => println!("finished: {:?}", outcome),
//!     Err(EngineError::Timeout { message, .. }) => eprintln!("{}", message),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! # }
//! ```

mod engine;
mod error;
mod options;
mod registry;
mod sorter;
mod step;
mod timeout;

pub mod prelude;

pub use engine::{Engine, Outcome};
pub use error::{EngineError, Result};
pub use options::EngineOptions;
pub use step::{from_fn, FnStep, Step, StepName, StepOutput, StepRef};
pub use timeout::{race, TimeoutStep};
