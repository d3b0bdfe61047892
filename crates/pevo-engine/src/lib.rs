//! PEVO Engine - Evolution run orchestration
//!
//! The engine drives one end-to-end self-improvement loop for a persona:
//! - Collaborator seams (`Evaluator`, `MutationProposer`) for the external
//!   simulation/evaluation engine and mutation proposer
//! - `MutationBatchEvaluator`: baseline scoring, candidate fan-out with
//!   bounded concurrency, degradation on partial failure, deterministic
//!   winner selection
//! - `EvolutionService`: asynchronous run lifecycle (spawn, poll, await,
//!   cancel), per-persona in-flight guard, version append and activation
//! - Seeded simulated collaborators for tests and the demo driver
//!
//! # Example
//!
//! ```rust,ignore
//! use pevo_engine::{EvolutionConfig, EvolutionService};
//!
//! # async fn example(service: EvolutionService) -> Result<(), pevo_engine::EngineError> {
//! let run_id = service.start_run(persona_id, &scenario_ids)?;
//! let outcome = service.wait(run_id).await?;
//! println!("run finished: {outcome:?}");
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod batch;
pub mod config;
pub mod error;
pub mod mock;
pub mod service;
pub mod traits;

// Re-exports for convenience
pub use batch::{BatchVerdict, CancelFlag, MutationBatchEvaluator};
pub use config::EvolutionConfig;
pub use error::{EngineError, EvalError};
pub use service::{EvolutionService, RunStatus};
pub use traits::{Evaluator, MutationProposer, Proposal};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
