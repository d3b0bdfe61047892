//! PEVO Types - Core data model
//!
//! Defines the fundamental types shared across the workspace:
//! - Identifiers (personas, versions, scenarios, runs)
//! - The persona version ledger records and their mutation attempts
//! - Score breakdowns produced by the evaluation collaborator
//! - Persona and scenario registry records

#![warn(unreachable_pub)]

pub mod ids;
pub mod record;
pub mod score;
pub mod version;

// Re-exports for convenience
pub use ids::{PersonaId, RunId, ScenarioId, VersionId};
pub use record::{Persona, Scenario};
pub use score::{DimensionScores, Evaluation, Turn};
pub use version::{MutationAttempt, MutationMetadata, PersonaVersion};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
