//! PEVO Store - Version ledger and registries
//!
//! Provides the persistence layer of the evolution core:
//! - `VersionStore`: append-only ledger of persona versions with
//!   contiguity and parent invariants, plus the mutable active-version
//!   pointer per persona
//! - `PersonaRegistry` / `ScenarioRegistry`: thin keyed stores the run
//!   controller reads records from
//!
//! All stores are in-memory and safe to share across tasks; interior
//! mutability follows the registry-handle pattern (`RwLock<HashMap<..>>`).

#![warn(unreachable_pub)]

pub mod error;
pub mod registry;
pub mod version_store;

// Re-exports for convenience
pub use error::StoreError;
pub use registry::{PersonaRegistry, ScenarioRegistry};
pub use version_store::VersionStore;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
