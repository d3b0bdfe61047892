//! PEVO Lineage - Version forest reconstruction
//!
//! Rebuilds a persona's evolutionary history from the flat, newest-first
//! record list the version store hands out:
//! - `LineageForest`: arena-backed tree of versions with parent-derived
//!   depth and per-edge score deltas
//! - `EdgeKind`: improved/regressed classification of an edge
//! - `ViewState`: externally owned selection state passed into query
//!   functions, keeping the core free of UI concerns

#![warn(unreachable_pub)]

pub mod forest;
pub mod view;

// Re-exports for convenience
pub use forest::{EdgeKind, LineageForest, LineageNode};
pub use view::{render_text, ViewState};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
