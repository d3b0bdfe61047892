//! Error types for the evolution engine
//!
//! Two layers: `EvalError` covers a single collaborator call (one
//! evaluation or proposal), `EngineError` covers the run lifecycle.

use pevo_store::StoreError;
use pevo_types::{PersonaId, RunId, VersionId};
use std::time::Duration;

/// Failure of one collaborator call
#[derive(Debug, Clone, thiserror::Error)]
pub enum EvalError {
    /// Transient failure (transport error, overload) - retryable
    #[error("transient evaluation failure: {0}")]
    Transient(String),

    /// Permanent failure (malformed scenario) - not retryable
    #[error("permanent evaluation failure: {0}")]
    Permanent(String),

    /// Call exceeded the per-evaluation deadline
    #[error("evaluation timed out after {0:?}")]
    Timeout(Duration),
}

impl EvalError {
    /// Check if the call is worth retrying
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout(_))
    }
}

/// Run-lifecycle error type
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// Unknown persona id
    #[error("persona not found: {0}")]
    PersonaNotFound(PersonaId),

    /// Unknown version id
    #[error("version not found: {0}")]
    VersionNotFound(VersionId),

    /// Unknown run id
    #[error("run not found: {0}")]
    RunNotFound(RunId),

    /// Empty scenario set or unresolvable scenario id
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A run is already in flight for this persona
    #[error("evolution already in flight for persona {0}")]
    RunInProgress(PersonaId),

    /// Store-level failure (conflict surfaces here)
    #[error(transparent)]
    Store(#[from] StoreError),
}
