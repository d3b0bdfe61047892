//! Error types for the store layer

/// Store error type
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// Record does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Version-number or parent invariant violated on append
    ///
    /// Indicates a concurrency bug or race; never retried automatically.
    #[error("version conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    /// Build a not-found error for a keyed record
    #[inline]
    #[must_use]
    pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{kind} {id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = StoreError::not_found("persona", "01H");
        assert!(err.to_string().contains("persona 01H"));

        let err = StoreError::Conflict("expected version 2, got 4".to_string());
        assert!(err.to_string().contains("version conflict"));
    }
}
