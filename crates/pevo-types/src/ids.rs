//! Identifier newtypes
//!
//! ULIDs are used for every identifier so that ids sort by creation time
//! and remain unique without coordination.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

macro_rules! ulid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Ulid);

        impl $name {
            /// Generate a new identifier
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

ulid_id!(
    /// Unique persona identifier
    PersonaId
);

ulid_id!(
    /// Unique persona-version identifier (store-assigned)
    VersionId
);

ulid_id!(
    /// Unique scenario identifier
    ScenarioId
);

ulid_id!(
    /// Unique evolution-run identifier
    RunId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_generation_is_unique() {
        let a = PersonaId::new();
        let b = PersonaId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn id_display_roundtrip() {
        let id = VersionId::new();
        let text = id.to_string();
        let parsed = VersionId(text.parse().unwrap());
        assert_eq!(id, parsed);
    }

    #[test]
    fn ids_sort_by_creation() {
        let a = RunId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = RunId::new();
        assert!(a < b);
    }
}
