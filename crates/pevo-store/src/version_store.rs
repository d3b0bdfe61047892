//! Append-only persona version ledger
//!
//! The ledger enforces two invariants on append:
//! - version numbers are contiguous per persona, starting at 1
//! - `parent_version_id` references an existing version of the same
//!   persona with a strictly smaller version number (absent only for
//!   version 1)
//!
//! The ledger also owns the active-version pointer per persona. Keeping
//! the pointer under the same write lock as the records makes the
//! append-then-repoint step a single critical section: a lost race with a
//! concurrent append surfaces as `Conflict`, and `activate` can never
//! observe a half-applied run.

use crate::error::StoreError;
use parking_lot::RwLock;
use pevo_types::{PersonaId, PersonaVersion, VersionId};
use std::collections::HashMap;

/// In-memory append-only version ledger
#[derive(Debug, Default)]
pub struct VersionStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    versions: HashMap<VersionId, PersonaVersion>,
    /// Per-persona ids in ascending version order
    by_persona: HashMap<PersonaId, Vec<VersionId>>,
    /// Active-version pointer per persona
    active: HashMap<PersonaId, VersionId>,
}

impl Inner {
    fn next_version_number(&self, persona_id: PersonaId) -> u32 {
        self.by_persona
            .get(&persona_id)
            .and_then(|ids| ids.last())
            .and_then(|id| self.versions.get(id))
            .map_or(1, |v| v.version + 1)
    }
}

impl VersionStore {
    /// Create an empty ledger
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a version and repoint the persona's active pointer to it
    ///
    /// # Errors
    /// - `StoreError::Conflict` if the version number is not exactly
    ///   `max(existing) + 1` for the persona, or if the parent reference
    ///   violates the ledger invariants
    pub fn append(&self, version: PersonaVersion) -> Result<VersionId, StoreError> {
        let mut inner = self.inner.write();

        let expected = inner.next_version_number(version.persona_id);
        if version.version != expected {
            let msg = format!(
                "persona {} expected version {expected}, got {}",
                version.persona_id, version.version
            );
            tracing::error!(persona_id = %version.persona_id, "append conflict: {msg}");
            return Err(StoreError::Conflict(msg));
        }

        match version.parent_version_id {
            None if version.version == 1 => {}
            None => {
                let msg = format!("version {} is missing a parent reference", version.version);
                tracing::error!(persona_id = %version.persona_id, "append conflict: {msg}");
                return Err(StoreError::Conflict(msg));
            }
            Some(_) if version.version == 1 => {
                let msg = "baseline version may not reference a parent".to_string();
                tracing::error!(persona_id = %version.persona_id, "append conflict: {msg}");
                return Err(StoreError::Conflict(msg));
            }
            Some(parent_id) => {
                let parent = inner.versions.get(&parent_id).ok_or_else(|| {
                    StoreError::Conflict(format!("parent version {parent_id} does not exist"))
                })?;
                if parent.persona_id != version.persona_id {
                    return Err(StoreError::Conflict(format!(
                        "parent version {parent_id} belongs to a different persona"
                    )));
                }
                if parent.version >= version.version {
                    return Err(StoreError::Conflict(format!(
                        "parent version number {} is not smaller than {}",
                        parent.version, version.version
                    )));
                }
            }
        }

        let id = version.id;
        let persona_id = version.persona_id;
        inner.by_persona.entry(persona_id).or_default().push(id);
        inner.versions.insert(id, version);
        inner.active.insert(persona_id, id);

        tracing::debug!(%persona_id, version_id = %id, version = expected, "appended version");
        Ok(id)
    }

    /// Fetch one version by id
    ///
    /// # Errors
    /// - `StoreError::NotFound` if absent
    pub fn get(&self, version_id: VersionId) -> Result<PersonaVersion, StoreError> {
        self.inner
            .read()
            .versions
            .get(&version_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("version", version_id))
    }

    /// All versions for a persona, newest first
    #[must_use]
    pub fn list(&self, persona_id: PersonaId) -> Vec<PersonaVersion> {
        let inner = self.inner.read();
        inner
            .by_persona
            .get(&persona_id)
            .map(|ids| {
                ids.iter()
                    .rev()
                    .filter_map(|id| inner.versions.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Most recently appended version for a persona
    #[must_use]
    pub fn latest(&self, persona_id: PersonaId) -> Option<PersonaVersion> {
        let inner = self.inner.read();
        inner
            .by_persona
            .get(&persona_id)
            .and_then(|ids| ids.last())
            .and_then(|id| inner.versions.get(id).cloned())
    }

    /// Number of versions stored for a persona
    #[inline]
    #[must_use]
    pub fn count(&self, persona_id: PersonaId) -> usize {
        self.inner
            .read()
            .by_persona
            .get(&persona_id)
            .map_or(0, Vec::len)
    }

    /// Version number the next append for this persona must carry
    #[inline]
    #[must_use]
    pub fn next_version_number(&self, persona_id: PersonaId) -> u32 {
        self.inner.read().next_version_number(persona_id)
    }

    /// Designate an existing version as the persona's active one
    ///
    /// Idempotent; alters no stored record.
    ///
    /// # Errors
    /// - `StoreError::NotFound` if the version does not exist
    pub fn activate(&self, version_id: VersionId) -> Result<PersonaVersion, StoreError> {
        let mut inner = self.inner.write();
        let version = inner
            .versions
            .get(&version_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("version", version_id))?;
        inner.active.insert(version.persona_id, version_id);
        tracing::debug!(persona_id = %version.persona_id, %version_id, "activated version");
        Ok(version)
    }

    /// The persona's currently active version, if any exists
    #[must_use]
    pub fn active_version(&self, persona_id: PersonaId) -> Option<PersonaVersion> {
        let inner = self.inner.read();
        inner
            .active
            .get(&persona_id)
            .and_then(|id| inner.versions.get(id).cloned())
    }

    /// Id of the persona's currently active version
    #[inline]
    #[must_use]
    pub fn active_version_id(&self, persona_id: PersonaId) -> Option<VersionId> {
        self.inner.read().active.get(&persona_id).copied()
    }

    /// Cascade hook: drop every version and the active pointer for a persona
    pub fn remove_persona(&self, persona_id: PersonaId) {
        let mut inner = self.inner.write();
        if let Some(ids) = inner.by_persona.remove(&persona_id) {
            for id in ids {
                inner.versions.remove(&id);
            }
        }
        inner.active.remove(&persona_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(store: &VersionStore, persona: PersonaId, scores: &[f64]) -> Vec<VersionId> {
        let mut ids = Vec::new();
        for (i, score) in scores.iter().enumerate() {
            let version = match ids.last() {
                None => PersonaVersion::baseline(persona, format!("p{i}"), *score),
                Some(parent) => {
                    PersonaVersion::derived(persona, i as u32 + 1, *parent, format!("p{i}"), *score)
                }
            };
            ids.push(store.append(version).unwrap());
        }
        ids
    }

    #[test]
    fn append_assigns_contiguous_numbers() {
        let store = VersionStore::new();
        let persona = PersonaId::new();
        chain(&store, persona, &[5.0, 6.0, 7.0]);

        let listed = store.list(persona);
        assert_eq!(listed.len(), 3);
        let numbers: Vec<u32> = listed.iter().map(|v| v.version).collect();
        assert_eq!(numbers, vec![3, 2, 1]); // newest first
        assert_eq!(store.next_version_number(persona), 4);
    }

    #[test]
    fn append_rejects_gap() {
        let store = VersionStore::new();
        let persona = PersonaId::new();
        let ids = chain(&store, persona, &[5.0]);

        let skip = PersonaVersion::derived(persona, 3, ids[0], "p", 6.0);
        let err = store.append(skip).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.count(persona), 1);
    }

    #[test]
    fn append_rejects_duplicate_number() {
        let store = VersionStore::new();
        let persona = PersonaId::new();
        let ids = chain(&store, persona, &[5.0, 6.0]);

        let dup = PersonaVersion::derived(persona, 2, ids[0], "p", 6.5);
        assert!(matches!(
            store.append(dup),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn append_rejects_missing_parent_reference() {
        let store = VersionStore::new();
        let persona = PersonaId::new();
        chain(&store, persona, &[5.0]);

        let mut orphan = PersonaVersion::baseline(persona, "p", 6.0);
        orphan.version = 2;
        assert!(matches!(
            store.append(orphan),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn append_rejects_unknown_parent() {
        let store = VersionStore::new();
        let persona = PersonaId::new();
        chain(&store, persona, &[5.0]);

        let ghost = VersionId::new();
        let version = PersonaVersion::derived(persona, 2, ghost, "p", 6.0);
        assert!(matches!(
            store.append(version),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn append_rejects_cross_persona_parent() {
        let store = VersionStore::new();
        let a = PersonaId::new();
        let b = PersonaId::new();
        let a_ids = chain(&store, a, &[5.0]);
        chain(&store, b, &[5.0]);

        let version = PersonaVersion::derived(b, 2, a_ids[0], "p", 6.0);
        assert!(matches!(
            store.append(version),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn append_rejects_parent_on_baseline() {
        let store = VersionStore::new();
        let persona = PersonaId::new();
        let other = PersonaId::new();
        let other_ids = chain(&store, other, &[5.0]);

        let mut bad = PersonaVersion::baseline(persona, "p", 5.0);
        bad.parent_version_id = Some(other_ids[0]);
        assert!(matches!(
            store.append(bad),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn append_repoints_active_to_newest() {
        let store = VersionStore::new();
        let persona = PersonaId::new();
        let ids = chain(&store, persona, &[5.0, 6.0]);

        assert_eq!(store.active_version_id(persona), Some(ids[1]));
    }

    #[test]
    fn activate_overrides_and_is_idempotent() {
        let store = VersionStore::new();
        let persona = PersonaId::new();
        let ids = chain(&store, persona, &[5.0, 6.0, 7.0]);

        store.activate(ids[0]).unwrap();
        assert_eq!(store.active_version_id(persona), Some(ids[0]));

        // Re-activating is a no-op
        store.activate(ids[0]).unwrap();
        assert_eq!(store.active_version_id(persona), Some(ids[0]));

        // History untouched
        assert_eq!(store.count(persona), 3);
        assert_eq!(store.latest(persona).unwrap().version, 3);
    }

    #[test]
    fn activate_unknown_version_fails() {
        let store = VersionStore::new();
        assert!(matches!(
            store.activate(VersionId::new()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn branching_parent_is_accepted() {
        let store = VersionStore::new();
        let persona = PersonaId::new();
        let ids = chain(&store, persona, &[5.0, 6.0]);

        // Third version branches from version 1 instead of version 2
        let branch = PersonaVersion::derived(persona, 3, ids[0], "p", 6.5);
        let branch_id = store.append(branch).unwrap();

        let stored = store.get(branch_id).unwrap();
        assert_eq!(stored.parent_version_id, Some(ids[0]));
    }

    #[test]
    fn remove_persona_cascades() {
        let store = VersionStore::new();
        let persona = PersonaId::new();
        let ids = chain(&store, persona, &[5.0, 6.0]);

        store.remove_persona(persona);
        assert_eq!(store.count(persona), 0);
        assert!(store.active_version_id(persona).is_none());
        assert!(matches!(store.get(ids[0]), Err(StoreError::NotFound(_))));
    }
}
