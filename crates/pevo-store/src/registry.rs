//! Persona and scenario registries
//!
//! Thin keyed stores with create/read/update/delete semantics. The
//! evolution core only consumes records by id; everything else about
//! these registries is presentation-layer CRUD.

use crate::error::StoreError;
use parking_lot::RwLock;
use pevo_types::{Persona, PersonaId, Scenario, ScenarioId};
use std::collections::HashMap;

/// Keyed store of persona records
#[derive(Debug, Default)]
pub struct PersonaRegistry {
    inner: RwLock<HashMap<PersonaId, Persona>>,
}

impl PersonaRegistry {
    /// Create an empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a persona record
    pub fn create(&self, persona: Persona) -> PersonaId {
        let id = persona.id;
        self.inner.write().insert(id, persona);
        id
    }

    /// Fetch a persona by id
    ///
    /// # Errors
    /// - `StoreError::NotFound` if absent
    pub fn get(&self, id: PersonaId) -> Result<Persona, StoreError> {
        self.inner
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("persona", id))
    }

    /// Apply an update to a persona record
    ///
    /// # Errors
    /// - `StoreError::NotFound` if absent
    pub fn update(&self, id: PersonaId, f: impl FnOnce(&mut Persona)) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let persona = inner
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("persona", id))?;
        f(persona);
        Ok(())
    }

    /// Delete a persona record
    ///
    /// Version-ledger cascading is the caller's responsibility (the service
    /// layer pairs this with `VersionStore::remove_persona`).
    ///
    /// # Errors
    /// - `StoreError::NotFound` if absent
    pub fn delete(&self, id: PersonaId) -> Result<(), StoreError> {
        self.inner
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("persona", id))
    }

    /// All personas, ordered by id (creation order under ULIDs)
    #[must_use]
    pub fn list(&self) -> Vec<Persona> {
        let mut personas: Vec<Persona> = self.inner.read().values().cloned().collect();
        personas.sort_by_key(|p| p.id);
        personas
    }

    /// Whether a persona exists
    #[inline]
    #[must_use]
    pub fn contains(&self, id: PersonaId) -> bool {
        self.inner.read().contains_key(&id)
    }
}

/// Keyed store of scenario records
#[derive(Debug, Default)]
pub struct ScenarioRegistry {
    inner: RwLock<HashMap<ScenarioId, Scenario>>,
}

impl ScenarioRegistry {
    /// Create an empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a scenario record
    pub fn create(&self, scenario: Scenario) -> ScenarioId {
        let id = scenario.id;
        self.inner.write().insert(id, scenario);
        id
    }

    /// Fetch a scenario by id
    ///
    /// # Errors
    /// - `StoreError::NotFound` if absent
    pub fn get(&self, id: ScenarioId) -> Result<Scenario, StoreError> {
        self.inner
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("scenario", id))
    }

    /// Apply an update to a scenario record
    ///
    /// # Errors
    /// - `StoreError::NotFound` if absent
    pub fn update(&self, id: ScenarioId, f: impl FnOnce(&mut Scenario)) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let scenario = inner
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("scenario", id))?;
        f(scenario);
        Ok(())
    }

    /// Delete a scenario record
    ///
    /// # Errors
    /// - `StoreError::NotFound` if absent
    pub fn delete(&self, id: ScenarioId) -> Result<(), StoreError> {
        self.inner
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("scenario", id))
    }

    /// All scenarios, ordered by id
    #[must_use]
    pub fn list(&self) -> Vec<Scenario> {
        let mut scenarios: Vec<Scenario> = self.inner.read().values().cloned().collect();
        scenarios.sort_by_key(|s| s.id);
        scenarios
    }

    /// Resolve a full scenario set, failing on the first unknown id
    ///
    /// # Errors
    /// - `StoreError::NotFound` naming the first missing scenario
    pub fn resolve(&self, ids: &[ScenarioId]) -> Result<Vec<Scenario>, StoreError> {
        ids.iter().map(|id| self.get(*id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persona_crud() {
        let registry = PersonaRegistry::new();
        let id = registry.create(Persona::new("Marcus", "You collect debts."));

        assert!(registry.contains(id));
        assert_eq!(registry.get(id).unwrap().name, "Marcus");

        registry
            .update(id, |p| p.mood = Some("stern".to_string()))
            .unwrap();
        assert_eq!(registry.get(id).unwrap().mood.as_deref(), Some("stern"));

        registry.delete(id).unwrap();
        assert!(matches!(registry.get(id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn scenario_resolve_all_or_nothing() {
        let registry = ScenarioRegistry::new();
        let a = registry.create(Scenario::new("Angry", "ctx"));
        let b = registry.create(Scenario::new("Evasive", "ctx"));

        let resolved = registry.resolve(&[a, b]).unwrap();
        assert_eq!(resolved.len(), 2);

        let err = registry.resolve(&[a, ScenarioId::new()]).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn list_is_ordered_by_id() {
        let registry = PersonaRegistry::new();
        let first = registry.create(Persona::new("A", "p"));
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = registry.create(Persona::new("B", "p"));

        let listed = registry.list();
        assert_eq!(listed[0].id, first);
        assert_eq!(listed[1].id, second);
    }
}
