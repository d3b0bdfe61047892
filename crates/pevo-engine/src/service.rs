//! Evolution run lifecycle
//!
//! Initiating a run returns a `RunId` immediately; the mutation batch
//! proceeds on a spawned task and callers poll (`run_status`) or
//! subscribe (`wait`) for the terminal outcome. At most one run may be
//! in flight per persona; the final append-then-repoint step goes
//! through the version store's single critical section, so a failed or
//! cancelled run leaves no partial version.

use crate::batch::{BatchVerdict, CancelFlag, MutationBatchEvaluator};
use crate::config::EvolutionConfig;
use crate::error::EngineError;
use crate::traits::{Evaluator, MutationProposer};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use pevo_store::{PersonaRegistry, ScenarioRegistry, VersionStore};
use pevo_types::{MutationAttempt, PersonaId, PersonaVersion, RunId, ScenarioId, VersionId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// Observable state of one evolution run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RunStatus {
    /// Mutation batch still executing
    Running,
    /// A new version was accepted and activated
    Evolved {
        /// Id of the appended version
        version_id: VersionId,
        /// Number of the appended version
        version: u32,
        /// Baseline the winner was compared against
        baseline_score: f64,
        /// Winning candidate's average score
        new_score: f64,
        /// `new_score - baseline_score`
        improvement: f64,
    },
    /// The run finished without creating a version
    NotEvolved {
        /// Why the run did not evolve
        reason: String,
        /// Baseline score measured this run
        baseline_score: f64,
        /// Rejected attempts, retained on the outcome for inspection only
        attempts: Vec<MutationAttempt>,
    },
    /// Every candidate (or the baseline) failed; safe to retry from scratch
    Failed {
        /// What went wrong
        reason: String,
    },
    /// Cancellation was requested and honored; no version created
    Cancelled,
}

impl RunStatus {
    /// Whether the run reached an end state
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Snapshot of a run's identity and state
#[derive(Debug, Clone)]
pub struct RunInfo {
    /// Persona the run belongs to
    pub persona_id: PersonaId,
    /// When the run was initiated
    pub started_at: DateTime<Utc>,
    /// Current status
    pub status: RunStatus,
}

#[derive(Debug)]
struct RunRecord {
    persona_id: PersonaId,
    started_at: DateTime<Utc>,
    cancel: CancelFlag,
    status_rx: watch::Receiver<RunStatus>,
}

/// Orchestrates evolution runs, activation, and the live-prompt surface
pub struct EvolutionService {
    personas: Arc<PersonaRegistry>,
    scenarios: Arc<ScenarioRegistry>,
    versions: Arc<VersionStore>,
    batch: Arc<MutationBatchEvaluator>,
    runs: Arc<DashMap<RunId, RunRecord>>,
    in_flight: Arc<DashMap<PersonaId, RunId>>,
}

impl EvolutionService {
    /// Create a service over the stores and collaborators
    #[must_use]
    pub fn new(
        personas: Arc<PersonaRegistry>,
        scenarios: Arc<ScenarioRegistry>,
        versions: Arc<VersionStore>,
        evaluator: Arc<dyn Evaluator>,
        proposer: Arc<dyn MutationProposer>,
        config: EvolutionConfig,
    ) -> Self {
        Self {
            personas,
            scenarios,
            versions,
            batch: Arc::new(MutationBatchEvaluator::new(evaluator, proposer, config)),
            runs: Arc::new(DashMap::new()),
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Initiate an evolution run; returns immediately with its id
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    /// - `EngineError::PersonaNotFound` for an unknown persona
    /// - `EngineError::InvalidArgument` for an empty or unresolvable
    ///   scenario set
    /// - `EngineError::RunInProgress` while another run holds the persona
    pub fn start_run(
        &self,
        persona_id: PersonaId,
        scenario_ids: &[ScenarioId],
    ) -> Result<RunId, EngineError> {
        let persona = self
            .personas
            .get(persona_id)
            .map_err(|_| EngineError::PersonaNotFound(persona_id))?;
        if scenario_ids.is_empty() {
            return Err(EngineError::InvalidArgument(
                "scenario set is empty".to_string(),
            ));
        }
        let scenarios = self
            .scenarios
            .resolve(scenario_ids)
            .map_err(|e| EngineError::InvalidArgument(e.to_string()))?;

        let run_id = RunId::new();
        match self.in_flight.entry(persona_id) {
            Entry::Occupied(_) => return Err(EngineError::RunInProgress(persona_id)),
            Entry::Vacant(slot) => {
                slot.insert(run_id);
            }
        }

        // Baseline prompt and parent are frozen at launch; a concurrent
        // activate() does not retarget a running batch.
        let (current_prompt, parent_id) = match self.versions.active_version(persona_id) {
            Some(v) => (v.system_prompt, Some(v.id)),
            None => (persona.system_prompt, None),
        };

        let cancel = CancelFlag::new();
        let (status_tx, status_rx) = watch::channel(RunStatus::Running);
        self.runs.insert(
            run_id,
            RunRecord {
                persona_id,
                started_at: Utc::now(),
                cancel: cancel.clone(),
                status_rx,
            },
        );

        let batch = Arc::clone(&self.batch);
        let versions = Arc::clone(&self.versions);
        let in_flight = Arc::clone(&self.in_flight);
        tokio::spawn(async move {
            tracing::info!(%run_id, %persona_id, scenario_count = scenarios.len(), "run started");
            let verdict = batch.execute(&current_prompt, &scenarios, &cancel).await;
            let status = conclude(
                &versions,
                persona_id,
                &current_prompt,
                parent_id,
                &cancel,
                verdict,
            );
            tracing::info!(%run_id, %persona_id, terminal = discriminant_name(&status), "run finished");
            // Release the guard before publishing: a caller that observes
            // the terminal status must be able to start the next run.
            in_flight.remove_if(&persona_id, |_, owner| *owner == run_id);
            let _ = status_tx.send(status);
        });

        Ok(run_id)
    }

    /// Poll a run's current status
    ///
    /// # Errors
    /// - `EngineError::RunNotFound` for an unknown run id
    pub fn run_status(&self, run_id: RunId) -> Result<RunStatus, EngineError> {
        self.runs
            .get(&run_id)
            .map(|record| record.status_rx.borrow().clone())
            .ok_or(EngineError::RunNotFound(run_id))
    }

    /// Identity and state snapshot of a run
    ///
    /// # Errors
    /// - `EngineError::RunNotFound` for an unknown run id
    pub fn run_info(&self, run_id: RunId) -> Result<RunInfo, EngineError> {
        self.runs
            .get(&run_id)
            .map(|record| RunInfo {
                persona_id: record.persona_id,
                started_at: record.started_at,
                status: record.status_rx.borrow().clone(),
            })
            .ok_or(EngineError::RunNotFound(run_id))
    }

    /// Await a run's terminal status
    ///
    /// # Errors
    /// - `EngineError::RunNotFound` for an unknown run id
    pub async fn wait(&self, run_id: RunId) -> Result<RunStatus, EngineError> {
        let mut rx = self
            .runs
            .get(&run_id)
            .map(|record| record.status_rx.clone())
            .ok_or(EngineError::RunNotFound(run_id))?;
        loop {
            let status = rx.borrow_and_update().clone();
            if status.is_terminal() {
                return Ok(status);
            }
            if rx.changed().await.is_err() {
                // Sender gone; last published value is final
                return Ok(rx.borrow().clone());
            }
        }
    }

    /// Initiate a run and await its terminal status
    ///
    /// # Errors
    /// Same as [`Self::start_run`]
    pub async fn run_to_completion(
        &self,
        persona_id: PersonaId,
        scenario_ids: &[ScenarioId],
    ) -> Result<RunStatus, EngineError> {
        let run_id = self.start_run(persona_id, scenario_ids)?;
        self.wait(run_id).await
    }

    /// Request cancellation of an in-flight run
    ///
    /// Dispatched evaluations drain; no new ones are issued and no
    /// version is created. Idempotent, including on finished runs.
    ///
    /// # Errors
    /// - `EngineError::RunNotFound` for an unknown run id
    pub fn cancel_run(&self, run_id: RunId) -> Result<(), EngineError> {
        let record = self
            .runs
            .get(&run_id)
            .ok_or(EngineError::RunNotFound(run_id))?;
        record.cancel.cancel();
        tracing::info!(%run_id, "cancellation requested");
        Ok(())
    }

    /// Designate an existing version as its persona's active one
    ///
    /// # Errors
    /// - `EngineError::VersionNotFound` for an unknown version id
    pub fn activate(&self, version_id: VersionId) -> Result<PersonaVersion, EngineError> {
        self.versions
            .activate(version_id)
            .map_err(|_| EngineError::VersionNotFound(version_id))
    }

    /// The prompt text currently served to live sessions
    ///
    /// Falls back to the persona's registry prompt while the ledger is
    /// still empty.
    ///
    /// # Errors
    /// - `EngineError::PersonaNotFound` for an unknown persona
    pub fn get_active_prompt(&self, persona_id: PersonaId) -> Result<String, EngineError> {
        if let Some(version) = self.versions.active_version(persona_id) {
            return Ok(version.system_prompt);
        }
        self.personas
            .get(persona_id)
            .map(|p| p.system_prompt)
            .map_err(|_| EngineError::PersonaNotFound(persona_id))
    }

    /// All versions for a persona, newest first
    #[must_use]
    pub fn list_versions(&self, persona_id: PersonaId) -> Vec<PersonaVersion> {
        self.versions.list(persona_id)
    }

    /// Fetch one version (mutation attempts included)
    ///
    /// # Errors
    /// - `EngineError::VersionNotFound` for an unknown version id
    pub fn version(&self, version_id: VersionId) -> Result<PersonaVersion, EngineError> {
        self.versions
            .get(version_id)
            .map_err(|_| EngineError::VersionNotFound(version_id))
    }

    /// Id of the persona's active version, if the ledger has one
    #[inline]
    #[must_use]
    pub fn active_version_id(&self, persona_id: PersonaId) -> Option<VersionId> {
        self.versions.active_version_id(persona_id)
    }

    /// Delete a persona and cascade to its version ledger
    ///
    /// # Errors
    /// - `EngineError::RunInProgress` while a run holds the persona
    /// - `EngineError::PersonaNotFound` for an unknown persona
    pub fn delete_persona(&self, persona_id: PersonaId) -> Result<(), EngineError> {
        if self.in_flight.contains_key(&persona_id) {
            return Err(EngineError::RunInProgress(persona_id));
        }
        self.personas
            .delete(persona_id)
            .map_err(|_| EngineError::PersonaNotFound(persona_id))?;
        self.versions.remove_persona(persona_id);
        Ok(())
    }
}

/// Map a batch verdict to the run's terminal status, committing the new
/// version on acceptance. All-or-nothing: any store error (a conflict is
/// a concurrency defect) leaves the ledger untouched and fails the run.
fn conclude(
    versions: &VersionStore,
    persona_id: PersonaId,
    current_prompt: &str,
    parent_id: Option<VersionId>,
    cancel: &CancelFlag,
    verdict: BatchVerdict,
) -> RunStatus {
    match verdict {
        BatchVerdict::Cancelled => RunStatus::Cancelled,
        BatchVerdict::Failed { reason } => RunStatus::Failed { reason },
        BatchVerdict::NotEvolved {
            reason,
            baseline_score,
            attempts,
            ..
        } => RunStatus::NotEvolved {
            reason,
            baseline_score,
            attempts,
        },
        BatchVerdict::Evolved {
            baseline_score,
            new_score,
            improvement,
            attempts,
            ..
        } => {
            if cancel.is_cancelled() {
                return RunStatus::Cancelled;
            }
            let Some(winner_prompt) = attempts
                .iter()
                .find(|a| a.is_winner)
                .map(|a| a.mutated_prompt.clone())
            else {
                return RunStatus::Failed {
                    reason: "accepted batch carries no winner".to_string(),
                };
            };

            // First accepted run seeds the ledger: the prompt that was
            // measured as the baseline becomes version 1.
            let parent_id = match parent_id {
                Some(id) => id,
                None => {
                    let baseline =
                        PersonaVersion::baseline(persona_id, current_prompt, baseline_score);
                    match versions.append(baseline) {
                        Ok(id) => id,
                        Err(e) => {
                            return RunStatus::Failed {
                                reason: e.to_string(),
                            }
                        }
                    }
                }
            };

            let next = versions.next_version_number(persona_id);
            let record =
                PersonaVersion::derived(persona_id, next, parent_id, winner_prompt, new_score)
                    .with_baseline_score(baseline_score)
                    .with_attempts(attempts);
            match versions.append(record) {
                Ok(version_id) => RunStatus::Evolved {
                    version_id,
                    version: next,
                    baseline_score,
                    new_score,
                    improvement,
                },
                Err(e) => RunStatus::Failed {
                    reason: e.to_string(),
                },
            }
        }
    }
}

fn discriminant_name(status: &RunStatus) -> &'static str {
    match status {
        RunStatus::Running => "running",
        RunStatus::Evolved { .. } => "evolved",
        RunStatus::NotEvolved { .. } => "not-evolved",
        RunStatus::Failed { .. } => "failed",
        RunStatus::Cancelled => "cancelled",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ScriptedEvaluator, ScriptedProposer};
    use pevo_types::{Persona, Scenario};

    fn service_with(
        evaluator: ScriptedEvaluator,
        proposer: ScriptedProposer,
        config: EvolutionConfig,
    ) -> (EvolutionService, PersonaId, Vec<ScenarioId>) {
        let personas = Arc::new(PersonaRegistry::new());
        let scenarios = Arc::new(ScenarioRegistry::new());
        let versions = Arc::new(VersionStore::new());

        let persona_id = personas.create(Persona::new("Marcus", "base"));
        let scenario_ids = vec![
            scenarios.create(Scenario::new("Angry", "ctx")),
            scenarios.create(Scenario::new("Evasive", "ctx")),
        ];

        let service = EvolutionService::new(
            personas,
            scenarios,
            versions,
            Arc::new(evaluator),
            Arc::new(proposer),
            config,
        );
        (service, persona_id, scenario_ids)
    }

    #[tokio::test]
    async fn evolved_run_seeds_baseline_and_appends_winner() {
        let evaluator = ScriptedEvaluator::new(6.0).with_score("c0", 7.9);
        let proposer = ScriptedProposer::new(["c0"]);
        let (service, persona_id, scenario_ids) = service_with(
            evaluator,
            proposer,
            EvolutionConfig::new().with_mutation_count(1).with_threshold(8.0),
        );

        let status = service
            .run_to_completion(persona_id, &scenario_ids)
            .await
            .unwrap();

        match status {
            RunStatus::Evolved {
                version,
                baseline_score,
                new_score,
                improvement,
                version_id,
            } => {
                assert_eq!(version, 2); // baseline seeded as version 1
                assert!((baseline_score - 6.0).abs() < 1e-9);
                assert!((new_score - 7.9).abs() < 1e-9);
                assert!((improvement - 1.9).abs() < 1e-9);
                assert_eq!(service.active_version_id(persona_id), Some(version_id));
            }
            other => panic!("expected Evolved, got {other:?}"),
        }

        let listed = service.list_versions(persona_id);
        assert_eq!(listed.len(), 2);
        assert!(listed[1].is_root());
        assert!(listed[1].mutation_attempts.is_empty());
        assert_eq!(listed[0].parent_version_id, Some(listed[1].id));
        assert_eq!(listed[0].baseline_score, Some(6.0));
        assert_eq!(service.get_active_prompt(persona_id).unwrap(), "c0");
    }

    #[tokio::test]
    async fn not_evolved_run_leaves_ledger_untouched() {
        let evaluator = ScriptedEvaluator::new(6.0)
            .with_score("c0", 5.0)
            .with_score("c1", 5.9)
            .with_score("c2", 6.0);
        let proposer = ScriptedProposer::new(["c0", "c1", "c2"]);
        let (service, persona_id, scenario_ids) =
            service_with(evaluator, proposer, EvolutionConfig::new().with_threshold(8.0));

        let status = service
            .run_to_completion(persona_id, &scenario_ids)
            .await
            .unwrap();

        match status {
            RunStatus::NotEvolved { attempts, .. } => assert_eq!(attempts.len(), 3),
            other => panic!("expected NotEvolved, got {other:?}"),
        }
        assert!(service.list_versions(persona_id).is_empty());
        assert_eq!(service.get_active_prompt(persona_id).unwrap(), "base");
    }

    #[tokio::test]
    async fn validation_rejects_bad_arguments() {
        let (service, persona_id, scenario_ids) = service_with(
            ScriptedEvaluator::new(6.0),
            ScriptedProposer::new(["c0"]),
            EvolutionConfig::new(),
        );

        assert!(matches!(
            service.start_run(PersonaId::new(), &scenario_ids),
            Err(EngineError::PersonaNotFound(_))
        ));
        assert!(matches!(
            service.start_run(persona_id, &[]),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            service.start_run(persona_id, &[ScenarioId::new()]),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn second_run_is_rejected_while_first_holds_persona() {
        let evaluator = ScriptedEvaluator::new(6.0).with_score("c0", 7.0);
        let proposer = ScriptedProposer::new(["c0"]);
        let (service, persona_id, scenario_ids) = service_with(
            evaluator,
            proposer,
            EvolutionConfig::new().with_mutation_count(1).with_threshold(8.0),
        );

        let first = service.start_run(persona_id, &scenario_ids).unwrap();
        let second = service.start_run(persona_id, &scenario_ids);
        assert!(matches!(second, Err(EngineError::RunInProgress(_))));

        let status = service.wait(first).await.unwrap();
        assert!(matches!(status, RunStatus::Evolved { .. }));

        // Guard released after the terminal state
        assert!(service.start_run(persona_id, &scenario_ids).is_ok());
    }

    #[tokio::test]
    async fn cancelled_before_dispatch_creates_nothing() {
        let evaluator = ScriptedEvaluator::new(6.0).with_score("c0", 7.9);
        let proposer = ScriptedProposer::new(["c0"]);
        let (service, persona_id, scenario_ids) = service_with(
            evaluator,
            proposer,
            EvolutionConfig::new().with_mutation_count(1).with_threshold(8.0),
        );

        let run_id = service.start_run(persona_id, &scenario_ids).unwrap();
        service.cancel_run(run_id).unwrap();

        let status = service.wait(run_id).await.unwrap();
        // The flag may land before the first dispatch or after the batch
        // already finished; either way no partial state is allowed.
        match status {
            RunStatus::Cancelled => assert!(service.list_versions(persona_id).is_empty()),
            RunStatus::Evolved { .. } => assert_eq!(service.list_versions(persona_id).len(), 2),
            other => panic!("unexpected terminal status {other:?}"),
        }
    }

    #[tokio::test]
    async fn run_status_polls_and_unknown_run_errors() {
        let evaluator = ScriptedEvaluator::new(6.0).with_score("c0", 7.0);
        let proposer = ScriptedProposer::new(["c0"]);
        let (service, persona_id, scenario_ids) = service_with(
            evaluator,
            proposer,
            EvolutionConfig::new().with_mutation_count(1).with_threshold(8.0),
        );

        assert!(matches!(
            service.run_status(RunId::new()),
            Err(EngineError::RunNotFound(_))
        ));

        let run_id = service.start_run(persona_id, &scenario_ids).unwrap();
        let info = service.run_info(run_id).unwrap();
        assert_eq!(info.persona_id, persona_id);

        let status = service.wait(run_id).await.unwrap();
        assert!(status.is_terminal());
        assert!(service.run_status(run_id).unwrap().is_terminal());
    }

    #[tokio::test]
    async fn delete_persona_cascades_and_respects_guard() {
        let evaluator = ScriptedEvaluator::new(6.0).with_score("c0", 7.0);
        let proposer = ScriptedProposer::new(["c0"]);
        let (service, persona_id, scenario_ids) = service_with(
            evaluator,
            proposer,
            EvolutionConfig::new().with_mutation_count(1).with_threshold(8.0),
        );

        let run_id = service.start_run(persona_id, &scenario_ids).unwrap();
        assert!(matches!(
            service.delete_persona(persona_id),
            Err(EngineError::RunInProgress(_))
        ));

        service.wait(run_id).await.unwrap();
        service.delete_persona(persona_id).unwrap();
        assert!(service.list_versions(persona_id).is_empty());
        assert!(matches!(
            service.get_active_prompt(persona_id),
            Err(EngineError::PersonaNotFound(_))
        ));
    }
}
