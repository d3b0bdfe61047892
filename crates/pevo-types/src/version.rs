//! Persona version ledger records
//!
//! A `PersonaVersion` is an immutable, numbered snapshot of a persona's
//! prompt plus the fitness score it achieved. Versions form a tree per
//! persona via `parent_version_id`, rooted at version 1. Each accepted
//! evolution run stores the full batch of `MutationAttempt`s it compared,
//! with exactly one attempt flagged as the winner.

use crate::ids::{PersonaId, VersionId};
use crate::score::DimensionScores;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Structured context recorded alongside a mutation attempt
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MutationMetadata {
    /// Per-dimension means across this candidate's evaluations
    pub avg_scores: DimensionScores,
    /// Mean of the per-scenario overall scores
    pub overall_avg: f64,
    /// Names of the scenarios this candidate was tested against
    pub scenarios_tested: Vec<String>,
    /// Number of evaluations behind the averages
    pub num_evaluations: u32,
    /// Evaluator comments that informed the mutation
    pub feedback_used: Vec<String>,
    /// Free-text exemplar of a high-scoring conversation
    pub success_examples: Option<String>,
    /// Free-text exemplar of a low-scoring conversation
    pub failure_examples: Option<String>,
}

/// One candidate prompt proposed and scored during an evolution run
///
/// Owned by exactly one `PersonaVersion`; immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationAttempt {
    /// 0-based position within the run
    pub mutation_index: u32,
    /// Candidate prompt text
    pub mutated_prompt: String,
    /// Trace explaining why this mutation was proposed
    pub reasoning_prompt: Option<String>,
    /// Mean of this candidate's per-scenario overall scores
    pub avg_score: f64,
    /// True for exactly one attempt within an accepted version
    pub is_winner: bool,
    /// Structured evaluation context
    pub metadata: MutationMetadata,
}

impl MutationAttempt {
    /// Create a new attempt (not yet flagged as winner)
    #[inline]
    #[must_use]
    pub fn new(mutation_index: u32, mutated_prompt: impl Into<String>, avg_score: f64) -> Self {
        Self {
            mutation_index,
            mutated_prompt: mutated_prompt.into(),
            reasoning_prompt: None,
            avg_score,
            is_winner: false,
            metadata: MutationMetadata::default(),
        }
    }

    /// With reasoning trace
    #[inline]
    #[must_use]
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning_prompt = Some(reasoning.into());
        self
    }

    /// With metadata
    #[inline]
    #[must_use]
    pub fn with_metadata(mut self, metadata: MutationMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Immutable snapshot of a persona's prompt at one point in its lineage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaVersion {
    /// Store-assigned identifier
    pub id: VersionId,
    /// Owning persona
    pub persona_id: PersonaId,
    /// Positive, strictly increasing per persona; first version is 1
    pub version: u32,
    /// Version this one was derived from; `None` only for version 1
    pub parent_version_id: Option<VersionId>,
    /// Full instruction text this version represents
    pub system_prompt: String,
    /// Overall score achieved by this version's prompt, in 0..=10
    pub fitness_score: f64,
    /// Parent's score frozen when this version's run was launched
    pub baseline_score: Option<f64>,
    /// Attempts compared by the run that produced this version
    ///
    /// Empty for the baseline version; insertion order is attempt index.
    pub mutation_attempts: Vec<MutationAttempt>,
    /// Creation timestamp, set once
    pub created_at: DateTime<Utc>,
}

impl PersonaVersion {
    /// Create the baseline (version 1) record for a persona
    #[must_use]
    pub fn baseline(
        persona_id: PersonaId,
        system_prompt: impl Into<String>,
        fitness_score: f64,
    ) -> Self {
        Self {
            id: VersionId::new(),
            persona_id,
            version: 1,
            parent_version_id: None,
            system_prompt: system_prompt.into(),
            fitness_score,
            baseline_score: None,
            mutation_attempts: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Create a derived version record
    #[must_use]
    pub fn derived(
        persona_id: PersonaId,
        version: u32,
        parent_version_id: VersionId,
        system_prompt: impl Into<String>,
        fitness_score: f64,
    ) -> Self {
        Self {
            id: VersionId::new(),
            persona_id,
            version,
            parent_version_id: Some(parent_version_id),
            system_prompt: system_prompt.into(),
            fitness_score,
            baseline_score: None,
            mutation_attempts: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// With the baseline score frozen at run launch
    #[inline]
    #[must_use]
    pub fn with_baseline_score(mut self, baseline: f64) -> Self {
        self.baseline_score = Some(baseline);
        self
    }

    /// With the run's mutation attempts
    #[inline]
    #[must_use]
    pub fn with_attempts(mut self, attempts: Vec<MutationAttempt>) -> Self {
        self.mutation_attempts = attempts;
        self
    }

    /// Whether this is the root of its persona's lineage
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_version_id.is_none()
    }

    /// The winning attempt of the run that produced this version, if any
    #[inline]
    #[must_use]
    pub fn winner(&self) -> Option<&MutationAttempt> {
        self.mutation_attempts.iter().find(|a| a.is_winner)
    }
}
