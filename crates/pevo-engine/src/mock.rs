//! Simulated collaborators
//!
//! Deterministic stand-ins for the evaluation and proposal collaborators:
//! - `ScriptedEvaluator` / `ScriptedProposer`: exact scores per prompt,
//!   used by tests that assert on outcomes
//! - `SimulatedEvaluator` / `SimulatedProposer`: seeded, reproducible
//!   behavior for the demo driver, where candidate prompts genuinely
//!   improve as guidance accumulates

use crate::error::EvalError;
use crate::traits::{Evaluator, MutationProposer, Proposal};
use async_trait::async_trait;
use pevo_types::{DimensionScores, Evaluation, Scenario, Turn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Guidance lines the simulated proposer can graft onto a prompt
///
/// The simulated evaluator scores a prompt higher for each line present,
/// so evolution cycles show real improvement.
pub const GUIDANCE: [&str; 6] = [
    "Acknowledge the customer's emotional state before redirecting.",
    "Offer a concrete next step instead of an open question.",
    "De-escalate hostility by lowering the stakes of the conversation.",
    "Mirror the customer's vocabulary when summarizing their position.",
    "Close every exchange by confirming a specific commitment.",
    "Adapt tone when the customer shifts from evasive to cooperative.",
];

/// Evaluator returning a fixed overall score per known prompt
#[derive(Debug, Default)]
pub struct ScriptedEvaluator {
    default_score: f64,
    scores: HashMap<String, f64>,
    failures: HashSet<String>,
    scenario_failures: HashSet<(String, String)>,
}

impl ScriptedEvaluator {
    /// Create with a default score for unknown prompts
    #[must_use]
    pub fn new(default_score: f64) -> Self {
        Self {
            default_score,
            ..Self::default()
        }
    }

    /// Score a specific prompt
    #[must_use]
    pub fn with_score(mut self, prompt: impl Into<String>, score: f64) -> Self {
        self.scores.insert(prompt.into(), score);
        self
    }

    /// Fail every evaluation of a prompt
    #[must_use]
    pub fn with_failure(mut self, prompt: impl Into<String>) -> Self {
        self.failures.insert(prompt.into());
        self
    }

    /// Fail evaluations of a prompt against one scenario only
    #[must_use]
    pub fn with_failure_on(
        mut self,
        prompt: impl Into<String>,
        scenario_name: impl Into<String>,
    ) -> Self {
        self.scenario_failures
            .insert((prompt.into(), scenario_name.into()));
        self
    }
}

#[async_trait]
impl Evaluator for ScriptedEvaluator {
    async fn evaluate(&self, prompt: &str, scenario: &Scenario) -> Result<Evaluation, EvalError> {
        if self.failures.contains(prompt)
            || self
                .scenario_failures
                .contains(&(prompt.to_string(), scenario.name.clone()))
        {
            return Err(EvalError::Transient(format!(
                "scripted failure for {} on {}",
                prompt, scenario.name
            )));
        }
        let score = self.scores.get(prompt).copied().unwrap_or(self.default_score);
        Ok(Evaluation::new(
            DimensionScores::new(score, score, score),
            format!("scored {score:.1} against {}", scenario.name),
        ))
    }
}

/// Proposer replaying a fixed candidate list, cycling when exhausted
#[derive(Debug, Default)]
pub struct ScriptedProposer {
    prompts: Vec<String>,
    calls: AtomicUsize,
}

impl ScriptedProposer {
    /// Create from the candidate prompts to replay
    #[must_use]
    pub fn new<I, S>(prompts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prompts: prompts.into_iter().map(Into::into).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Proposer that fails every call
    #[must_use]
    pub fn failing() -> Self {
        Self::default()
    }

    /// Number of proposals requested so far
    #[inline]
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MutationProposer for ScriptedProposer {
    async fn propose(
        &self,
        _current_prompt: &str,
        recent_feedback: &[String],
    ) -> Result<Proposal, EvalError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.prompts.is_empty() {
            return Err(EvalError::Transient("no proposal available".to_string()));
        }
        let prompt = self.prompts[call % self.prompts.len()].clone();
        Ok(Proposal {
            mutated_prompt: prompt,
            reasoning_trace: Some(format!(
                "scripted proposal informed by {} feedback entries",
                recent_feedback.len()
            )),
        })
    }
}

/// Seeded evaluator whose scores rise with the guidance a prompt carries
#[derive(Debug, Clone)]
pub struct SimulatedEvaluator {
    seed: u64,
    base_score: f64,
}

impl SimulatedEvaluator {
    /// Create with a seed for reproducibility
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            base_score: 5.5,
        }
    }

    /// With base score for a guidance-free prompt
    #[inline]
    #[must_use]
    pub fn with_base_score(mut self, base_score: f64) -> Self {
        self.base_score = base_score;
        self
    }
}

#[async_trait]
impl Evaluator for SimulatedEvaluator {
    async fn evaluate(&self, prompt: &str, scenario: &Scenario) -> Result<Evaluation, EvalError> {
        let guidance_count = GUIDANCE.iter().filter(|g| prompt.contains(**g)).count();
        let center = self.base_score + 0.8 * guidance_count as f64;

        let mut hasher = DefaultHasher::new();
        (self.seed, prompt, &scenario.name).hash(&mut hasher);
        let mut rng = StdRng::seed_from_u64(hasher.finish());
        let mut dim = || (center + rng.random_range(-0.4..0.4)).clamp(0.0, 10.0);

        let scores = DimensionScores::new(dim(), dim(), dim());
        let feedback = if scores.overall() < 7.0 {
            let missing = GUIDANCE
                .iter()
                .find(|g| !prompt.contains(**g))
                .unwrap_or(&GUIDANCE[0]);
            format!("Against {}: agent should {}", scenario.name, missing.to_lowercase())
        } else {
            format!("Against {}: handled the conversation well", scenario.name)
        };

        Ok(Evaluation::new(scores, feedback).with_transcript(vec![
            Turn::new("agent", "Hello, this is a simulated exchange."),
            Turn::new("customer", scenario.context.clone()),
        ]))
    }
}

/// Seeded proposer grafting missing guidance lines onto the prompt
#[derive(Debug)]
pub struct SimulatedProposer {
    seed: u64,
    calls: AtomicUsize,
}

impl SimulatedProposer {
    /// Create with a seed for reproducibility
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MutationProposer for SimulatedProposer {
    async fn propose(
        &self,
        current_prompt: &str,
        recent_feedback: &[String],
    ) -> Result<Proposal, EvalError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let missing: Vec<&str> = GUIDANCE
            .iter()
            .copied()
            .filter(|g| !current_prompt.contains(g))
            .collect();

        let (mutated_prompt, added) = if missing.is_empty() {
            (
                format!("{current_prompt}\nStay consistent across contexts."),
                "no guidance left to add",
            )
        } else {
            let line = missing[(self.seed as usize + call) % missing.len()];
            (format!("{current_prompt}\n{line}"), line)
        };

        Ok(Proposal {
            mutated_prompt,
            reasoning_trace: Some(format!(
                "{} feedback entries reviewed; added: {added}",
                recent_feedback.len()
            )),
        })
    }
}
