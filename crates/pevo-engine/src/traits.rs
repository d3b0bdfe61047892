//! Collaborator seams
//!
//! The engine treats the simulation/evaluation engine and the mutation
//! proposer as opaque async functions behind these traits. Both may be
//! invoked many times per run and may fail or time out; the batch
//! evaluator owns the degradation policy.

use crate::error::EvalError;
use async_trait::async_trait;
use pevo_types::{Evaluation, Scenario};

/// Simulation/evaluation collaborator
///
/// Given a prompt variant and a scenario, simulates a conversation and
/// scores it. Calls against the same candidate are independent reads and
/// may execute concurrently.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Evaluate one prompt variant against one scenario
    async fn evaluate(&self, prompt: &str, scenario: &Scenario) -> Result<Evaluation, EvalError>;
}

/// Candidate prompt returned by the mutation proposer
#[derive(Debug, Clone)]
pub struct Proposal {
    /// The mutated prompt text
    pub mutated_prompt: String,
    /// Trace explaining why this mutation was proposed
    pub reasoning_trace: Option<String>,
}

/// Mutation proposer collaborator
///
/// Given the current prompt and recent evaluator feedback, produces one
/// candidate mutated prompt plus a reasoning trace.
#[async_trait]
pub trait MutationProposer: Send + Sync {
    /// Propose one candidate mutation
    async fn propose(
        &self,
        current_prompt: &str,
        recent_feedback: &[String],
    ) -> Result<Proposal, EvalError>;
}
