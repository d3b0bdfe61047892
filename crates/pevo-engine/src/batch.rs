//! Mutation batch evaluation
//!
//! One evolution attempt: score the current prompt as a baseline, propose
//! N candidate mutations, evaluate each across the scenario set, and pick
//! a winner. Scenario evaluations fan out concurrently under a shared
//! permit limit; individual failures degrade a single candidate's score
//! computation instead of aborting the run.

use crate::config::EvolutionConfig;
use crate::error::EvalError;
use crate::traits::{Evaluator, MutationProposer};
use pevo_types::{DimensionScores, Evaluation, MutationAttempt, MutationMetadata, Scenario};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Outcome reason when the baseline already meets the threshold
pub const REASON_ABOVE_THRESHOLD: &str = "Score above threshold";
/// Outcome reason when no candidate beat the baseline
pub const REASON_NO_IMPROVEMENT: &str = "No improvement found in mutations";

/// Cooperative cancellation flag shared between a run and its caller
///
/// Cancelling stops the batch from issuing new evaluations; evaluations
/// already dispatched drain normally.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create an unset flag
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    #[inline]
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation was requested
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Terminal verdict of one mutation batch
#[derive(Debug, Clone)]
pub enum BatchVerdict {
    /// A candidate beat the baseline; the caller should persist it
    Evolved {
        /// Baseline score the winner was compared against
        baseline_score: f64,
        /// Winning candidate's average score
        new_score: f64,
        /// `new_score - baseline_score`
        improvement: f64,
        /// `mutation_index` of the winner
        winner_index: u32,
        /// All scored attempts, exactly one flagged as winner
        attempts: Vec<MutationAttempt>,
    },
    /// No version should be created
    NotEvolved {
        /// Why the run did not evolve
        reason: String,
        /// Baseline score measured (or reused) this run
        baseline_score: f64,
        /// Best candidate score, when candidates were attempted
        best_score: Option<f64>,
        /// Threshold that triggered a skip, when it did
        threshold: Option<f64>,
        /// Scored attempts, retained for inspection only
        attempts: Vec<MutationAttempt>,
    },
    /// Every candidate (or the baseline itself) failed evaluation
    Failed {
        /// What went wrong
        reason: String,
    },
    /// Cancellation observed between dispatches
    Cancelled,
}

/// Runs one evolution attempt end to end
pub struct MutationBatchEvaluator {
    evaluator: Arc<dyn Evaluator>,
    proposer: Arc<dyn MutationProposer>,
    config: EvolutionConfig,
    limiter: Arc<Semaphore>,
}

impl MutationBatchEvaluator {
    /// Create a batch evaluator over the two collaborators
    #[must_use]
    pub fn new(
        evaluator: Arc<dyn Evaluator>,
        proposer: Arc<dyn MutationProposer>,
        config: EvolutionConfig,
    ) -> Self {
        let limiter = Arc::new(Semaphore::new(config.max_concurrent_evals.max(1)));
        Self {
            evaluator,
            proposer,
            config,
            limiter,
        }
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    /// Execute one batch against a non-empty scenario set
    pub async fn execute(
        &self,
        current_prompt: &str,
        scenarios: &[Scenario],
        cancel: &CancelFlag,
    ) -> BatchVerdict {
        debug_assert!(!scenarios.is_empty(), "caller validates the scenario set");

        if cancel.is_cancelled() {
            return BatchVerdict::Cancelled;
        }

        // Step 1: baseline = mean over scenarios of the current prompt
        let baseline_evals = self.score_prompt(current_prompt, scenarios).await;
        if baseline_evals.is_empty() {
            return BatchVerdict::Failed {
                reason: "baseline evaluation failed for every scenario".to_string(),
            };
        }
        let baseline_score = mean_overall(&baseline_evals);
        let feedback: Vec<String> = baseline_evals
            .iter()
            .filter(|e| !e.feedback.is_empty())
            .map(|e| e.feedback.clone())
            .collect();
        tracing::info!(baseline_score, "baseline measured");

        // Step 2: skip entirely when the persona already performs well
        if baseline_score >= self.config.improvement_threshold {
            return BatchVerdict::NotEvolved {
                reason: REASON_ABOVE_THRESHOLD.to_string(),
                baseline_score,
                best_score: None,
                threshold: Some(self.config.improvement_threshold),
                attempts: Vec::new(),
            };
        }

        // Step 3: propose and score candidates
        let scenario_names: Vec<String> = scenarios.iter().map(|s| s.name.clone()).collect();
        let mut attempts: Vec<MutationAttempt> = Vec::new();
        let mut proposal_failures = 0u32;

        for index in 0..self.config.mutation_count {
            if cancel.is_cancelled() {
                return BatchVerdict::Cancelled;
            }

            let proposal = match self.proposer.propose(current_prompt, &feedback).await {
                Ok(p) => p,
                Err(e) => {
                    proposal_failures += 1;
                    tracing::warn!(mutation_index = index, error = %e, "proposal failed");
                    continue;
                }
            };

            if cancel.is_cancelled() {
                return BatchVerdict::Cancelled;
            }

            let evals = self.score_prompt(&proposal.mutated_prompt, scenarios).await;
            if evals.is_empty() {
                tracing::warn!(
                    mutation_index = index,
                    "every evaluation failed, excluding candidate from winner selection"
                );
                continue;
            }

            let avg_score = mean_overall(&evals);
            tracing::info!(mutation_index = index, avg_score, "candidate scored");

            let mut attempt =
                MutationAttempt::new(index, proposal.mutated_prompt, avg_score).with_metadata(
                    MutationMetadata {
                        avg_scores: DimensionScores::mean(evals.iter().map(|e| &e.scores)),
                        overall_avg: avg_score,
                        scenarios_tested: scenario_names.clone(),
                        num_evaluations: evals.len() as u32,
                        feedback_used: feedback.clone(),
                        success_examples: exemplar(&evals, true),
                        failure_examples: exemplar(&evals, false),
                    },
                );
            if let Some(reasoning) = proposal.reasoning_trace {
                attempt = attempt.with_reasoning(reasoning);
            }
            attempts.push(attempt);
        }

        if attempts.is_empty() {
            return BatchVerdict::Failed {
                reason: format!(
                    "no candidate survived evaluation ({proposal_failures} proposal failures)"
                ),
            };
        }

        // Step 4: winner = strictly highest average, first proposed wins ties
        let mut winner_pos = 0;
        for (pos, attempt) in attempts.iter().enumerate().skip(1) {
            if attempt.avg_score > attempts[winner_pos].avg_score {
                winner_pos = pos;
            }
        }
        let best_score = attempts[winner_pos].avg_score;

        // Step 5: reject the batch when nothing beat the baseline
        if best_score <= baseline_score {
            return BatchVerdict::NotEvolved {
                reason: REASON_NO_IMPROVEMENT.to_string(),
                baseline_score,
                best_score: Some(best_score),
                threshold: None,
                attempts,
            };
        }

        // Step 6: accept
        attempts[winner_pos].is_winner = true;
        let winner_index = attempts[winner_pos].mutation_index;
        BatchVerdict::Evolved {
            baseline_score,
            new_score: best_score,
            improvement: best_score - baseline_score,
            winner_index,
            attempts,
        }
    }

    /// Evaluate one prompt against every scenario, concurrently
    ///
    /// Returns the evaluations that succeeded; failures (including
    /// timeouts) are logged and dropped so they degrade the average
    /// rather than abort the batch.
    async fn score_prompt(&self, prompt: &str, scenarios: &[Scenario]) -> Vec<Evaluation> {
        let futures = scenarios.iter().map(|scenario| {
            let evaluator = Arc::clone(&self.evaluator);
            let limiter = Arc::clone(&self.limiter);
            let timeout = self.config.eval_timeout;
            async move {
                let _permit = match limiter.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (scenario.name.clone(), Err(EvalError::Transient(
                        "evaluation limiter closed".to_string(),
                    ))),
                };
                let result = match tokio::time::timeout(
                    timeout,
                    evaluator.evaluate(prompt, scenario),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(EvalError::Timeout(timeout)),
                };
                (scenario.name.clone(), result)
            }
        });

        let mut successes = Vec::with_capacity(scenarios.len());
        for (scenario_name, result) in futures::future::join_all(futures).await {
            match result {
                Ok(evaluation) => successes.push(evaluation),
                Err(e) => {
                    tracing::warn!(scenario = %scenario_name, error = %e, "evaluation failed");
                }
            }
        }
        successes
    }
}

fn mean_overall(evals: &[Evaluation]) -> f64 {
    evals.iter().map(|e| e.overall).sum::<f64>() / evals.len() as f64
}

/// Pick a high-scoring (>= 8) or low-scoring (< 5) conversation as a
/// free-text exemplar for the mutation metadata.
fn exemplar(evals: &[Evaluation], success: bool) -> Option<String> {
    let pick = if success {
        evals
            .iter()
            .max_by(|a, b| a.overall.total_cmp(&b.overall))
            .filter(|e| e.overall >= 8.0)
    } else {
        evals
            .iter()
            .min_by(|a, b| a.overall.total_cmp(&b.overall))
            .filter(|e| e.overall < 5.0)
    };
    pick.map(|e| format!("score {:.1}: {}", e.overall, e.feedback))
}
