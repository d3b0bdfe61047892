//! Score types produced by the evaluation collaborator
//!
//! Every score is on the 0..=10 scale used across the system. The
//! evaluation collaborator judges one simulated conversation and returns a
//! per-dimension breakdown plus free-text feedback.

use serde::{Deserialize, Serialize};

/// Per-dimension score means (without the overall aggregate)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DimensionScores {
    /// Did the agent complete the scenario task
    pub task_completion: f64,
    /// How natural the conversation read
    pub naturalness: f64,
    /// Was the scenario goal achieved
    pub goal_achieved: f64,
}

impl DimensionScores {
    /// Create a new breakdown
    #[inline]
    #[must_use]
    pub fn new(task_completion: f64, naturalness: f64, goal_achieved: f64) -> Self {
        Self {
            task_completion,
            naturalness,
            goal_achieved,
        }
    }

    /// Mean of the three dimensions
    #[inline]
    #[must_use]
    pub fn overall(&self) -> f64 {
        (self.task_completion + self.naturalness + self.goal_achieved) / 3.0
    }

    /// Element-wise mean over a set of breakdowns
    ///
    /// Returns the zero breakdown when the input is empty.
    #[must_use]
    pub fn mean<'a>(scores: impl IntoIterator<Item = &'a DimensionScores>) -> Self {
        let mut sum = DimensionScores::default();
        let mut count = 0u32;
        for s in scores {
            sum.task_completion += s.task_completion;
            sum.naturalness += s.naturalness;
            sum.goal_achieved += s.goal_achieved;
            count += 1;
        }
        if count == 0 {
            return sum;
        }
        let n = f64::from(count);
        DimensionScores::new(
            sum.task_completion / n,
            sum.naturalness / n,
            sum.goal_achieved / n,
        )
    }

    /// Check every dimension is within the 0..=10 scale
    #[inline]
    #[must_use]
    pub fn in_range(&self) -> bool {
        [self.task_completion, self.naturalness, self.goal_achieved]
            .iter()
            .all(|v| v.is_finite() && (0.0..=10.0).contains(v))
    }
}

/// One turn of a simulated conversation transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Speaker label (persona or counterpart)
    pub speaker: String,
    /// Utterance text
    pub text: String,
}

impl Turn {
    /// Create a new turn
    #[inline]
    #[must_use]
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
        }
    }
}

/// Full response from one evaluation of a prompt against a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    /// Per-dimension scores
    pub scores: DimensionScores,
    /// Overall score for this conversation
    pub overall: f64,
    /// Evaluator commentary on the conversation
    pub feedback: String,
    /// Transcript of the simulated conversation
    pub transcript: Vec<Turn>,
}

impl Evaluation {
    /// Create an evaluation with the overall score derived from the dimensions
    #[inline]
    #[must_use]
    pub fn new(scores: DimensionScores, feedback: impl Into<String>) -> Self {
        Self {
            overall: scores.overall(),
            scores,
            feedback: feedback.into(),
            transcript: Vec::new(),
        }
    }

    /// With transcript
    #[inline]
    #[must_use]
    pub fn with_transcript(mut self, transcript: Vec<Turn>) -> Self {
        self.transcript = transcript;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overall_is_mean_of_dimensions() {
        let s = DimensionScores::new(6.0, 7.0, 8.0);
        assert!((s.overall() - 7.0).abs() < 1e-9);
    }

    #[test]
    fn mean_over_breakdowns() {
        let a = DimensionScores::new(4.0, 6.0, 8.0);
        let b = DimensionScores::new(6.0, 8.0, 10.0);
        let mean = DimensionScores::mean([&a, &b]);
        assert!((mean.task_completion - 5.0).abs() < 1e-9);
        assert!((mean.naturalness - 7.0).abs() < 1e-9);
        assert!((mean.goal_achieved - 9.0).abs() < 1e-9);
    }

    #[test]
    fn mean_of_empty_is_zero() {
        let mean = DimensionScores::mean(std::iter::empty());
        assert_eq!(mean, DimensionScores::default());
    }

    #[test]
    fn in_range_rejects_out_of_scale() {
        assert!(DimensionScores::new(0.0, 5.0, 10.0).in_range());
        assert!(!DimensionScores::new(-0.1, 5.0, 5.0).in_range());
        assert!(!DimensionScores::new(5.0, 10.1, 5.0).in_range());
        assert!(!DimensionScores::new(f64::NAN, 5.0, 5.0).in_range());
    }

    #[test]
    fn evaluation_derives_overall() {
        let eval = Evaluation::new(DimensionScores::new(7.0, 8.0, 9.0), "solid run");
        assert!((eval.overall - 8.0).abs() < 1e-9);
        assert!(eval.transcript.is_empty());
    }
}
