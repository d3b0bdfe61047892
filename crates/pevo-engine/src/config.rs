//! Evolution run configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for one evolution run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Number of candidate mutations per run
    pub mutation_count: u32,
    /// Absolute score above which evolution is skipped entirely
    pub improvement_threshold: f64,
    /// Cap on concurrently outstanding evaluation calls
    pub max_concurrent_evals: usize,
    /// Deadline for a single evaluation call
    pub eval_timeout: Duration,
}

impl EvolutionConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With candidate count
    #[inline]
    #[must_use]
    pub fn with_mutation_count(mut self, count: u32) -> Self {
        self.mutation_count = count;
        self
    }

    /// With skip threshold
    #[inline]
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.improvement_threshold = threshold;
        self
    }

    /// With evaluation concurrency cap
    #[inline]
    #[must_use]
    pub fn with_max_concurrent_evals(mut self, max: usize) -> Self {
        self.max_concurrent_evals = max.max(1);
        self
    }

    /// With per-evaluation deadline
    #[inline]
    #[must_use]
    pub fn with_eval_timeout(mut self, timeout: Duration) -> Self {
        self.eval_timeout = timeout;
        self
    }
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            mutation_count: 3,
            improvement_threshold: 8.5,
            max_concurrent_evals: 4,
            eval_timeout: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EvolutionConfig::new();
        assert_eq!(config.mutation_count, 3);
        assert!((config.improvement_threshold - 8.5).abs() < 1e-9);
        assert_eq!(config.max_concurrent_evals, 4);
    }

    #[test]
    fn builder() {
        let config = EvolutionConfig::new()
            .with_mutation_count(5)
            .with_threshold(9.0)
            .with_max_concurrent_evals(0)
            .with_eval_timeout(Duration::from_secs(5));

        assert_eq!(config.mutation_count, 5);
        assert_eq!(config.max_concurrent_evals, 1); // floor of one permit
        assert_eq!(config.eval_timeout, Duration::from_secs(5));
    }
}
