//! Per-pass solver statistics.

use std::time::Duration;

/// Snapshot taken at the end of every `minimize` pass.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Metrics {
    /// Rows stored in the tableau.
    pub rows: usize,
    /// Variables issued in the current generation, row markers included.
    pub variables: usize,
    /// Constraints inserted since the last reset, redundant ones included.
    pub constraints: usize,
    pub errors: usize,
    pub slack_variables: usize,
    /// Pivots that repaired restricted rows with negative constants.
    pub feasibility_pivots: usize,
    /// Pivots that improved the objective.
    pub optimize_pivots: usize,
    /// Candidate selections, including the final optimality check.
    pub iterations: usize,
    /// `minimize` calls since the last reset.
    pub minimize_calls: usize,
    /// High-water marks since the last reset.
    pub max_rows: usize,
    pub max_variables: usize,
    /// Sparse stores that doubled their capacity during the pass.
    pub table_growth: usize,
    pub duration: Duration,
}

impl Metrics {
    /// Pivots of both phases.
    pub fn pivots(&self) -> usize {
        self.feasibility_pivots + self.optimize_pivots
    }
}

/// Receives a [`Metrics`] snapshot after every pass. Never influences solving.
pub trait MetricsSink {
    fn record(&mut self, metrics: &Metrics);
}

impl<F> MetricsSink for F
where
    F: FnMut(&Metrics),
{
    fn record(&mut self, metrics: &Metrics) {
        self(metrics)
    }
}
