//! Solver options.

/// Which objective the tableau minimizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ObjectiveKind {
    /// Weighted sum, tier `k` weighs `1000^k`.
    Plain,
    /// Lexicographic per-tier vectors.
    #[default]
    Priority,
}

/// Options for a [`Tableau`](crate::Tableau).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SolverConfig {
    pub objective: ObjectiveKind,
    /// Pivots allowed per variable in one `minimize` pass.
    pub iteration_factor: usize,
    /// Lower bound on the pivot cap.
    pub iteration_floor: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            objective: ObjectiveKind::Priority,
            iteration_factor: 2,
            iteration_floor: 64,
        }
    }
}

impl SolverConfig {
    /// Pivot cap for a tableau with `variables` variables.
    pub fn iteration_limit(&self, variables: usize) -> usize {
        self.iteration_factor
            .saturating_mul(variables)
            .max(self.iteration_floor)
    }
}
