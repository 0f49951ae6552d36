//! Incremental simplex tableau for widget layout.
//!
//! This crate implements:
//! - A generation-checked variable arena
//! - Sparse, id-ordered coefficient rows
//! - A lexicographic goal row that resolves soft constraints by strength
//! - The tableau: constraint insertion, feasibility repair and the pivot loop
//! - Relation builders (equalities, inequalities, centering, proportions)

mod config;
mod goal;
mod metrics;
mod objective;
mod relations;
mod row;
mod sparse;
mod tableau;
mod variable;

pub use config::{ObjectiveKind, SolverConfig};
pub use goal::{GoalRow, StrengthVector};
pub use metrics::{Metrics, MetricsSink};
pub use objective::{tier_weight, Goal, Objective};
pub use row::Row;
pub use sparse::{Iter, SparseRow, UsageTracker, INITIAL_CAPACITY};
pub use tableau::{RowId, SolveReport, Tableau, TableauState};
pub use variable::{Strength, Variable, VariableInfo, VariableKind, VariableRegistry, MAX_STRENGTH};

pub use strut_core::SolverError;

/// Tolerance shared by every row, store and comparison in the solver.
/// Magnitudes below it are treated as zero and never stored.
pub const EPSILON: f64 = 1e-4;
