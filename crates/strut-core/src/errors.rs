//! Error types for the strut engine.

use crate::types::{Edge, WidgetId};
use thiserror::Error;

/// Top-level error type for the strut engine.
#[derive(Debug, Error)]
pub enum StrutError {
    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// Structural failures reported by the tableau.
///
/// Numeric noise never shows up here: it is absorbed by epsilon pruning
/// inside the rows.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    /// The ratio test found no leaving row for a pivot candidate.
    #[error("Objective is unbounded in variable {variable}")]
    Unbounded { variable: usize },

    /// A required equation cannot hold, or the feasibility phase left a
    /// restricted row with a negative value.
    #[error("Constraint system is infeasible (residual {residual})")]
    Infeasible { residual: f64 },

    /// The pivot loop hit its cap before reaching an optimum.
    #[error("Pivot limit of {limit} iterations exceeded")]
    IterationLimitExceeded { limit: usize },

    /// A variable handle from an earlier tableau generation was used.
    #[error("Variable {variable} belongs to generation {generation}, tableau is at {current}")]
    InvalidConstraint {
        variable: usize,
        generation: u32,
        current: u32,
    },

    /// The row id does not name a stored row.
    #[error("Row {row} is not in the tableau")]
    UnknownRow { row: usize },
}

/// Errors while building or solving a widget layout.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("Unknown widget: {id}")]
    UnknownWidget { id: WidgetId },

    #[error("Invalid anchor on {widget} {edge:?}: {reason}")]
    InvalidAnchor {
        widget: WidgetId,
        edge: Edge,
        reason: &'static str,
    },

    #[error("Layout solve failed: {0}")]
    Solver(#[from] SolverError),
}

/// Result type alias for strut operations.
pub type Result<T, E = StrutError> = std::result::Result<T, E>;
