//! The simplex tableau.
//!
//! Every stored row has a defining (basic) variable that appears in no other
//! row and not in the objective. Inserting a constraint substitutes the
//! existing definitions into it, solves it for a subject and then substitutes
//! the new definition everywhere else. [`Tableau::minimize`] first repairs
//! restricted rows with negative constants, then pivots until the objective
//! has no improving variable.
//!
//! Each inserted row carries a dummy marker variable pinned at zero. Removing
//! the constraint solves the marker back into the basis and drops its row,
//! which takes the equation out of every row it was substituted into.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::config::SolverConfig;
use crate::goal::StrengthVector;
use crate::metrics::{Metrics, MetricsSink};
use crate::objective::{Goal, Objective};
use crate::row::Row;
use crate::sparse::UsageTracker;
use crate::variable::{Strength, Variable, VariableKind, VariableRegistry};
use crate::{SolverError, EPSILON};

/// Identity of a stored row. Ids are never reused within a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(usize);

impl RowId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Lifecycle of a tableau between resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableauState {
    /// Nothing allocated since the last reset.
    Empty,
    /// Variables or rows changed since the last successful pass.
    Building,
    /// The last `minimize` reached the optimum.
    Solved,
    /// Values have been read from the solved tableau.
    Consumed,
}

/// Outcome of a successful `minimize` pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SolveReport {
    pub pivots: usize,
    pub iterations: usize,
}

/// Usage counts per variable id, plus store growth events.
#[derive(Debug, Default)]
struct Ledger {
    counts: Vec<u32>,
    growth: usize,
}

impl Ledger {
    fn count(&self, variable: Variable) -> u32 {
        self.counts.get(variable.id()).copied().unwrap_or(0)
    }

    fn reset(&mut self) {
        self.counts.clear();
    }
}

impl UsageTracker for Ledger {
    fn acquire(&mut self, variable: Variable) {
        let id = variable.id();
        if id >= self.counts.len() {
            self.counts.resize(id + 1, 0);
        }
        self.counts[id] += 1;
    }

    fn release(&mut self, variable: Variable) {
        if let Some(count) = self.counts.get_mut(variable.id()) {
            debug_assert!(*count > 0, "usage of {variable} released below zero");
            *count -= 1;
        }
    }

    fn grown(&mut self, _capacity: usize) {
        self.growth += 1;
    }
}

/// Running totals since the last reset.
#[derive(Debug, Default)]
struct Totals {
    constraints: usize,
    errors: usize,
    slack_variables: usize,
    minimize_calls: usize,
    max_rows: usize,
    max_variables: usize,
}

/// Marker of an inserted constraint and the subject it was solved for.
#[derive(Debug, Clone, Copy)]
struct Marker {
    variable: Variable,
    subject: Variable,
}

/// Rows, objective and variables of one layout pass.
pub struct Tableau {
    config: SolverConfig,
    registry: VariableRegistry,
    rows: Vec<Option<Row>>,
    /// Defining variable -> its row.
    basis: HashMap<Variable, RowId>,
    /// Inserted constraint -> its marker.
    markers: HashMap<RowId, Marker>,
    objective: Objective,
    ledger: Ledger,
    totals: Totals,
    state: TableauState,
    metrics: Metrics,
    sink: Option<Box<dyn MetricsSink>>,
}

impl fmt::Debug for Tableau {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tableau")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("variables", &self.registry.len())
            .field("rows", &self.row_count())
            .field("objective", &self.objective.kind())
            .finish_non_exhaustive()
    }
}

impl Default for Tableau {
    fn default() -> Self {
        Self::new()
    }
}

impl Tableau {
    /// Create an empty tableau with the default configuration.
    pub fn new() -> Self {
        Self::with_config(SolverConfig::default())
    }

    pub fn with_config(config: SolverConfig) -> Self {
        Self {
            objective: Objective::new(config.objective),
            config,
            registry: VariableRegistry::new(),
            rows: Vec::new(),
            basis: HashMap::new(),
            markers: HashMap::new(),
            ledger: Ledger::default(),
            totals: Totals::default(),
            state: TableauState::Empty,
            metrics: Metrics::default(),
            sink: None,
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn state(&self) -> TableauState {
        self.state
    }

    pub fn registry(&self) -> &VariableRegistry {
        &self.registry
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    /// Number of stored rows.
    pub fn row_count(&self) -> usize {
        self.rows.iter().flatten().count()
    }

    pub fn row(&self, id: RowId) -> Option<&Row> {
        self.rows.get(id.0).and_then(Option::as_ref)
    }

    /// Row defining `variable`, if it is basic.
    pub fn row_of(&self, variable: Variable) -> Option<RowId> {
        self.basis.get(&variable).copied()
    }

    /// Rows referencing `variable`, counting the row it defines.
    pub fn usage_count(&self, variable: Variable) -> u32 {
        self.ledger.count(variable)
    }

    /// Statistics of the last `minimize` pass.
    pub fn last_metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Receive a [`Metrics`] snapshot after every `minimize`.
    pub fn attach_metrics_sink(&mut self, sink: impl MetricsSink + 'static) {
        self.sink = Some(Box::new(sink));
    }

    pub fn detach_metrics_sink(&mut self) {
        self.sink = None;
    }

    /// Discard every row and variable. Handles issued before the reset are
    /// rejected afterwards.
    pub fn reset(&mut self) {
        self.registry.reset();
        self.rows.clear();
        self.basis.clear();
        self.markers.clear();
        self.objective.clear();
        self.ledger.reset();
        self.totals = Totals::default();
        self.state = TableauState::Empty;
    }

    /// Issue a fresh variable. Error variables join the objective at their
    /// strength right away.
    pub fn allocate_variable(&mut self, kind: VariableKind, strength: Strength) -> Variable {
        let variable = self.registry.allocate(kind, strength);
        match kind {
            VariableKind::Error => {
                self.objective.add_error(variable, strength);
                self.totals.errors += 1;
            }
            VariableKind::Slack => self.totals.slack_variables += 1,
            VariableKind::Unrestricted | VariableKind::Dummy => {}
        }
        self.touch();
        variable
    }

    /// Minimize `variable` at its own strength.
    pub fn add_objective(&mut self, variable: Variable) -> Result<(), SolverError> {
        let strength = self.registry.check(variable)?.strength;
        self.objective.add_error(variable, strength);
        if let Some(row) = self.basis.get(&variable).and_then(|id| self.rows[id.0].as_ref()) {
            self.objective.update_from_row(row);
        }
        self.touch();
        Ok(())
    }

    /// Insert `defining = constant + Σ coefficient·variable`, or
    /// `0 = constant + Σ ...` when `defining` is `None`.
    ///
    /// Returns the id of the stored row, or `None` when the equation is
    /// already implied by the tableau.
    pub fn add_constraint(
        &mut self,
        defining: Option<Variable>,
        coefficients: &[(Variable, f64)],
        constant: f64,
    ) -> Result<Option<RowId>, SolverError> {
        if let Some(variable) = defining {
            self.registry.check(variable)?;
        }
        for &(variable, _) in coefficients {
            self.registry.check(variable)?;
        }
        self.touch();

        let mut row = Row::with_constant(constant);
        for &(variable, coefficient) in coefficients {
            row.add_variable(variable, coefficient, &mut ());
        }
        if let Some(variable) = defining {
            row.add_variable(variable, -1.0, &mut ());
        }

        let definitions: Vec<RowId> = row
            .entries()
            .iter()
            .filter_map(|(variable, _)| self.basis.get(&variable).copied())
            .collect();
        for id in definitions {
            if let Some(definition) = self.rows[id.0].as_ref() {
                row.substitute(definition, &mut ());
            }
        }

        // Markers of earlier rows are pinned at zero, so they do not count.
        if row.entries().iter().all(|(variable, _)| self.registry.is_dummy(variable)) {
            if row.constant().abs() < EPSILON {
                trace!("redundant constraint");
                self.totals.constraints += 1;
                return Ok(None);
            }
            warn!(residual = row.constant(), "contradictory constraint");
            return Err(SolverError::Infeasible {
                residual: row.constant(),
            });
        }

        row.ensure_positive_constant();
        let subject = defining
            .filter(|variable| row.contains(*variable) && !self.basis.contains_key(variable))
            .or_else(|| row.choose_subject(&self.registry, |v| self.ledger.count(v)));
        let subject = match subject {
            Some(subject) => subject,
            None => {
                // Only restricted variables with positive coefficients remain.
                if row.constant() > EPSILON {
                    warn!(residual = row.constant(), "constraint cannot be satisfied");
                    return Err(SolverError::Infeasible {
                        residual: row.constant(),
                    });
                }
                let first = row
                    .entries()
                    .iter()
                    .map(|(variable, _)| variable)
                    .find(|variable| !self.registry.is_dummy(*variable));
                match first {
                    Some(first) => first,
                    None => return Ok(None),
                }
            }
        };

        let marker = self.registry.allocate(VariableKind::Dummy, Strength::NONE);
        row.add_variable(marker, 1.0, &mut ());
        row.pivot(subject, &mut ());
        for (variable, _) in row.entries().iter() {
            self.ledger.acquire(variable);
        }
        self.ledger.acquire(subject);

        let id = RowId(self.rows.len());
        for other in self.rows.iter_mut().flatten() {
            other.substitute(&row, &mut self.ledger);
        }
        self.objective.update_from_row(&row);
        trace!(row = %id, equation = %row, "constraint added");

        self.basis.insert(subject, id);
        self.markers.insert(
            id,
            Marker {
                variable: marker,
                subject,
            },
        );
        self.rows.push(Some(row));
        self.totals.constraints += 1;
        self.track_size();
        Ok(Some(id))
    }

    /// Undo the constraint stored as `id`.
    ///
    /// Its marker is solved into the basis, which re-expresses every row
    /// that absorbed the constraint, and the marker's row is dropped. When
    /// nothing pivoted since the insertion this restores the previous rows
    /// exactly.
    pub fn remove_constraint(&mut self, id: RowId) -> Result<(), SolverError> {
        let marker = self
            .markers
            .remove(&id)
            .ok_or(SolverError::UnknownRow { row: id.0 })?;
        self.touch();

        let basic = self.basis.get(&marker.variable).copied();
        let leaving = match basic {
            Some(leaving) => Some(leaving),
            None => {
                let leaving = self.marker_row(id, marker);
                if let Some(leaving) = leaving {
                    self.pivot_row(leaving, marker.variable);
                }
                leaving
            }
        };
        let Some(leaving) = leaving else {
            trace!(row = %id, "marker already eliminated");
            return Ok(());
        };

        self.basis.remove(&marker.variable);
        if let Some(mut row) = self.rows[leaving.0].take() {
            row.clear(&mut self.ledger);
        }
        trace!(row = %id, dropped = %leaving, "constraint removed");
        Ok(())
    }

    /// Run one pass: repair feasibility, then pivot to the optimum.
    pub fn minimize(&mut self) -> Result<SolveReport, SolverError> {
        let started = Instant::now();
        let growth = self.ledger.growth;
        let limit = self.config.iteration_limit(self.registry.len());
        let mut report = SolveReport::default();

        let outcome = self.restore_feasibility(limit, &mut report);
        let feasibility_pivots = report.pivots;
        let outcome = outcome.and_then(|()| self.optimize(limit, &mut report));

        self.totals.minimize_calls += 1;
        self.track_size();
        self.metrics = Metrics {
            rows: self.row_count(),
            variables: self.registry.len(),
            constraints: self.totals.constraints,
            errors: self.totals.errors,
            slack_variables: self.totals.slack_variables,
            feasibility_pivots,
            optimize_pivots: report.pivots - feasibility_pivots,
            iterations: report.iterations,
            minimize_calls: self.totals.minimize_calls,
            max_rows: self.totals.max_rows,
            max_variables: self.totals.max_variables,
            table_growth: self.ledger.growth - growth,
            duration: started.elapsed(),
        };
        if let Some(sink) = self.sink.as_mut() {
            sink.record(&self.metrics);
        }

        match outcome {
            Ok(()) => {
                self.state = TableauState::Solved;
                debug!(
                    rows = self.metrics.rows,
                    variables = self.metrics.variables,
                    pivots = report.pivots,
                    iterations = report.iterations,
                    "minimize"
                );
                Ok(report)
            }
            Err(error) => {
                self.state = TableauState::Building;
                warn!(%error, pivots = report.pivots, "minimize failed");
                Err(error)
            }
        }
    }

    /// Current value of `variable`: its row constant when basic, else 0.
    pub fn read_value(&mut self, variable: Variable) -> Result<f64, SolverError> {
        self.registry.check(variable)?;
        if self.state == TableauState::Solved {
            self.state = TableauState::Consumed;
        }
        Ok(self.value_of(variable))
    }

    fn value_of(&self, variable: Variable) -> f64 {
        self.basis
            .get(&variable)
            .and_then(|id| self.rows[id.0].as_ref())
            .map_or(0.0, Row::constant)
    }

    fn touch(&mut self) {
        self.state = TableauState::Building;
    }

    fn track_size(&mut self) {
        self.totals.max_rows = self.totals.max_rows.max(self.row_count());
        self.totals.max_variables = self.totals.max_variables.max(self.registry.len());
    }

    fn restore_feasibility(
        &mut self,
        limit: usize,
        report: &mut SolveReport,
    ) -> Result<(), SolverError> {
        while let Some(id) = self.infeasible_row() {
            report.iterations += 1;
            let Some(entering) = self.feasibility_entering(id) else {
                let residual = self.rows[id.0].as_ref().map_or(0.0, Row::constant);
                return Err(SolverError::Infeasible { residual });
            };
            Self::check_limit(report, limit)?;
            self.pivot_row(id, entering);
            report.pivots += 1;
        }
        Ok(())
    }

    fn optimize(&mut self, limit: usize, report: &mut SolveReport) -> Result<(), SolverError> {
        let mut avoid = HashSet::new();
        loop {
            let candidate = self.objective.pivot_candidate(&avoid);
            if let Some(dummy) = candidate.filter(|v| self.registry.is_dummy(*v)) {
                avoid.insert(dummy);
                continue;
            }
            report.iterations += 1;
            let Some(entering) = candidate else {
                return Ok(());
            };
            avoid.insert(entering);
            let Some(id) = self.leaving_row(entering) else {
                return Err(SolverError::Unbounded {
                    variable: entering.id(),
                });
            };
            Self::check_limit(report, limit)?;
            self.pivot_row(id, entering);
            report.pivots += 1;
        }
    }

    fn check_limit(report: &SolveReport, limit: usize) -> Result<(), SolverError> {
        if report.pivots >= limit {
            return Err(SolverError::IterationLimitExceeded { limit });
        }
        Ok(())
    }

    /// First row whose restricted defining variable has a negative value.
    fn infeasible_row(&self) -> Option<RowId> {
        self.rows.iter().enumerate().find_map(|(index, slot)| {
            let row = slot.as_ref()?;
            let variable = row.variable()?;
            (self.registry.is_restricted(variable) && row.constant() < -EPSILON)
                .then_some(RowId(index))
        })
    }

    /// Column with a positive coefficient whose objective weight per unit of
    /// coefficient is smallest.
    fn feasibility_entering(&self, id: RowId) -> Option<Variable> {
        let row = self.rows[id.0].as_ref()?;
        let mut best: Option<(Variable, StrengthVector)> = None;
        for (variable, coefficient) in row.entries().iter() {
            if coefficient <= 0.0 || self.registry.is_dummy(variable) {
                continue;
            }
            let ratio = self.objective.contribution(variable).divided(coefficient);
            if best.map_or(true, |(_, current)| ratio.is_smaller_than(&current)) {
                best = Some((variable, ratio));
            }
        }
        best.map(|(variable, _)| variable)
    }

    /// Ratio test: the restricted row that limits `entering` first. Ties go
    /// to the lowest row id.
    fn leaving_row(&self, entering: Variable) -> Option<RowId> {
        let mut best: Option<(RowId, f64)> = None;
        for (index, slot) in self.rows.iter().enumerate() {
            let Some(row) = slot else {
                continue;
            };
            let Some(variable) = row.variable() else {
                continue;
            };
            if !self.registry.is_restricted(variable) {
                continue;
            }
            let coefficient = row.coefficient(entering);
            if coefficient >= 0.0 {
                continue;
            }
            let ratio = row.constant().max(0.0) / -coefficient;
            if best.map_or(true, |(_, current)| ratio < current) {
                best = Some((RowId(index), ratio));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Row to solve for a non-basic `marker`.
    ///
    /// The row the constraint was inserted as wins while it still has its
    /// original subject. Otherwise restricted rows go first, the one the
    /// marker limits soonest, then any row holding the marker.
    fn marker_row(&self, id: RowId, marker: Marker) -> Option<RowId> {
        if let Some(row) = self.row(id) {
            if row.variable() == Some(marker.subject) && row.contains(marker.variable) {
                return Some(id);
            }
        }

        let mut negative: Option<(RowId, f64)> = None;
        let mut positive: Option<(RowId, f64)> = None;
        let mut unrestricted: Option<RowId> = None;
        for (index, slot) in self.rows.iter().enumerate() {
            let Some(row) = slot else {
                continue;
            };
            let coefficient = row.coefficient(marker.variable);
            if coefficient == 0.0 {
                continue;
            }
            let restricted = row
                .variable()
                .map_or(false, |variable| self.registry.is_restricted(variable));
            if !restricted {
                unrestricted = unrestricted.or(Some(RowId(index)));
                continue;
            }
            let (best, ratio) = if coefficient < 0.0 {
                (&mut negative, -row.constant() / coefficient)
            } else {
                (&mut positive, row.constant() / coefficient)
            };
            if best.map_or(true, |(_, current)| ratio < current) {
                *best = Some((RowId(index), ratio));
            }
        }
        negative.or(positive).map(|(id, _)| id).or(unrestricted)
    }

    fn pivot_row(&mut self, id: RowId, entering: Variable) {
        let Some(mut row) = self.rows[id.0].take() else {
            return;
        };
        let leaving = row.variable();
        row.pivot(entering, &mut self.ledger);
        if let Some(variable) = leaving {
            self.basis.remove(&variable);
        }
        self.basis.insert(entering, id);

        for other in self.rows.iter_mut().flatten() {
            other.substitute(&row, &mut self.ledger);
        }
        self.objective.update_from_row(&row);
        trace!(row = %id, %entering, leaving = ?leaving, "pivot");
        self.rows[id.0] = Some(row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ObjectiveKind;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn unrestricted(tableau: &mut Tableau) -> Variable {
        tableau.allocate_variable(VariableKind::Unrestricted, Strength::NONE)
    }

    fn slack(tableau: &mut Tableau) -> Variable {
        tableau.allocate_variable(VariableKind::Slack, Strength::NONE)
    }

    #[test]
    fn test_single_pivot_solve() {
        // X - Y = 10, Y >= 0, minimize X
        let mut tableau = Tableau::new();
        let x = unrestricted(&mut tableau);
        let y = slack(&mut tableau);
        tableau.add_objective(x).unwrap();
        let id = tableau.add_constraint(Some(y), &[(x, 1.0)], -10.0).unwrap();
        assert_eq!(tableau.row_of(y), id);

        let report = tableau.minimize().unwrap();
        assert_eq!(report.pivots, 1);
        assert_eq!(tableau.state(), TableauState::Solved);
        assert_eq!(tableau.read_value(x).unwrap(), 10.0);
        assert_eq!(tableau.read_value(y).unwrap(), 0.0);
        assert_eq!(tableau.state(), TableauState::Consumed);
    }

    #[test]
    fn test_minimize_is_idempotent() {
        let mut tableau = Tableau::new();
        let x = unrestricted(&mut tableau);
        let y = slack(&mut tableau);
        tableau.add_objective(x).unwrap();
        tableau.add_constraint(Some(y), &[(x, 1.0)], -10.0).unwrap();
        tableau.minimize().unwrap();

        let again = tableau.minimize().unwrap();
        assert_eq!(again.pivots, 0);
        assert_eq!(tableau.read_value(x).unwrap(), 10.0);
    }

    #[test]
    fn test_unbounded_free_variable() {
        let mut tableau = Tableau::new();
        let e = unrestricted(&mut tableau);
        let f = slack(&mut tableau);
        tableau.add_objective(e).unwrap();
        // e = 3 - f: decreasing e forever only needs f to grow
        tableau.add_constraint(Some(e), &[(f, -1.0)], 3.0).unwrap();

        assert_eq!(
            tableau.minimize(),
            Err(SolverError::Unbounded { variable: f.id() })
        );
        assert_eq!(tableau.state(), TableauState::Building);
    }

    #[test]
    fn test_contradictory_equalities() {
        let mut tableau = Tableau::new();
        let x = unrestricted(&mut tableau);
        tableau.add_constraint(Some(x), &[], 10.0).unwrap();
        assert_eq!(tableau.add_constraint(Some(x), &[], 10.0), Ok(None));
        assert_eq!(
            tableau.add_constraint(Some(x), &[], 20.0),
            Err(SolverError::Infeasible { residual: 10.0 })
        );
        assert_eq!(tableau.row_count(), 1);
    }

    #[test]
    fn test_positive_restricted_row_is_infeasible() {
        let mut tableau = Tableau::new();
        let s = slack(&mut tableau);
        // 0 = 5 + s has no solution with s >= 0
        assert_eq!(
            tableau.add_constraint(None, &[(s, 1.0)], 5.0),
            Err(SolverError::Infeasible { residual: 5.0 })
        );
        // 0 = 0 + s pins s to zero
        let id = tableau.add_constraint(None, &[(s, 1.0)], 0.0).unwrap();
        assert_eq!(id.map(|id| tableau.row_of(s) == Some(id)), Some(true));
    }

    #[test]
    fn test_stale_handles_rejected_after_reset() {
        let mut tableau = Tableau::new();
        let x = unrestricted(&mut tableau);
        tableau.add_constraint(Some(x), &[], 1.0).unwrap();
        tableau.reset();
        assert_eq!(tableau.state(), TableauState::Empty);
        assert_eq!(tableau.row_count(), 0);

        let error = tableau.add_constraint(Some(x), &[], 1.0).unwrap_err();
        assert!(matches!(
            error,
            SolverError::InvalidConstraint {
                generation: 0,
                current: 1,
                ..
            }
        ));
        assert!(tableau.read_value(x).is_err());
        assert!(tableau.add_objective(x).is_err());
    }

    #[test]
    fn test_remove_constraint_restores_usage() {
        let mut tableau = Tableau::new();
        let x = unrestricted(&mut tableau);
        let y = unrestricted(&mut tableau);
        tableau.add_constraint(Some(x), &[], 4.0).unwrap();

        let a = unrestricted(&mut tableau);
        let b = slack(&mut tableau);
        let before: Vec<u32> = [x, y, a, b].iter().map(|v| tableau.usage_count(*v)).collect();

        let id = tableau
            .add_constraint(Some(a), &[(b, 2.0), (y, 1.0)], 1.0)
            .unwrap()
            .unwrap();
        assert_eq!(tableau.usage_count(a), 1);
        assert_eq!(tableau.usage_count(b), 1);

        tableau.remove_constraint(id).unwrap();
        let after: Vec<u32> = [x, y, a, b].iter().map(|v| tableau.usage_count(*v)).collect();
        assert_eq!(before, after);
        assert_eq!(tableau.row_of(a), None);
        assert_eq!(
            tableau.remove_constraint(id),
            Err(SolverError::UnknownRow { row: id.index() })
        );
    }

    #[test]
    fn test_remove_constraint_undoes_substitution() {
        let mut tableau = Tableau::new();
        let x = unrestricted(&mut tableau);
        let a = unrestricted(&mut tableau);
        let b = slack(&mut tableau);
        // x = 4 + a
        let x_row = tableau.add_constraint(Some(x), &[(a, 1.0)], 4.0).unwrap().unwrap();
        let before: Vec<u32> = [x, a, b].iter().map(|v| tableau.usage_count(*v)).collect();

        // a = 1 + 2 b rewrites x's row to x = 5 + 2 b
        let id = tableau.add_constraint(Some(a), &[(b, 2.0)], 1.0).unwrap().unwrap();
        assert!(tableau.row(x_row).unwrap().contains(b));
        assert_eq!(tableau.usage_count(b), 2);

        tableau.remove_constraint(id).unwrap();
        let after: Vec<u32> = [x, a, b].iter().map(|v| tableau.usage_count(*v)).collect();
        assert_eq!(before, after);

        let row = tableau.row(x_row).unwrap();
        assert_eq!(row.variable(), Some(x));
        assert_eq!(row.constant(), 4.0);
        assert_eq!(row.coefficient(a), 1.0);
        assert!(!row.contains(b));
        assert_eq!(tableau.row_count(), 1);
    }

    #[test]
    fn test_removed_inequality_stops_constraining() {
        let mut tableau = Tableau::new();
        let x = unrestricted(&mut tableau);
        let floor = unrestricted(&mut tableau);
        tableau.add_equality_constant(floor, 100.0, Strength::FIXED).unwrap();
        let id = tableau
            .add_greater_than(x, floor, 0.0, Strength::FIXED)
            .unwrap()
            .unwrap();
        tableau.add_equality_constant(x, 50.0, Strength::LOW).unwrap();
        tableau.minimize().unwrap();
        assert_eq!(tableau.read_value(x).unwrap(), 100.0);

        tableau.remove_constraint(id).unwrap();
        assert_eq!(tableau.state(), TableauState::Building);
        tableau.minimize().unwrap();
        assert_eq!(tableau.read_value(x).unwrap(), 50.0);
        assert_eq!(tableau.read_value(floor).unwrap(), 100.0);
    }

    #[test]
    fn test_dummy_never_enters() {
        let mut tableau = Tableau::new();
        let x = unrestricted(&mut tableau);
        tableau.add_objective(x).unwrap();
        // 0 = 10 + x solves to x = -10 - marker, so minimizing x sees the
        // marker as an improving column
        tableau.add_constraint(None, &[(x, 1.0)], 10.0).unwrap();
        let report = tableau.minimize().unwrap();
        assert_eq!(report.pivots, 0);
        assert_eq!(report.iterations, 1);
        assert_eq!(tableau.read_value(x).unwrap(), -10.0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "released below zero")]
    fn test_usage_underflow_is_caught() {
        let mut tableau = Tableau::new();
        let x = unrestricted(&mut tableau);
        let mut ledger = Ledger::default();
        ledger.acquire(x);
        ledger.release(x);
        ledger.release(x);
    }

    #[test]
    fn test_substitution_keeps_basic_variables_out_of_rows() {
        let mut tableau = Tableau::new();
        let x = unrestricted(&mut tableau);
        let y = unrestricted(&mut tableau);
        tableau.add_constraint(Some(x), &[(y, 1.0)], 5.0).unwrap();
        tableau.add_constraint(Some(y), &[], 3.0).unwrap();

        for id in 0..2 {
            let row = tableau.row(RowId(id)).unwrap();
            assert!(!row.contains(x));
            assert!(!row.contains(y));
        }
        tableau.minimize().unwrap();
        assert_eq!(tableau.read_value(x).unwrap(), 8.0);
        assert_eq!(tableau.read_value(y).unwrap(), 3.0);
    }

    #[test]
    fn test_iteration_cap() {
        let mut tableau = Tableau::with_config(SolverConfig {
            iteration_factor: 0,
            iteration_floor: 0,
            ..SolverConfig::default()
        });
        let x = unrestricted(&mut tableau);
        let y = slack(&mut tableau);
        tableau.add_objective(x).unwrap();
        tableau.add_constraint(Some(y), &[(x, 1.0)], -10.0).unwrap();
        assert_eq!(
            tableau.minimize(),
            Err(SolverError::IterationLimitExceeded { limit: 0 })
        );
    }

    #[test]
    fn test_metrics_sink_receives_each_pass() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);

        let mut tableau = Tableau::new();
        tableau.attach_metrics_sink(move |metrics: &Metrics| sink.borrow_mut().push(*metrics));
        let x = unrestricted(&mut tableau);
        let y = slack(&mut tableau);
        tableau.add_objective(x).unwrap();
        tableau.add_constraint(Some(y), &[(x, 1.0)], -10.0).unwrap();
        tableau.minimize().unwrap();
        tableau.minimize().unwrap();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        // x, y and the row's marker
        assert_eq!((seen[0].rows, seen[0].variables, seen[0].pivots()), (1, 3, 1));
        assert_eq!((seen[0].feasibility_pivots, seen[0].optimize_pivots), (1, 0));
        assert_eq!((seen[0].constraints, seen[0].slack_variables, seen[0].errors), (1, 1, 0));
        assert_eq!(seen[1].pivots(), 0);
        assert_eq!(seen[1].minimize_calls, 2);
        assert_eq!(tableau.last_metrics(), &seen[1]);
    }

    #[test]
    fn test_metrics_split_pivots_by_phase() {
        let mut tableau = Tableau::new();
        let x = unrestricted(&mut tableau);
        for (value, strength) in [(10.0, Strength::HIGH), (50.0, Strength::LOW)] {
            let plus = tableau.allocate_variable(VariableKind::Error, strength);
            let minus = tableau.allocate_variable(VariableKind::Error, strength);
            tableau
                .add_constraint(Some(x), &[(plus, 1.0), (minus, -1.0)], value)
                .unwrap();
        }
        tableau.minimize().unwrap();
        assert_eq!(tableau.read_value(x).unwrap(), 10.0);

        let metrics = *tableau.last_metrics();
        assert_eq!((metrics.feasibility_pivots, metrics.optimize_pivots), (0, 1));
        assert_eq!((metrics.constraints, metrics.errors, metrics.slack_variables), (2, 4, 0));
        assert_eq!((metrics.max_rows, metrics.max_variables), (2, 7));
        assert_eq!(metrics.minimize_calls, 1);

        tableau.reset();
        let y = unrestricted(&mut tableau);
        tableau.add_constraint(Some(y), &[], 1.0).unwrap();
        tableau.minimize().unwrap();
        let metrics = tableau.last_metrics();
        assert_eq!((metrics.constraints, metrics.errors, metrics.minimize_calls), (1, 0, 1));
        assert_eq!((metrics.max_rows, metrics.max_variables), (1, 2));
    }

    fn soft_value(first: (f64, Strength), second: (f64, Strength), kind: ObjectiveKind) -> f64 {
        let mut tableau = Tableau::with_config(SolverConfig {
            objective: kind,
            ..SolverConfig::default()
        });
        let x = unrestricted(&mut tableau);
        for (value, strength) in [first, second] {
            let plus = tableau.allocate_variable(VariableKind::Error, strength);
            let minus = tableau.allocate_variable(VariableKind::Error, strength);
            // x = value + plus - minus
            tableau
                .add_constraint(Some(x), &[(plus, 1.0), (minus, -1.0)], value)
                .unwrap();
        }
        tableau.minimize().unwrap();
        tableau.read_value(x).unwrap()
    }

    #[test]
    fn test_strong_preference_wins() {
        for kind in [ObjectiveKind::Priority, ObjectiveKind::Plain] {
            let strong = (10.0, Strength::HIGH);
            let weak = (50.0, Strength::LOW);
            assert_eq!(soft_value(strong, weak, kind), 10.0);
            assert_eq!(soft_value(weak, strong, kind), 10.0);
        }
    }
}
