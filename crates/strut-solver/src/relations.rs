//! Relation builders.
//!
//! Each builder writes one row in zero form and hands it to
//! [`Tableau::add_constraint`]. Strengths below [`Strength::FIXED`] attach
//! error variables at that tier so the relation can give way.

use crate::tableau::{RowId, Tableau};
use crate::variable::{Strength, Variable, VariableKind};
use crate::SolverError;

type Terms = Vec<(Variable, f64)>;

impl Tableau {
    /// `a = b + margin`.
    pub fn add_equality(
        &mut self,
        a: Variable,
        b: Variable,
        margin: f64,
        strength: Strength,
    ) -> Result<Option<RowId>, SolverError> {
        self.check_all(&[a, b])?;
        let mut terms: Terms = vec![(a, -1.0), (b, 1.0)];
        self.push_error_pair(&mut terms, strength);
        self.add_constraint(None, &terms, margin)
    }

    /// `a = value`.
    pub fn add_equality_constant(
        &mut self,
        a: Variable,
        value: f64,
        strength: Strength,
    ) -> Result<Option<RowId>, SolverError> {
        self.check_all(&[a])?;
        let mut terms: Terms = vec![(a, -1.0)];
        self.push_error_pair(&mut terms, strength);
        self.add_constraint(None, &terms, value)
    }

    /// `a >= b + margin`.
    pub fn add_greater_than(
        &mut self,
        a: Variable,
        b: Variable,
        margin: f64,
        strength: Strength,
    ) -> Result<Option<RowId>, SolverError> {
        self.check_all(&[a, b])?;
        let slack = self.allocate_variable(VariableKind::Slack, Strength::NONE);
        let mut terms: Terms = vec![(a, -1.0), (b, 1.0), (slack, 1.0)];
        self.push_error(&mut terms, strength, -1.0);
        self.add_constraint(None, &terms, margin)
    }

    /// `a <= b + margin`.
    pub fn add_lower_than(
        &mut self,
        a: Variable,
        b: Variable,
        margin: f64,
        strength: Strength,
    ) -> Result<Option<RowId>, SolverError> {
        self.check_all(&[a, b])?;
        let slack = self.allocate_variable(VariableKind::Slack, Strength::NONE);
        let mut terms: Terms = vec![(a, -1.0), (b, 1.0), (slack, -1.0)];
        self.push_error(&mut terms, strength, 1.0);
        self.add_constraint(None, &terms, margin)
    }

    /// Place `[begin, end]` between `begin_target` and `end_target`.
    ///
    /// The free space left after the margins is split so the gap before
    /// `begin` is `bias` of the total: `(1 - bias) * before = bias * after`.
    /// A bias of 0 or 1 collapses to a plain equality on one side.
    #[allow(clippy::too_many_arguments)]
    pub fn add_centering(
        &mut self,
        begin: Variable,
        begin_target: Variable,
        begin_margin: f64,
        bias: f64,
        end_target: Variable,
        end: Variable,
        end_margin: f64,
        strength: Strength,
    ) -> Result<Option<RowId>, SolverError> {
        self.check_all(&[begin, begin_target, end_target, end])?;
        if bias <= 0.0 {
            return self.add_equality(begin, begin_target, begin_margin, strength);
        }
        if bias >= 1.0 {
            return self.add_equality(end, end_target, -end_margin, strength);
        }

        let before = 1.0 - bias;
        let mut terms: Terms = vec![
            (begin, before),
            (begin_target, -before),
            (end_target, -bias),
            (end, bias),
        ];
        self.push_error_pair(&mut terms, strength);
        self.add_constraint(None, &terms, bias * end_margin - before * begin_margin)
    }

    /// `a - b = factor * (d - c)`.
    pub fn add_proportion(
        &mut self,
        a: Variable,
        b: Variable,
        c: Variable,
        d: Variable,
        factor: f64,
    ) -> Result<Option<RowId>, SolverError> {
        self.check_all(&[a, b, c, d])?;
        let terms: Terms = vec![(a, -1.0), (b, 1.0), (d, factor), (c, -factor)];
        self.add_constraint(None, &terms, 0.0)
    }

    fn check_all(&self, variables: &[Variable]) -> Result<(), SolverError> {
        for &variable in variables {
            self.registry().check(variable)?;
        }
        Ok(())
    }

    /// One error variable with coefficient `sign`, for relations that are
    /// only violated in one direction.
    fn push_error(&mut self, terms: &mut Terms, strength: Strength, sign: f64) {
        if strength == Strength::FIXED {
            return;
        }
        let error = self.allocate_variable(VariableKind::Error, strength);
        terms.push((error, sign));
    }

    fn push_error_pair(&mut self, terms: &mut Terms, strength: Strength) {
        if strength == Strength::FIXED {
            return;
        }
        let plus = self.allocate_variable(VariableKind::Error, strength);
        let minus = self.allocate_variable(VariableKind::Error, strength);
        terms.push((plus, 1.0));
        terms.push((minus, -1.0));
    }
}
