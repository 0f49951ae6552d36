//! A single tableau equation.
//!
//! A row reads `variable = constant + Σ coefficient·other`. Before a subject
//! is chosen (no defining variable) it reads `0 = constant + Σ ...`.

use std::fmt;

use crate::sparse::{SparseRow, UsageTracker};
use crate::variable::{Variable, VariableRegistry};
use crate::EPSILON;

/// One linear equation of the tableau.
#[derive(Debug, Clone, Default)]
pub struct Row {
    variable: Option<Variable>,
    constant: f64,
    entries: SparseRow,
}

impl Row {
    /// Create an empty row: no defining variable, constant 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty row with the given constant.
    pub fn with_constant(constant: f64) -> Self {
        Self {
            constant,
            ..Self::default()
        }
    }

    /// The defining (basic) variable, if a subject has been chosen.
    pub fn variable(&self) -> Option<Variable> {
        self.variable
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn set_constant(&mut self, constant: f64) {
        self.constant = constant;
    }

    /// The dependency coefficients.
    pub fn entries(&self) -> &SparseRow {
        &self.entries
    }

    /// Coefficient of a dependency, 0 when absent.
    pub fn coefficient(&self, variable: Variable) -> f64 {
        self.entries.get(variable)
    }

    pub fn contains(&self, variable: Variable) -> bool {
        self.entries.contains(variable)
    }

    /// Merge `coefficient` into the entry for `variable`.
    ///
    /// `variable` must not be this row's defining variable.
    pub fn add_variable(
        &mut self,
        variable: Variable,
        coefficient: f64,
        usage: &mut impl UsageTracker,
    ) {
        debug_assert_ne!(Some(variable), self.variable, "row would reference itself");
        self.entries.add(variable, coefficient, usage);
    }

    /// Overwrite the entry for `variable`.
    pub fn put_variable(
        &mut self,
        variable: Variable,
        coefficient: f64,
        usage: &mut impl UsageTracker,
    ) {
        debug_assert_ne!(Some(variable), self.variable, "row would reference itself");
        self.entries.put(variable, coefficient, usage);
    }

    /// Replace `definition`'s defining variable in this row by its
    /// right-hand side. Returns `false` when the variable was not present.
    ///
    /// Afterwards the eliminated variable has no entry at all.
    pub fn substitute(&mut self, definition: &Row, usage: &mut impl UsageTracker) -> bool {
        let Some(variable) = definition.variable else {
            return false;
        };
        let value = self.entries.use_row(variable, &definition.entries, usage);
        if value == 0.0 {
            return false;
        }
        self.constant += definition.constant * value;
        true
    }

    /// Multiply the whole equation by −1.
    pub fn invert(&mut self) {
        self.constant = -self.constant;
        self.entries.invert();
    }

    /// Flip the equation if its constant is negative.
    pub fn ensure_positive_constant(&mut self) {
        if self.constant < 0.0 {
            self.invert();
        }
    }

    /// No entries and a zero constant.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.constant.abs() < EPSILON
    }

    /// Make `entering` the defining variable.
    ///
    /// The previous defining variable moves into the entries with
    /// coefficient −1 and the row is rescaled so `entering` has coefficient 1
    /// on the left-hand side. Returns `false` when `entering` is not in the
    /// row.
    pub fn pivot(&mut self, entering: Variable, usage: &mut impl UsageTracker) -> bool {
        if !self.entries.contains(entering) {
            return false;
        }
        if let Some(leaving) = self.variable.take() {
            self.entries.put(leaving, -1.0, usage);
            usage.release(leaving);
        }
        let amount = -self.entries.remove(entering, usage);
        self.variable = Some(entering);
        usage.acquire(entering);
        if amount != 1.0 {
            self.constant /= amount;
            self.entries.divide_by(amount, usage);
        }
        true
    }

    /// Pick the variable a fresh `0 = c + Σ` row should be solved for.
    ///
    /// Unrestricted variables come first; failing that, a restricted one
    /// with a negative coefficient (which keeps the row feasible when the
    /// constant is non-negative). Within a class, a variable used by at most
    /// one row wins over older ones, then the smallest coefficient. Dummy
    /// variables are never chosen.
    pub fn choose_subject(
        &self,
        registry: &VariableRegistry,
        usage_count: impl Fn(Variable) -> u32,
    ) -> Option<Variable> {
        let mut unrestricted: Option<(Variable, bool, f64)> = None;
        let mut restricted: Option<(Variable, bool, f64)> = None;

        for (variable, amount) in self.entries.iter() {
            if registry.is_dummy(variable) {
                continue;
            }
            let is_new = usage_count(variable) <= 1;
            let slot = if registry.is_restricted(variable) {
                if amount >= 0.0 {
                    continue;
                }
                &mut restricted
            } else {
                &mut unrestricted
            };
            let better = match *slot {
                None => true,
                Some((_, best_new, best_amount)) => {
                    (is_new && !best_new) || (is_new == best_new && amount < best_amount)
                }
            };
            if better {
                *slot = Some((variable, is_new, amount));
            }
        }

        unrestricted.or(restricted).map(|(variable, _, _)| variable)
    }

    /// Restricted variable with the most negative coefficient, skipping
    /// `exclude`.
    pub fn pick_pivot(
        &self,
        registry: &VariableRegistry,
        exclude: Option<Variable>,
    ) -> Option<Variable> {
        let mut best: Option<(Variable, f64)> = None;
        for (variable, amount) in self.entries.iter() {
            if Some(variable) == exclude
                || amount >= 0.0
                || !registry.is_restricted(variable)
                || registry.is_dummy(variable)
            {
                continue;
            }
            if best.map_or(true, |(_, value)| amount < value) {
                best = Some((variable, amount));
            }
        }
        best.map(|(variable, _)| variable)
    }

    /// Release every entry and the defining variable.
    pub fn clear(&mut self, usage: &mut impl UsageTracker) {
        self.entries.clear(usage);
        if let Some(variable) = self.variable.take() {
            usage.release(variable);
        }
        self.constant = 0.0;
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.variable {
            Some(variable) => write!(f, "{} = {}", variable, self.constant)?,
            None => write!(f, "0 = {}", self.constant)?,
        }
        for (variable, coefficient) in self.entries.iter() {
            if coefficient < 0.0 {
                write!(f, " - {} {}", -coefficient, variable)?;
            } else {
                write!(f, " + {} {}", coefficient, variable)?;
            }
        }
        Ok(())
    }
}
