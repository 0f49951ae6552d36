//! The two objective flavours behind one interface.

use std::collections::HashSet;

use crate::config::ObjectiveKind;
use crate::goal::{GoalRow, StrengthVector};
use crate::row::Row;
use crate::variable::{Strength, Variable, MAX_STRENGTH};

/// What the tableau needs from an objective.
pub trait Goal {
    /// Start minimizing `variable` at `strength`.
    fn add_error(&mut self, variable: Variable, strength: Strength);
    /// Replace `definition`'s defining variable by its right-hand side.
    fn update_from_row(&mut self, definition: &Row);
    /// Entering variable for the next pivot, `None` once optimal.
    fn pivot_candidate(&self, avoid: &HashSet<Variable>) -> Option<Variable>;
    /// Weight of `variable` in the objective, as a comparable vector.
    fn contribution(&self, variable: Variable) -> StrengthVector;
    fn is_empty(&self) -> bool;
    fn clear(&mut self);
}

/// Scalar weight of a tier in the weighted objective.
pub fn tier_weight(strength: Strength) -> f64 {
    1000f64.powi(strength.tier() as i32)
}

impl Goal for Row {
    fn add_error(&mut self, variable: Variable, strength: Strength) {
        self.put_variable(variable, tier_weight(strength), &mut ());
    }

    fn update_from_row(&mut self, definition: &Row) {
        self.substitute(definition, &mut ());
    }

    fn pivot_candidate(&self, avoid: &HashSet<Variable>) -> Option<Variable> {
        let mut best: Option<(Variable, f64)> = None;
        for (variable, amount) in self.entries().iter() {
            if amount >= 0.0 || avoid.contains(&variable) {
                continue;
            }
            if best.map_or(true, |(_, value)| amount < value) {
                best = Some((variable, amount));
            }
        }
        best.map(|(variable, _)| variable)
    }

    fn contribution(&self, variable: Variable) -> StrengthVector {
        let mut slots = [0.0; MAX_STRENGTH];
        slots[0] = self.coefficient(variable);
        StrengthVector::from_slots(slots)
    }

    fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn clear(&mut self) {
        Row::clear(self, &mut ());
    }
}

impl Goal for GoalRow {
    fn add_error(&mut self, variable: Variable, strength: Strength) {
        GoalRow::add_error(self, variable, strength);
    }

    fn update_from_row(&mut self, definition: &Row) {
        GoalRow::update_from_row(self, definition);
    }

    fn pivot_candidate(&self, avoid: &HashSet<Variable>) -> Option<Variable> {
        GoalRow::pivot_candidate(self, avoid)
    }

    fn contribution(&self, variable: Variable) -> StrengthVector {
        self.vector(variable).unwrap_or(StrengthVector::ZERO)
    }

    fn is_empty(&self) -> bool {
        GoalRow::is_empty(self)
    }

    fn clear(&mut self) {
        GoalRow::clear(self);
    }
}

/// The tableau's objective.
#[derive(Debug, Clone)]
pub enum Objective {
    Plain(Row),
    Priority(GoalRow),
}

impl Objective {
    pub fn new(kind: ObjectiveKind) -> Self {
        match kind {
            ObjectiveKind::Plain => Objective::Plain(Row::new()),
            ObjectiveKind::Priority => Objective::Priority(GoalRow::new()),
        }
    }

    pub fn kind(&self) -> ObjectiveKind {
        match self {
            Objective::Plain(_) => ObjectiveKind::Plain,
            Objective::Priority(_) => ObjectiveKind::Priority,
        }
    }

    fn inner(&self) -> &dyn Goal {
        match self {
            Objective::Plain(row) => row,
            Objective::Priority(goal) => goal,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Goal {
        match self {
            Objective::Plain(row) => row,
            Objective::Priority(goal) => goal,
        }
    }
}

impl Goal for Objective {
    fn add_error(&mut self, variable: Variable, strength: Strength) {
        self.inner_mut().add_error(variable, strength);
    }

    fn update_from_row(&mut self, definition: &Row) {
        self.inner_mut().update_from_row(definition);
    }

    fn pivot_candidate(&self, avoid: &HashSet<Variable>) -> Option<Variable> {
        self.inner().pivot_candidate(avoid)
    }

    fn contribution(&self, variable: Variable) -> StrengthVector {
        self.inner().contribution(variable)
    }

    fn is_empty(&self) -> bool {
        self.inner().is_empty()
    }

    fn clear(&mut self) {
        self.inner_mut().clear();
    }
}
