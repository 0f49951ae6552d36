//! Prioritized objective row.
//!
//! Instead of one scalar coefficient per variable, the goal row keeps a
//! vector with one slot per strength tier. Vectors compare
//! lexicographically from the highest tier down, so any improvement at a
//! higher tier outweighs every lower tier.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::row::Row;
use crate::variable::{Strength, Variable, MAX_STRENGTH};
use crate::EPSILON;

/// Per-tier weights of one variable in the objective.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StrengthVector([f64; MAX_STRENGTH]);

impl StrengthVector {
    pub const ZERO: StrengthVector = StrengthVector([0.0; MAX_STRENGTH]);

    /// 1.0 at the given tier, zero elsewhere.
    pub fn unit(strength: Strength) -> Self {
        let mut slots = [0.0; MAX_STRENGTH];
        slots[strength.tier()] = 1.0;
        Self(slots)
    }

    pub fn from_slots(slots: [f64; MAX_STRENGTH]) -> Self {
        let mut vector = Self(slots);
        vector.prune();
        vector
    }

    pub fn slot(&self, tier: usize) -> f64 {
        self.0[tier]
    }

    pub fn slots(&self) -> &[f64; MAX_STRENGTH] {
        &self.0
    }

    /// Every slot is zero.
    pub fn is_null(&self) -> bool {
        self.0.iter().all(|&v| v == 0.0)
    }

    /// The highest nonzero slot is negative.
    pub fn is_negative(&self) -> bool {
        for &value in self.0.iter().rev() {
            if value > 0.0 {
                return false;
            }
            if value < 0.0 {
                return true;
            }
        }
        false
    }

    /// Lexicographic order, highest tier first.
    pub fn lex_cmp(&self, other: &StrengthVector) -> Ordering {
        for tier in (0..MAX_STRENGTH).rev() {
            let (value, compared) = (self.0[tier], other.0[tier]);
            if value == compared {
                continue;
            }
            return if value < compared {
                Ordering::Less
            } else {
                Ordering::Greater
            };
        }
        Ordering::Equal
    }

    /// Strictly smaller in lexicographic order. Equal vectors are not smaller.
    pub fn is_smaller_than(&self, other: &StrengthVector) -> bool {
        self.lex_cmp(other) == Ordering::Less
    }

    /// `self += other * factor`, with slot-wise epsilon pruning.
    pub fn add_scaled(&mut self, other: &StrengthVector, factor: f64) {
        for (slot, value) in self.0.iter_mut().zip(other.0.iter()) {
            *slot += value * factor;
        }
        self.prune();
    }

    /// `self * factor`, with slot-wise epsilon pruning.
    pub fn scaled(&self, factor: f64) -> StrengthVector {
        let mut vector = *self;
        vector.0.iter_mut().for_each(|slot| *slot *= factor);
        vector.prune();
        vector
    }

    /// `self / divisor`, pruned.
    pub fn divided(&self, divisor: f64) -> StrengthVector {
        self.scaled(1.0 / divisor)
    }

    fn prune(&mut self) {
        for slot in self.0.iter_mut() {
            if slot.abs() < EPSILON {
                *slot = 0.0;
            }
        }
    }
}

/// The lexicographic objective: an ascending-id active set of variables,
/// each with a strength vector.
#[derive(Debug, Clone, Default)]
pub struct GoalRow {
    vectors: HashMap<Variable, StrengthVector>,
    active: Vec<Variable>,
}

impl GoalRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of variables contributing to the goal.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// No variable contributes to the goal.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn contains(&self, variable: Variable) -> bool {
        self.vectors.contains_key(&variable)
    }

    pub fn vector(&self, variable: Variable) -> Option<StrengthVector> {
        self.vectors.get(&variable).copied()
    }

    /// Active variables in ascending id order.
    pub fn active(&self) -> &[Variable] {
        &self.active
    }

    /// Start minimizing `variable` at its own tier.
    pub fn add_error(&mut self, variable: Variable, strength: Strength) {
        self.activate(variable, StrengthVector::unit(strength));
    }

    /// Propagate the substitution `definition.variable = definition` through
    /// the goal.
    pub fn update_from_row(&mut self, definition: &Row) {
        let Some(pivoted) = definition.variable() else {
            return;
        };
        let Some(source) = self.vectors.get(&pivoted).copied() else {
            return;
        };

        for (variable, coefficient) in definition.entries().iter() {
            let decayed = match self.vectors.get_mut(&variable) {
                Some(target) => {
                    target.add_scaled(&source, coefficient);
                    target.is_null()
                }
                None => {
                    let vector = source.scaled(coefficient);
                    if !vector.is_null() {
                        self.activate(variable, vector);
                    }
                    false
                }
            };
            if decayed {
                self.deactivate(variable);
            }
        }
        self.deactivate(pivoted);
    }

    /// Variable whose increase improves the goal the most.
    ///
    /// Scans in ascending id order. The first variable with a negative
    /// leading slot is taken, and only a strictly smaller vector replaces it,
    /// so ties go to the lowest id.
    pub fn pivot_candidate(&self, avoid: &HashSet<Variable>) -> Option<Variable> {
        let mut best: Option<(Variable, StrengthVector)> = None;
        for &variable in &self.active {
            if avoid.contains(&variable) {
                continue;
            }
            let Some(vector) = self.vectors.get(&variable) else {
                continue;
            };
            if !vector.is_negative() {
                continue;
            }
            let replace = match &best {
                None => true,
                Some((_, current)) => vector.is_smaller_than(current),
            };
            if replace {
                best = Some((variable, *vector));
            }
        }
        best.map(|(variable, _)| variable)
    }

    pub fn clear(&mut self) {
        self.vectors.clear();
        self.active.clear();
    }

    fn activate(&mut self, variable: Variable, vector: StrengthVector) {
        if self.vectors.insert(variable, vector).is_some() {
            return;
        }
        self.active.push(variable);
        let n = self.active.len();
        if n > 1 && self.active[n - 2] > variable {
            self.active.sort_unstable();
        }
    }

    fn deactivate(&mut self, variable: Variable) {
        if self.vectors.remove(&variable).is_none() {
            return;
        }
        if let Some(index) = self.active.iter().position(|&v| v == variable) {
            self.active.remove(index);
        }
    }
}
