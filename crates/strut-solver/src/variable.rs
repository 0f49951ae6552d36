//! Variable handles and the registry that issues them.
//!
//! Variables are immutable records. Everything that changes during a solve
//! (usage counts, goal membership) lives in the tableau, keyed by handle.

use std::fmt;

use strut_core::SolverError;

/// Number of priority tiers in a strength vector.
pub const MAX_STRENGTH: usize = 9;

/// Priority tier of a soft constraint. Higher tiers dominate lower ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Strength(u8);

impl Strength {
    pub const NONE: Strength = Strength(0);
    pub const LOW: Strength = Strength(1);
    pub const MEDIUM: Strength = Strength(2);
    pub const HIGH: Strength = Strength(3);
    pub const HIGHEST: Strength = Strength(4);
    pub const EQUALITY: Strength = Strength(5);
    pub const BARRIER: Strength = Strength(6);
    pub const CENTERING: Strength = Strength(7);
    pub const FIXED: Strength = Strength(8);

    /// Create a strength for the given tier, if it is in range.
    pub fn new(tier: usize) -> Option<Self> {
        (tier < MAX_STRENGTH).then_some(Strength(tier as u8))
    }

    /// Index of this tier in a strength vector.
    pub fn tier(self) -> usize {
        self.0 as usize
    }
}

impl Default for Strength {
    fn default() -> Self {
        Strength::NONE
    }
}

/// What values a variable may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VariableKind {
    /// Any sign. Widget edges are unrestricted.
    Unrestricted,
    /// Non-negative, turns an inequality into an equality.
    Slack,
    /// Non-negative, measures how far a soft constraint is violated.
    Error,
    /// Pinned at zero. Marks an inserted row so it can be removed again.
    Dummy,
}

impl VariableKind {
    /// Slack, error and dummy variables are restricted to non-negative values.
    pub fn is_restricted(self) -> bool {
        !matches!(self, VariableKind::Unrestricted)
    }

    /// Dummy variables never enter the basis while solving.
    pub fn is_dummy(self) -> bool {
        matches!(self, VariableKind::Dummy)
    }
}

/// Handle to a variable of one tableau generation.
///
/// Handles order and hash by id first, so ordered containers keep
/// ascending-id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable {
    id: u32,
    generation: u32,
}

impl Variable {
    /// Dense index of the variable inside its generation.
    pub fn id(self) -> usize {
        self.id as usize
    }

    /// Tableau generation that issued this handle.
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.id)
    }
}

/// The immutable record behind a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableInfo {
    pub kind: VariableKind,
    pub strength: Strength,
}

/// Arena of variables. Ids are monotonic within a generation and are only
/// discarded all at once by [`VariableRegistry::reset`].
#[derive(Debug, Clone, Default)]
pub struct VariableRegistry {
    generation: u32,
    records: Vec<VariableInfo>,
}

impl VariableRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh variable.
    pub fn allocate(&mut self, kind: VariableKind, strength: Strength) -> Variable {
        let id = self.records.len() as u32;
        self.records.push(VariableInfo { kind, strength });
        Variable {
            id,
            generation: self.generation,
        }
    }

    /// Record for a handle. Returns `None` for handles of another generation.
    pub fn lookup(&self, variable: Variable) -> Option<&VariableInfo> {
        if variable.generation != self.generation {
            return None;
        }
        self.records.get(variable.id())
    }

    /// Handle for a dense id of the current generation.
    pub fn handle(&self, id: usize) -> Option<Variable> {
        (id < self.records.len()).then_some(Variable {
            id: id as u32,
            generation: self.generation,
        })
    }

    /// Reject handles that this registry did not issue in its current generation.
    pub fn check(&self, variable: Variable) -> Result<&VariableInfo, SolverError> {
        self.lookup(variable)
            .ok_or(SolverError::InvalidConstraint {
                variable: variable.id(),
                generation: variable.generation,
                current: self.generation,
            })
    }

    /// Kind of a variable, defaulting to unrestricted for unknown handles.
    pub fn kind(&self, variable: Variable) -> VariableKind {
        self.lookup(variable)
            .map(|info| info.kind)
            .unwrap_or(VariableKind::Unrestricted)
    }

    /// Whether the variable must stay non-negative.
    pub fn is_restricted(&self, variable: Variable) -> bool {
        self.kind(variable).is_restricted()
    }

    pub fn is_dummy(&self, variable: Variable) -> bool {
        self.kind(variable).is_dummy()
    }

    /// Number of variables issued in this generation.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no variable has been issued in this generation.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Current generation.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Discard every variable. Outstanding handles become invalid.
    pub fn reset(&mut self) {
        self.records.clear();
        self.generation = self.generation.wrapping_add(1);
    }
}
