//! Sparse coefficient storage for tableau rows.
//!
//! Entries live in parallel slot arrays. Two independent chains run through
//! the slots: a doubly linked list in ascending variable-id order, and an
//! open-hash chain per bucket (`id % width`). Both are plain slot indices,
//! so inserting never allocates unless the arrays are full, and the arrays
//! only ever double.

use std::fmt;

use crate::variable::Variable;
use crate::EPSILON;

const NONE: usize = usize::MAX;

/// Starting number of slots in a store.
pub const INITIAL_CAPACITY: usize = 16;

/// Receives usage bookkeeping from rows.
///
/// The tableau implements this to keep per-variable usage counts; rows that
/// are not part of the tableau pass `()`.
pub trait UsageTracker {
    /// A row started referencing `variable`.
    fn acquire(&mut self, variable: Variable);
    /// A row stopped referencing `variable`.
    fn release(&mut self, variable: Variable);
    /// A store doubled its backing arrays.
    fn grown(&mut self, _capacity: usize) {}
}

impl UsageTracker for () {
    fn acquire(&mut self, _variable: Variable) {}
    fn release(&mut self, _variable: Variable) {}
}

/// Hash-indexed, id-ordered sparse map from variable to coefficient.
#[derive(Debug, Clone)]
pub struct SparseRow {
    variables: Vec<Option<Variable>>,
    values: Vec<f64>,
    previous: Vec<usize>,
    next: Vec<usize>,
    /// Head slot of each hash bucket.
    buckets: Vec<usize>,
    /// Next slot in the same bucket.
    chain: Vec<usize>,
    /// Slots emptied by `remove`, reused before untouched ones.
    free: Vec<usize>,
    /// Slots below this index have been handed out at least once.
    used: usize,
    count: usize,
    head: usize,
    tail: usize,
}

impl Default for SparseRow {
    fn default() -> Self {
        Self::new()
    }
}

impl SparseRow {
    /// Create an empty store with [`INITIAL_CAPACITY`] slots.
    pub fn new() -> Self {
        let capacity = INITIAL_CAPACITY;
        Self {
            variables: vec![None; capacity],
            values: vec![0.0; capacity],
            previous: vec![NONE; capacity],
            next: vec![NONE; capacity],
            buckets: vec![NONE; capacity],
            chain: vec![NONE; capacity],
            free: Vec::new(),
            used: 0,
            count: 0,
            head: NONE,
            tail: NONE,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the store has no entries.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of slots in the backing arrays.
    pub fn capacity(&self) -> usize {
        self.variables.len()
    }

    /// Coefficient of `variable`, or 0 when absent.
    pub fn get(&self, variable: Variable) -> f64 {
        self.slot_of(variable)
            .map(|slot| self.values[slot])
            .unwrap_or(0.0)
    }

    /// Whether `variable` has an entry.
    pub fn contains(&self, variable: Variable) -> bool {
        self.slot_of(variable).is_some()
    }

    /// Variable at ordered position `index`.
    pub fn variable_at(&self, index: usize) -> Option<Variable> {
        self.iter().nth(index).map(|(variable, _)| variable)
    }

    /// Coefficient at ordered position `index`.
    pub fn value_at(&self, index: usize) -> Option<f64> {
        self.iter().nth(index).map(|(_, value)| value)
    }

    /// Entries in ascending variable-id order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            row: self,
            slot: self.head,
        }
    }

    /// Set the coefficient of `variable`. Near-zero values remove the entry.
    pub fn put(&mut self, variable: Variable, value: f64, usage: &mut impl UsageTracker) {
        if value.abs() < EPSILON {
            self.remove(variable, usage);
            return;
        }
        match self.slot_of(variable) {
            Some(slot) => self.values[slot] = value,
            None => self.insert(variable, value, usage),
        }
    }

    /// Accumulate `delta` into the coefficient of `variable`.
    pub fn add(&mut self, variable: Variable, delta: f64, usage: &mut impl UsageTracker) {
        if delta.abs() < EPSILON {
            return;
        }
        match self.slot_of(variable) {
            Some(slot) => {
                let value = self.values[slot] + delta;
                if value.abs() < EPSILON {
                    self.remove(variable, usage);
                } else {
                    self.values[slot] = value;
                }
            }
            None => self.insert(variable, delta, usage),
        }
    }

    /// Remove `variable` and return its coefficient (0 when absent).
    pub fn remove(&mut self, variable: Variable, usage: &mut impl UsageTracker) -> f64 {
        let Some(slot) = self.slot_of(variable) else {
            return 0.0;
        };
        self.unhash(variable, slot);
        self.unlink(slot);
        let value = self.values[slot];
        self.variables[slot] = None;
        self.values[slot] = 0.0;
        self.free.push(slot);
        self.count -= 1;
        usage.release(variable);
        value
    }

    /// Eliminate `variable` using `definition`, its right-hand side.
    ///
    /// Returns the coefficient `variable` had in this store.
    pub fn use_row(
        &mut self,
        variable: Variable,
        definition: &SparseRow,
        usage: &mut impl UsageTracker,
    ) -> f64 {
        let value = self.remove(variable, usage);
        if value == 0.0 {
            return 0.0;
        }
        for (other, coefficient) in definition.iter() {
            self.add(other, coefficient * value, usage);
        }
        value
    }

    /// Negate every coefficient.
    pub fn invert(&mut self) {
        let mut slot = self.head;
        while slot != NONE {
            self.values[slot] = -self.values[slot];
            slot = self.next[slot];
        }
    }

    /// Divide every coefficient by `amount`, pruning entries that decay
    /// below epsilon.
    pub fn divide_by(&mut self, amount: f64, usage: &mut impl UsageTracker) {
        let mut decayed = Vec::new();
        let mut slot = self.head;
        while slot != NONE {
            self.values[slot] /= amount;
            if self.values[slot].abs() < EPSILON {
                decayed.extend(self.variables[slot]);
            }
            slot = self.next[slot];
        }
        for variable in decayed {
            self.remove(variable, usage);
        }
    }

    /// Remove every entry, keeping the current capacity.
    pub fn clear(&mut self, usage: &mut impl UsageTracker) {
        let mut slot = self.head;
        while slot != NONE {
            if let Some(variable) = self.variables[slot] {
                usage.release(variable);
            }
            slot = self.next[slot];
        }
        self.variables.iter_mut().for_each(|v| *v = None);
        self.values.iter_mut().for_each(|v| *v = 0.0);
        self.previous.iter_mut().for_each(|p| *p = NONE);
        self.next.iter_mut().for_each(|n| *n = NONE);
        self.buckets.iter_mut().for_each(|b| *b = NONE);
        self.chain.iter_mut().for_each(|c| *c = NONE);
        self.free.clear();
        self.used = 0;
        self.count = 0;
        self.head = NONE;
        self.tail = NONE;
    }

    fn bucket(&self, variable: Variable) -> usize {
        variable.id() % self.buckets.len()
    }

    fn slot_of(&self, variable: Variable) -> Option<usize> {
        let mut slot = self.buckets[self.bucket(variable)];
        while slot != NONE {
            if self.variables[slot] == Some(variable) {
                return Some(slot);
            }
            slot = self.chain[slot];
        }
        None
    }

    fn id_at(&self, slot: usize) -> usize {
        self.variables[slot].map_or(usize::MAX, Variable::id)
    }

    fn insert(&mut self, variable: Variable, value: f64, usage: &mut impl UsageTracker) {
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                if self.used == self.capacity() {
                    self.grow();
                    usage.grown(self.capacity());
                }
                self.used += 1;
                self.used - 1
            }
        };
        self.variables[slot] = Some(variable);
        self.values[slot] = value;

        let before = self.predecessor(variable.id());
        self.link_after(before, slot);

        let bucket = self.bucket(variable);
        self.chain[slot] = self.buckets[bucket];
        self.buckets[bucket] = slot;

        self.count += 1;
        usage.acquire(variable);
    }

    /// Last slot whose id is below `id`, or NONE when `id` goes first.
    fn predecessor(&self, id: usize) -> usize {
        if self.tail != NONE && self.id_at(self.tail) < id {
            return self.tail;
        }
        let mut before = NONE;
        let mut slot = self.head;
        while slot != NONE && self.id_at(slot) < id {
            before = slot;
            slot = self.next[slot];
        }
        before
    }

    fn link_after(&mut self, before: usize, slot: usize) {
        let after = if before == NONE {
            self.head
        } else {
            self.next[before]
        };
        self.previous[slot] = before;
        self.next[slot] = after;
        if before == NONE {
            self.head = slot;
        } else {
            self.next[before] = slot;
        }
        if after == NONE {
            self.tail = slot;
        } else {
            self.previous[after] = slot;
        }
    }

    fn unlink(&mut self, slot: usize) {
        let (before, after) = (self.previous[slot], self.next[slot]);
        if before == NONE {
            self.head = after;
        } else {
            self.next[before] = after;
        }
        if after == NONE {
            self.tail = before;
        } else {
            self.previous[after] = before;
        }
        self.previous[slot] = NONE;
        self.next[slot] = NONE;
    }

    fn unhash(&mut self, variable: Variable, slot: usize) {
        let bucket = self.bucket(variable);
        if self.buckets[bucket] == slot {
            self.buckets[bucket] = self.chain[slot];
        } else {
            let mut current = self.buckets[bucket];
            while current != NONE {
                if self.chain[current] == slot {
                    self.chain[current] = self.chain[slot];
                    break;
                }
                current = self.chain[current];
            }
        }
        self.chain[slot] = NONE;
    }

    fn grow(&mut self) {
        let capacity = self.capacity() * 2;
        self.variables.resize(capacity, None);
        self.values.resize(capacity, 0.0);
        self.previous.resize(capacity, NONE);
        self.next.resize(capacity, NONE);
        self.chain.resize(capacity, NONE);
        self.rehash(capacity);
    }

    /// Rebuild the bucket chains for a new hash width.
    fn rehash(&mut self, width: usize) {
        self.buckets.clear();
        self.buckets.resize(width, NONE);
        self.chain.iter_mut().for_each(|c| *c = NONE);
        for slot in 0..self.variables.len() {
            if let Some(variable) = self.variables[slot] {
                let bucket = variable.id() % width;
                self.chain[slot] = self.buckets[bucket];
                self.buckets[bucket] = slot;
            }
        }
    }
}

/// Ordered iterator over a [`SparseRow`].
pub struct Iter<'a> {
    row: &'a SparseRow,
    slot: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (Variable, f64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.slot == NONE {
            return None;
        }
        let slot = self.slot;
        self.slot = self.row.next[slot];
        Some((self.row.variables[slot]?, self.row.values[slot]))
    }
}

impl fmt::Display for SparseRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (variable, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, " {} = {}", variable, value)?;
        }
        write!(f, " }}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::{Strength, VariableKind, VariableRegistry};
    use proptest::prelude::*;
    use std::collections::{BTreeMap, HashMap};

    fn vars(n: usize) -> Vec<Variable> {
        let mut registry = VariableRegistry::new();
        (0..n)
            .map(|_| registry.allocate(VariableKind::Unrestricted, Strength::NONE))
            .collect()
    }

    #[derive(Default)]
    struct Counts {
        usage: HashMap<Variable, i32>,
        growth: usize,
    }

    impl UsageTracker for Counts {
        fn acquire(&mut self, variable: Variable) {
            *self.usage.entry(variable).or_default() += 1;
        }
        fn release(&mut self, variable: Variable) {
            *self.usage.entry(variable).or_default() -= 1;
        }
        fn grown(&mut self, _capacity: usize) {
            self.growth += 1;
        }
    }

    fn ids(row: &SparseRow) -> Vec<usize> {
        row.iter().map(|(v, _)| v.id()).collect()
    }

    #[test]
    fn test_put_keeps_ascending_order() {
        let v = vars(8);
        let mut row = SparseRow::new();
        for &i in &[5, 1, 7, 3, 0] {
            row.put(v[i], i as f64 + 1.0, &mut ());
        }
        assert_eq!(ids(&row), vec![0, 1, 3, 5, 7]);
        assert_eq!(row.get(v[3]), 4.0);
        assert_eq!(row.variable_at(2), Some(v[3]));
        assert_eq!(row.value_at(4), Some(8.0));
        assert_eq!(row.variable_at(5), None);
    }

    #[test]
    fn test_put_near_zero_removes() {
        let v = vars(2);
        let mut row = SparseRow::new();
        row.put(v[0], 2.0, &mut ());
        row.put(v[0], EPSILON / 2.0, &mut ());
        assert!(!row.contains(v[0]));
        assert!(row.is_empty());

        row.put(v[1], 1e-9, &mut ());
        assert!(!row.contains(v[1]));
    }

    #[test]
    fn test_add_decays_to_removal() {
        let v = vars(1);
        let mut counts = Counts::default();
        let mut row = SparseRow::new();
        row.add(v[0], 1.5, &mut counts);
        row.add(v[0], -1.5 + EPSILON / 10.0, &mut counts);
        assert!(!row.contains(v[0]));
        assert_eq!(counts.usage[&v[0]], 0);
    }

    #[test]
    fn test_remove_middle_relinks() {
        let v = vars(4);
        let mut row = SparseRow::new();
        for var in &v {
            row.put(*var, 1.0, &mut ());
        }
        assert_eq!(row.remove(v[2], &mut ()), 1.0);
        assert_eq!(row.remove(v[2], &mut ()), 0.0);
        assert_eq!(ids(&row), vec![0, 1, 3]);
        row.remove(v[0], &mut ());
        row.remove(v[3], &mut ());
        assert_eq!(ids(&row), vec![1]);
        row.put(v[0], 2.0, &mut ());
        row.put(v[3], 2.0, &mut ());
        assert_eq!(ids(&row), vec![0, 1, 3]);
    }

    #[test]
    fn test_hash_collisions_resolve() {
        // 1, 17 and 33 share a bucket at width 16.
        let v = vars(34);
        let mut row = SparseRow::new();
        row.put(v[1], 1.0, &mut ());
        row.put(v[17], 17.0, &mut ());
        row.put(v[33], 33.0, &mut ());
        row.remove(v[17], &mut ());
        assert_eq!(row.get(v[1]), 1.0);
        assert_eq!(row.get(v[33]), 33.0);
        assert!(!row.contains(v[17]));
    }

    #[test]
    fn test_growth_past_initial_capacity() {
        let v = vars(20);
        let mut counts = Counts::default();
        let mut row = SparseRow::new();
        assert_eq!(row.capacity(), INITIAL_CAPACITY);
        for (i, var) in v.iter().enumerate().rev() {
            row.put(*var, i as f64 + 1.0, &mut counts);
        }
        assert!(row.capacity() > INITIAL_CAPACITY);
        assert!(counts.growth >= 1);
        assert_eq!(row.len(), 20);
        for (i, var) in v.iter().enumerate() {
            assert_eq!(row.get(*var), i as f64 + 1.0);
        }
        assert_eq!(ids(&row), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_freed_slots_are_reused() {
        let v = vars(40);
        let mut counts = Counts::default();
        let mut row = SparseRow::new();
        for var in &v[..INITIAL_CAPACITY] {
            row.put(*var, 1.0, &mut counts);
        }
        for round in 0..24 {
            let (old, new) = (v[round % INITIAL_CAPACITY], v[INITIAL_CAPACITY + round % 20]);
            row.remove(old, &mut counts);
            row.put(new, 2.0, &mut counts);
            row.remove(new, &mut counts);
            row.put(old, 1.0, &mut counts);
        }
        assert_eq!(row.capacity(), INITIAL_CAPACITY);
        assert_eq!(counts.growth, 0);
        assert_eq!(ids(&row), (0..INITIAL_CAPACITY).collect::<Vec<_>>());
    }

    #[test]
    fn test_use_row_substitutes() {
        let v = vars(3);
        // this: 2*v0 + 1*v1, definition of v0: { v1: -1, v2: 3 }
        let mut row = SparseRow::new();
        row.put(v[0], 2.0, &mut ());
        row.put(v[1], 1.0, &mut ());
        let mut definition = SparseRow::new();
        definition.put(v[1], -1.0, &mut ());
        definition.put(v[2], 3.0, &mut ());

        let factor = row.use_row(v[0], &definition, &mut ());
        assert_eq!(factor, 2.0);
        assert!(!row.contains(v[0]));
        assert_eq!(row.get(v[1]), -1.0);
        assert_eq!(row.get(v[2]), 6.0);
    }

    #[test]
    fn test_invert_and_divide() {
        let v = vars(2);
        let mut counts = Counts::default();
        let mut row = SparseRow::new();
        row.put(v[0], 4.0, &mut counts);
        row.put(v[1], -2e-4, &mut counts);
        row.invert();
        assert_eq!(row.get(v[0]), -4.0);
        row.divide_by(4.0, &mut counts);
        assert_eq!(row.get(v[0]), -1.0);
        assert!(!row.contains(v[1]));
        assert_eq!(counts.usage[&v[1]], 0);
    }

    #[test]
    fn test_clear_releases_everything() {
        let v = vars(3);
        let mut counts = Counts::default();
        let mut row = SparseRow::new();
        for var in &v {
            row.put(*var, 1.0, &mut counts);
        }
        row.clear(&mut counts);
        assert!(row.is_empty());
        assert!(counts.usage.values().all(|&c| c == 0));
        row.put(v[1], 3.0, &mut counts);
        assert_eq!(ids(&row), vec![1]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Put(usize, f64),
        Remove(usize),
        Add(usize, f64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..48usize, -10.0..10.0f64).prop_map(|(i, v)| Op::Put(i, v)),
            (0..48usize).prop_map(Op::Remove),
            (0..48usize, -10.0..10.0f64).prop_map(|(i, v)| Op::Add(i, v)),
        ]
    }

    proptest! {
        #[test]
        fn prop_matches_ordered_model(ops in prop::collection::vec(op(), 0..200)) {
            let v = vars(48);
            let mut counts = Counts::default();
            let mut row = SparseRow::new();
            let mut model: BTreeMap<usize, f64> = BTreeMap::new();

            for op in ops {
                match op {
                    Op::Put(i, value) => {
                        row.put(v[i], value, &mut counts);
                        if value.abs() < EPSILON {
                            model.remove(&i);
                        } else {
                            model.insert(i, value);
                        }
                    }
                    Op::Remove(i) => {
                        let removed = row.remove(v[i], &mut counts);
                        prop_assert_eq!(removed, model.remove(&i).unwrap_or(0.0));
                    }
                    Op::Add(i, delta) => {
                        row.add(v[i], delta, &mut counts);
                        if delta.abs() >= EPSILON {
                            let value = model.get(&i).copied().unwrap_or(0.0) + delta;
                            if value.abs() < EPSILON {
                                model.remove(&i);
                            } else {
                                model.insert(i, value);
                            }
                        }
                    }
                }
            }

            prop_assert_eq!(row.len(), model.len());
            let positional: Vec<usize> = (0..row.len())
                .filter_map(|i| row.variable_at(i))
                .map(Variable::id)
                .collect();
            let expected: Vec<usize> = model.keys().copied().collect();
            prop_assert_eq!(&positional, &expected);
            prop_assert!(positional.windows(2).all(|w| w[0] < w[1]));
            for (i, value) in &model {
                prop_assert_eq!(row.get(v[*i]), *value);
                prop_assert_eq!(counts.usage.get(&v[*i]).copied(), Some(1));
            }
            for (i, var) in v.iter().enumerate() {
                if !model.contains_key(&i) {
                    prop_assert!(!row.contains(*var));
                    prop_assert_eq!(counts.usage.get(var).copied().unwrap_or(0), 0);
                }
            }
        }
    }
}
