//! Integer variables and their reversible domains.
//!
//! A variable's domain is a finite non-empty set of integers. Two
//! representations sit behind the same mutator interface: a pure interval
//! (`Bounded`, holes never materialized) and a bitset over a contiguous
//! candidate range (`Bitset`, true hole removal and exact size). Small
//! spans get a bitset, large spans an interval; value-list construction
//! punches the holes into a bitset up front.
//!
//! Every mutator either narrows the domain monotonically or fails
//! atomically. Narrowings emit events: `bound` when the variable collapses
//! to a single value, `range` when min or max moves, `domain` on any
//! change.

use crate::error::PropagationResult;
use crate::solver::demon::DemonId;
use crate::solver::engine::{Solver, VarId};
use crate::solver::trail::RevCell;

/// Domains whose span is at most this many values keep a bitset and
/// support interior hole removal; larger domains only track bounds.
const HOLE_LIMIT: i64 = 65_536;

#[derive(Debug)]
pub(crate) enum DomainRepr {
    Bounded,
    Bitset { offset: i64, words: Vec<RevCell<u64>> },
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Presence {
    Always,
    Literal(VarId),
}

#[derive(Debug)]
pub(crate) struct VarState {
    pub name: String,
    pub min: RevCell<i64>,
    pub max: RevCell<i64>,
    pub size: RevCell<u64>,
    pub repr: DomainRepr,
    pub presence: Presence,
    /// Bounds as of the last settled propagation batch.
    pub old_min: i64,
    pub old_max: i64,
    /// Interior values removed since the last settled batch.
    pub holes: Vec<i64>,
    pub touch_stamp: u64,
    pub bound_demons: Vec<DemonId>,
    pub range_demons: Vec<DemonId>,
    pub domain_demons: Vec<DemonId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PresenceState {
    AlwaysPresent,
    Present,
    Absent,
    Unknown,
}

impl Solver {
    // ----- variable factories -----

    /// Creates an integer variable with domain `[min, max]`.
    ///
    /// Panics if `min > max`: an empty initial domain is a modeling bug.
    pub fn make_int_var(&mut self, min: i64, max: i64, name: &str) -> VarId {
        assert!(
            min <= max,
            "empty initial domain [{min}, {max}] for variable {name:?}"
        );
        self.new_var(min, max, name, Presence::Always)
    }

    /// Creates an integer variable whose domain is exactly `values`.
    ///
    /// Panics if `values` is empty.
    pub fn make_int_var_with_values(&mut self, values: &[i64], name: &str) -> VarId {
        assert!(!values.is_empty(), "empty value list for variable {name:?}");
        let mut sorted = values.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        let min = sorted[0];
        let max = *sorted.last().unwrap();
        let v = self.new_var(min, max, name, Presence::Always);
        if sorted.len() as i64 != max - min + 1 {
            assert!(
                self.is_bitset(v),
                "value list for {name:?} spans more than {HOLE_LIMIT} values"
            );
            let mut keep = sorted.iter().peekable();
            let mut removed = 0u64;
            for value in min..=max {
                if keep.peek() == Some(&&value) {
                    keep.next();
                } else {
                    self.clear_bit(v, value);
                    removed += 1;
                }
            }
            let size = self.vars[v.0 as usize].size;
            let new_size = self.trail.get_u64(size) - removed;
            self.trail.set_u64(size, new_size);
        }
        v
    }

    /// Creates a boolean variable with domain `{0, 1}`.
    pub fn make_bool_var(&mut self, name: &str) -> VarId {
        self.make_int_var(0, 1, name)
    }

    /// Creates a variable bound to a single value.
    pub fn make_int_const(&mut self, value: i64) -> VarId {
        self.new_var(value, value, "", Presence::Always)
    }

    /// Creates an optional variable: its presence literal starts unknown,
    /// and domain reasoning is suppressed once the variable becomes absent.
    /// Returns the variable; its literal is available through
    /// [`presence_literal`](Self::presence_literal).
    pub fn make_optional_int_var(&mut self, min: i64, max: i64, name: &str) -> VarId {
        let literal = self.make_bool_var(&format!("{name}_present"));
        assert!(
            min <= max,
            "empty initial domain [{min}, {max}] for variable {name:?}"
        );
        self.new_var(min, max, name, Presence::Literal(literal))
    }

    fn new_var(&mut self, min: i64, max: i64, name: &str, presence: Presence) -> VarId {
        let id = VarId(self.vars.len() as u32);
        let name = if name.is_empty() && self.parameters.name_all_variables {
            format!("var_{}", id.0)
        } else {
            name.to_string()
        };
        let span = (max as i128) - (min as i128) + 1;
        let repr = if span <= HOLE_LIMIT as i128 {
            let word_count = ((span as usize) + 63) / 64;
            let mut words = Vec::with_capacity(word_count);
            for w in 0..word_count {
                let bits_here = (span as usize).saturating_sub(w * 64).min(64);
                let word = if bits_here == 64 {
                    u64::MAX
                } else {
                    (1u64 << bits_here) - 1
                };
                words.push(self.trail.alloc_u64(word));
            }
            DomainRepr::Bitset { offset: min, words }
        } else {
            DomainRepr::Bounded
        };
        let min_cell = self.trail.alloc_i64(min);
        let max_cell = self.trail.alloc_i64(max);
        let size_cell = self.trail.alloc_u64(span.min(u64::MAX as i128) as u64);
        self.vars.push(VarState {
            name,
            min: min_cell,
            max: max_cell,
            size: size_cell,
            repr,
            presence,
            old_min: min,
            old_max: max,
            holes: Vec::new(),
            touch_stamp: 0,
            bound_demons: Vec::new(),
            range_demons: Vec::new(),
            domain_demons: Vec::new(),
        });
        id
    }

    // ----- read side -----

    pub fn min(&self, v: VarId) -> i64 {
        self.trail.get_i64(self.vars[v.0 as usize].min)
    }

    pub fn max(&self, v: VarId) -> i64 {
        self.trail.get_i64(self.vars[v.0 as usize].max)
    }

    /// Exact domain size for bitset domains; the bound span otherwise.
    pub fn size(&self, v: VarId) -> u64 {
        self.trail.get_u64(self.vars[v.0 as usize].size)
    }

    pub fn bound(&self, v: VarId) -> bool {
        self.min(v) == self.max(v)
    }

    /// The value of a bound variable. Calling this on an unbound variable
    /// is a programming bug.
    pub fn value(&self, v: VarId) -> i64 {
        let min = self.min(v);
        assert_eq!(
            min,
            self.max(v),
            "value() called on unbound variable {}",
            self.var_name(v)
        );
        min
    }

    pub fn contains(&self, v: VarId, value: i64) -> bool {
        if value < self.min(v) || value > self.max(v) {
            return false;
        }
        match &self.vars[v.0 as usize].repr {
            DomainRepr::Bounded => true,
            DomainRepr::Bitset { .. } => self.bit_is_set(v, value),
        }
    }

    pub fn var_name(&self, v: VarId) -> String {
        let name = &self.vars[v.0 as usize].name;
        if name.is_empty() {
            format!("{v}")
        } else {
            name.clone()
        }
    }

    /// Lower bound as of the last settled propagation batch. Stable while
    /// a demon runs; lets propagators tell bound tightenings from holes.
    pub fn old_min(&self, v: VarId) -> i64 {
        self.vars[v.0 as usize].old_min
    }

    pub fn old_max(&self, v: VarId) -> i64 {
        self.vars[v.0 as usize].old_max
    }

    /// Interior values removed since the last settled batch.
    pub fn hole_values(&self, v: VarId) -> Vec<i64> {
        self.vars[v.0 as usize].holes.clone()
    }

    /// Iterates the current domain in increasing order.
    pub fn domain_iter(&self, v: VarId) -> DomainIter<'_> {
        DomainIter {
            solver: self,
            var: v,
            next: Some(self.min(v)),
        }
    }

    /// The current domain collected into a vector.
    pub fn domain_values(&self, v: VarId) -> Vec<i64> {
        self.domain_iter(v).collect()
    }

    /// The smallest present value strictly greater than `value`, if any.
    pub fn domain_value_after(&self, v: VarId, value: i64) -> Option<i64> {
        if value >= self.max(v) {
            return None;
        }
        let from = (value + 1).max(self.min(v));
        match &self.vars[v.0 as usize].repr {
            DomainRepr::Bounded => Some(from),
            DomainRepr::Bitset { .. } => Some(self.seek_at_or_after(v, from)),
        }
    }

    // ----- presence -----

    pub fn presence_literal(&self, v: VarId) -> Option<VarId> {
        match self.vars[v.0 as usize].presence {
            Presence::Always => None,
            Presence::Literal(l) => Some(l),
        }
    }

    pub fn is_present(&self, v: VarId) -> bool {
        matches!(
            self.presence_state(v),
            PresenceState::AlwaysPresent | PresenceState::Present
        )
    }

    pub fn is_absent(&self, v: VarId) -> bool {
        self.presence_state(v) == PresenceState::Absent
    }

    fn presence_state(&self, v: VarId) -> PresenceState {
        match self.vars[v.0 as usize].presence {
            Presence::Always => PresenceState::AlwaysPresent,
            Presence::Literal(l) => {
                if !self.bound(l) {
                    PresenceState::Unknown
                } else if self.min(l) == 1 {
                    PresenceState::Present
                } else {
                    PresenceState::Absent
                }
            }
        }
    }

    /// The domain would become empty. For an optional variable whose
    /// presence is still open this forces it absent; otherwise it fails.
    fn domain_wipeout(&mut self, v: VarId) -> PropagationResult {
        match self.presence_state(v) {
            PresenceState::Absent => Ok(()),
            PresenceState::Unknown => {
                let literal = self.presence_literal(v).unwrap();
                self.set_value(literal, 0)
            }
            PresenceState::AlwaysPresent | PresenceState::Present => self.fail(),
        }
    }

    // ----- mutators -----

    pub fn set_min(&mut self, v: VarId, m: i64) -> PropagationResult {
        if self.is_absent(v) {
            return Ok(());
        }
        let cur_min = self.min(v);
        let cur_max = self.max(v);
        if m <= cur_min {
            return Ok(());
        }
        if m > cur_max {
            return self.domain_wipeout(v);
        }
        let new_min = match &self.vars[v.0 as usize].repr {
            DomainRepr::Bounded => m,
            DomainRepr::Bitset { .. } => self.seek_at_or_after(v, m),
        };
        let removed = self.count_in_range(v, cur_min, new_min - 1);
        let state = &self.vars[v.0 as usize];
        let (min_cell, size_cell) = (state.min, state.size);
        self.trail.set_i64(min_cell, new_min);
        let size = self.trail.get_u64(size_cell) - removed;
        self.trail.set_u64(size_cell, size);
        self.emit_var_events(v, true, new_min == cur_max)
    }

    pub fn set_max(&mut self, v: VarId, m: i64) -> PropagationResult {
        if self.is_absent(v) {
            return Ok(());
        }
        let cur_min = self.min(v);
        let cur_max = self.max(v);
        if m >= cur_max {
            return Ok(());
        }
        if m < cur_min {
            return self.domain_wipeout(v);
        }
        let new_max = match &self.vars[v.0 as usize].repr {
            DomainRepr::Bounded => m,
            DomainRepr::Bitset { .. } => self.seek_at_or_before(v, m),
        };
        let removed = self.count_in_range(v, new_max + 1, cur_max);
        let state = &self.vars[v.0 as usize];
        let (max_cell, size_cell) = (state.max, state.size);
        self.trail.set_i64(max_cell, new_max);
        let size = self.trail.get_u64(size_cell) - removed;
        self.trail.set_u64(size_cell, size);
        self.emit_var_events(v, true, new_max == cur_min)
    }

    pub fn set_range(&mut self, v: VarId, l: i64, u: i64) -> PropagationResult {
        if l > u {
            return self.domain_wipeout(v);
        }
        self.set_min(v, l)?;
        self.set_max(v, u)
    }

    pub fn set_value(&mut self, v: VarId, value: i64) -> PropagationResult {
        if self.is_absent(v) {
            return Ok(());
        }
        if !self.contains(v, value) {
            return self.domain_wipeout(v);
        }
        self.set_range(v, value, value)
    }

    pub fn remove_value(&mut self, v: VarId, value: i64) -> PropagationResult {
        if self.is_absent(v) {
            return Ok(());
        }
        let cur_min = self.min(v);
        let cur_max = self.max(v);
        if value < cur_min || value > cur_max {
            return Ok(());
        }
        if cur_min == cur_max {
            return self.domain_wipeout(v);
        }
        if value == cur_min {
            return self.set_min(v, value + 1);
        }
        if value == cur_max {
            return self.set_max(v, value - 1);
        }
        // Interior holes are not materialized by interval domains.
        if !self.is_bitset(v) || !self.bit_is_set(v, value) {
            return Ok(());
        }
        self.clear_bit(v, value);
        let state = &mut self.vars[v.0 as usize];
        let size_cell = state.size;
        state.holes.push(value);
        let size = self.trail.get_u64(size_cell) - 1;
        self.trail.set_u64(size_cell, size);
        self.emit_var_events(v, false, false)
    }

    pub fn remove_values(&mut self, v: VarId, values: &[i64]) -> PropagationResult {
        for &value in values {
            self.remove_value(v, value)?;
        }
        Ok(())
    }

    /// Removes every value in `[l, u]` from the domain.
    pub fn remove_interval(&mut self, v: VarId, l: i64, u: i64) -> PropagationResult {
        if l > u || self.is_absent(v) {
            return Ok(());
        }
        let cur_min = self.min(v);
        let cur_max = self.max(v);
        if l <= cur_min && u >= cur_max {
            return self.domain_wipeout(v);
        }
        if l <= cur_min {
            return self.set_min(v, u + 1);
        }
        if u >= cur_max {
            return self.set_max(v, l - 1);
        }
        if !self.is_bitset(v) {
            return Ok(());
        }
        let mut removed = 0u64;
        for value in l..=u {
            if self.bit_is_set(v, value) {
                self.clear_bit(v, value);
                self.vars[v.0 as usize].holes.push(value);
                removed += 1;
            }
        }
        if removed == 0 {
            return Ok(());
        }
        let size_cell = self.vars[v.0 as usize].size;
        let size = self.trail.get_u64(size_cell) - removed;
        self.trail.set_u64(size_cell, size);
        self.emit_var_events(v, false, false)
    }

    /// Intersects the domain with `values`.
    pub fn set_values(&mut self, v: VarId, values: &[i64]) -> PropagationResult {
        if self.is_absent(v) {
            return Ok(());
        }
        let mut kept: Vec<i64> = values
            .iter()
            .copied()
            .filter(|&value| self.contains(v, value))
            .collect();
        kept.sort_unstable();
        kept.dedup();
        if kept.is_empty() {
            return self.domain_wipeout(v);
        }
        if self.is_bitset(v) {
            let to_remove: Vec<i64> = self
                .domain_values(v)
                .into_iter()
                .filter(|value| kept.binary_search(value).is_err())
                .collect();
            self.remove_values(v, &to_remove)?;
        }
        self.set_range(v, kept[0], *kept.last().unwrap())
    }

    // ----- event plumbing -----

    /// Subscribes a demon to the bind event. Subscriptions made during
    /// search are retracted on backtrack.
    pub fn when_bound(&mut self, v: VarId, demon: DemonId) {
        self.subscribe(v, demon, EventList::Bound);
    }

    /// Subscribes a demon to min/max changes.
    pub fn when_range(&mut self, v: VarId, demon: DemonId) {
        self.subscribe(v, demon, EventList::Range);
    }

    /// Subscribes a demon to any domain change.
    pub fn when_domain(&mut self, v: VarId, demon: DemonId) {
        self.subscribe(v, demon, EventList::Domain);
    }

    fn subscribe(&mut self, v: VarId, demon: DemonId, list: EventList) {
        let state = &mut self.vars[v.0 as usize];
        match list {
            EventList::Bound => state.bound_demons.push(demon),
            EventList::Range => state.range_demons.push(demon),
            EventList::Domain => state.domain_demons.push(demon),
        }
        if self.trail.depth() > 0 {
            self.trail.add_backtrack_action(
                Box::new(move |s| {
                    let state = &mut s.vars[v.0 as usize];
                    match list {
                        EventList::Bound => state.bound_demons.pop(),
                        EventList::Range => state.range_demons.pop(),
                        EventList::Domain => state.domain_demons.pop(),
                    };
                }),
                false,
            );
        }
    }

    fn emit_var_events(
        &mut self,
        v: VarId,
        range_changed: bool,
        became_bound: bool,
    ) -> PropagationResult {
        let queue_stamp = self.queue.stamp();
        let state = &mut self.vars[v.0 as usize];
        if state.touch_stamp < queue_stamp {
            state.touch_stamp = queue_stamp;
            self.queue.touched.push(v);
        }
        let state = &self.vars[v.0 as usize];
        let mut demons: Vec<DemonId> = Vec::new();
        if became_bound {
            demons.extend_from_slice(&state.bound_demons);
        }
        if range_changed {
            demons.extend_from_slice(&state.range_demons);
        }
        demons.extend_from_slice(&state.domain_demons);
        self.enqueue_all(&demons);
        self.process_queue()
    }

    /// Synchronizes `old_min`/`old_max` and clears the hole log once the
    /// batch that touched this variable has settled.
    pub(crate) fn settle_var_events(&mut self, v: VarId) {
        let min = self.min(v);
        let max = self.max(v);
        let state = &mut self.vars[v.0 as usize];
        state.old_min = min;
        state.old_max = max;
        state.holes.clear();
    }

    // ----- bitset internals -----

    fn is_bitset(&self, v: VarId) -> bool {
        matches!(self.vars[v.0 as usize].repr, DomainRepr::Bitset { .. })
    }

    fn bit_is_set(&self, v: VarId, value: i64) -> bool {
        match &self.vars[v.0 as usize].repr {
            DomainRepr::Bounded => unreachable!("bit access on interval domain"),
            DomainRepr::Bitset { offset, words } => {
                let idx = (value - offset) as usize;
                let word = self.trail.get_u64(words[idx / 64]);
                word & (1u64 << (idx % 64)) != 0
            }
        }
    }

    fn clear_bit(&mut self, v: VarId, value: i64) {
        let cell;
        let mask;
        match &self.vars[v.0 as usize].repr {
            DomainRepr::Bounded => unreachable!("bit access on interval domain"),
            DomainRepr::Bitset { offset, words } => {
                let idx = (value - offset) as usize;
                cell = words[idx / 64];
                mask = !(1u64 << (idx % 64));
            }
        }
        let word = self.trail.get_u64(cell);
        self.trail.set_u64(cell, word & mask);
    }

    /// Smallest present value at or after `target`. Only called when one
    /// exists at or below the current max.
    fn seek_at_or_after(&self, v: VarId, target: i64) -> i64 {
        match &self.vars[v.0 as usize].repr {
            DomainRepr::Bounded => target,
            DomainRepr::Bitset { offset, words } => {
                let mut idx = (target - offset) as usize;
                let mut word_idx = idx / 64;
                let mut word = self.trail.get_u64(words[word_idx]) & (u64::MAX << (idx % 64));
                loop {
                    if word != 0 {
                        idx = word_idx * 64 + word.trailing_zeros() as usize;
                        return offset + idx as i64;
                    }
                    word_idx += 1;
                    assert!(word_idx < words.len(), "no value at or after {target}");
                    word = self.trail.get_u64(words[word_idx]);
                }
            }
        }
    }

    /// Largest present value at or before `target`.
    fn seek_at_or_before(&self, v: VarId, target: i64) -> i64 {
        match &self.vars[v.0 as usize].repr {
            DomainRepr::Bounded => target,
            DomainRepr::Bitset { offset, words } => {
                let mut idx = (target - offset) as usize;
                let mut word_idx = idx / 64;
                let mask = if idx % 64 == 63 {
                    u64::MAX
                } else {
                    (1u64 << (idx % 64 + 1)) - 1
                };
                let mut word = self.trail.get_u64(words[word_idx]) & mask;
                loop {
                    if word != 0 {
                        idx = word_idx * 64 + 63 - word.leading_zeros() as usize;
                        return offset + idx as i64;
                    }
                    assert!(word_idx > 0, "no value at or before {target}");
                    word_idx -= 1;
                    word = self.trail.get_u64(words[word_idx]);
                }
            }
        }
    }

    /// Number of present values in `[l, u]` (current representation; for
    /// interval domains this is simply the width).
    fn count_in_range(&self, v: VarId, l: i64, u: i64) -> u64 {
        if l > u {
            return 0;
        }
        match &self.vars[v.0 as usize].repr {
            DomainRepr::Bounded => (u - l + 1) as u64,
            DomainRepr::Bitset { offset, words } => {
                let lo = (l - offset) as usize;
                let hi = (u - offset) as usize;
                let mut count = 0u64;
                let mut w = lo / 64;
                while w <= hi / 64 {
                    let mut word = self.trail.get_u64(words[w]);
                    if w == lo / 64 {
                        word &= u64::MAX << (lo % 64);
                    }
                    if w == hi / 64 && hi % 64 != 63 {
                        word &= (1u64 << (hi % 64 + 1)) - 1;
                    }
                    count += word.count_ones() as u64;
                    w += 1;
                }
                count
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum EventList {
    Bound,
    Range,
    Domain,
}

/// Iterator over the values of a domain, smallest first.
pub struct DomainIter<'a> {
    solver: &'a Solver,
    var: VarId,
    next: Option<i64>,
}

impl Iterator for DomainIter<'_> {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        let value = self.next?;
        let max = self.solver.max(self.var);
        if value > max {
            self.next = None;
            return None;
        }
        self.next = if value == max {
            None
        } else {
            match &self.solver.vars[self.var.0 as usize].repr {
                DomainRepr::Bounded => Some(value + 1),
                DomainRepr::Bitset { .. } => Some(self.solver.seek_at_or_after(self.var, value + 1)),
            }
        };
        Some(value)
    }
}
