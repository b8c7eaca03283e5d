//! The reversibility trail: an undo log for every mutation made during
//! search.
//!
//! All solver state that must survive backtracking lives in typed cells
//! allocated from the trail's lanes. Writes route through [`Trail::set`],
//! which records the previous value at most once per choice point (the
//! stamp optimization). Popping a state restores every logged cell in LIFO
//! order and runs any registered backtrack actions.

use std::marker::PhantomData;

use tracing::trace;

/// A handle to a reversible cell of primitive type `T`.
///
/// Cheap to copy; reads and writes go through the owning [`Trail`]. A cell
/// allocated from one solver must never be used with another.
pub struct RevCell<T> {
    index: u32,
    _marker: PhantomData<T>,
}

impl<T> Clone for RevCell<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for RevCell<T> {}

impl<T> std::fmt::Debug for RevCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RevCell({})", self.index)
    }
}

/// One lane of same-typed cells plus its undo log.
#[derive(Debug, Default)]
struct Lane<T> {
    values: Vec<T>,
    /// Stamp of the last choice point a save was recorded under, per cell.
    stamps: Vec<u64>,
    /// `(cell index, previous value)` pairs, restored in LIFO order.
    log: Vec<(u32, T)>,
}

impl<T: Copy> Lane<T> {
    fn alloc(&mut self, value: T) -> RevCell<T> {
        let index = self.values.len() as u32;
        self.values.push(value);
        self.stamps.push(0);
        RevCell {
            index,
            _marker: PhantomData,
        }
    }

    fn get(&self, cell: RevCell<T>) -> T {
        self.values[cell.index as usize]
    }

    fn set(&mut self, cell: RevCell<T>, value: T, stamp: u64, log_enabled: bool) {
        let i = cell.index as usize;
        if log_enabled && self.stamps[i] < stamp {
            self.log.push((cell.index, self.values[i]));
            self.stamps[i] = stamp;
        }
        self.values[i] = value;
    }

    fn restore_to(&mut self, len: usize) {
        while self.log.len() > len {
            let (index, old) = self.log.pop().unwrap();
            self.values[index as usize] = old;
        }
    }
}

/// The kind of a marker pushed on the trail.
///
/// `Sentinel` bounds a search choice point and is the target of backtrack
/// jumps; `ChoicePoint` is pushed by the driver before applying a decision;
/// `SimpleMarker` delimits scratch state (nested propagation, assignment
/// checks).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Sentinel,
    SimpleMarker,
    ChoicePoint,
}

/// A callback to run while unwinding past the frame it was registered under.
pub type BacktrackAction = Box<dyn FnOnce(&mut crate::solver::engine::Solver)>;

#[derive(Debug)]
struct Frame {
    kind: MarkerKind,
    i64_len: usize,
    u64_len: usize,
    bool_len: usize,
    action_len: usize,
}

pub(crate) struct PoppedFrame {
    pub kind: MarkerKind,
    /// Actions registered with `fast = false`; run before cell restores.
    pub slow: Vec<BacktrackAction>,
    /// Actions registered with `fast = true`; run after cell restores.
    pub fast: Vec<BacktrackAction>,
}

/// The trail proper: typed cell lanes, the marker stack, backtrack actions,
/// and the two monotone stamps.
pub struct Trail {
    i64s: Lane<i64>,
    u64s: Lane<u64>,
    bools: Lane<bool>,
    actions: Vec<(BacktrackAction, bool)>,
    frames: Vec<Frame>,
    pending_restore: Option<(usize, usize, usize)>,
    stamp: u64,
    fail_stamp: u64,
    unwinding: bool,
}

impl std::fmt::Debug for Trail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trail")
            .field("depth", &self.frames.len())
            .field("stamp", &self.stamp)
            .field("fail_stamp", &self.fail_stamp)
            .finish()
    }
}

impl Trail {
    pub fn new() -> Self {
        Self {
            i64s: Lane::default(),
            u64s: Lane::default(),
            bools: Lane::default(),
            actions: Vec::new(),
            frames: Vec::new(),
            pending_restore: None,
            stamp: 1,
            fail_stamp: 1,
            unwinding: false,
        }
    }

    /// Strictly increasing at every [`push_state`](Self::push_state).
    pub fn current_stamp(&self) -> u64 {
        self.stamp
    }

    /// Strictly increasing at every backtrack, independent of pushes.
    pub fn fail_stamp(&self) -> u64 {
        self.fail_stamp
    }

    pub(crate) fn bump_fail_stamp(&mut self) {
        self.fail_stamp += 1;
    }

    /// Current marker depth. Zero means no state is pushed; writes made at
    /// depth zero are permanent.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Pushes a marker and bumps the stamp. Returns the new depth.
    pub fn push_state(&mut self, kind: MarkerKind) -> usize {
        self.stamp += 1;
        self.frames.push(Frame {
            kind,
            i64_len: self.i64s.log.len(),
            u64_len: self.u64s.log.len(),
            bool_len: self.bools.log.len(),
            action_len: self.actions.len(),
        });
        self.frames.len()
    }

    /// Registers a callback for the next unwind past the current marker.
    /// `fast` callbacks see restored cells; slow ones run before restores.
    ///
    /// A no-op at depth zero: with no marker below, there is nothing to
    /// unwind past.
    pub fn add_backtrack_action(&mut self, action: BacktrackAction, fast: bool) {
        if self.frames.is_empty() || self.unwinding {
            return;
        }
        self.actions.push((action, fast));
    }

    /// Removes the top frame and restores its cells, handing back the
    /// actions for the caller to run around the restore. Cell restores are
    /// done here, after the slow actions are extracted but before the
    /// caller runs the fast ones; the caller must respect that ordering.
    pub(crate) fn pop_frame(&mut self) -> PoppedFrame {
        let frame = self
            .frames
            .pop()
            .expect("pop_state called with no marker on the trail");
        let mut slow = Vec::new();
        let mut fast = Vec::new();
        for (action, is_fast) in self.actions.drain(frame.action_len..) {
            if is_fast {
                fast.push(action);
            } else {
                slow.push(action);
            }
        }
        slow.reverse();
        fast.reverse();
        // Cells are restored by restore_cells, invoked by the caller between
        // the slow and fast action batches.
        self.pending_restore = Some((frame.i64_len, frame.u64_len, frame.bool_len));
        PoppedFrame {
            kind: frame.kind,
            slow,
            fast,
        }
    }

    pub(crate) fn restore_cells(&mut self) {
        let (i, u, b) = self
            .pending_restore
            .take()
            .expect("restore_cells without a popped frame");
        self.i64s.restore_to(i);
        self.u64s.restore_to(u);
        self.bools.restore_to(b);
    }

    pub(crate) fn set_unwinding(&mut self, on: bool) {
        self.unwinding = on;
    }

    fn log_enabled(&self) -> bool {
        !self.frames.is_empty() && !self.unwinding
    }

    // Typed allocation and access. Cells allocated at depth zero live for
    // the whole solver; cells allocated under a marker become garbage once
    // that marker is popped (their values are restored but the slots stay).

    pub fn alloc_i64(&mut self, value: i64) -> RevCell<i64> {
        self.i64s.alloc(value)
    }
    pub fn alloc_u64(&mut self, value: u64) -> RevCell<u64> {
        self.u64s.alloc(value)
    }
    pub fn alloc_bool(&mut self, value: bool) -> RevCell<bool> {
        self.bools.alloc(value)
    }

    pub fn get_i64(&self, cell: RevCell<i64>) -> i64 {
        self.i64s.get(cell)
    }
    pub fn get_u64(&self, cell: RevCell<u64>) -> u64 {
        self.u64s.get(cell)
    }
    pub fn get_bool(&self, cell: RevCell<bool>) -> bool {
        self.bools.get(cell)
    }

    pub fn set_i64(&mut self, cell: RevCell<i64>, value: i64) {
        let enabled = self.log_enabled();
        self.i64s.set(cell, value, self.stamp, enabled);
    }
    pub fn set_u64(&mut self, cell: RevCell<u64>, value: u64) {
        let enabled = self.log_enabled();
        self.u64s.set(cell, value, self.stamp, enabled);
    }
    pub fn set_bool(&mut self, cell: RevCell<bool>, value: bool) {
        let enabled = self.log_enabled();
        self.bools.set(cell, value, self.stamp, enabled);
    }
}

impl Default for Trail {
    fn default() -> Self {
        Self::new()
    }
}

// The pending-restore slot lives outside the Frame so that pop_frame can
// hand actions to the caller while the cell logs wait for restore_cells.
impl Trail {
    #[cfg(test)]
    pub(crate) fn pop_state_discarding_actions(&mut self) {
        let popped = self.pop_frame();
        drop(popped);
        self.restore_cells();
    }
}

impl crate::solver::engine::Solver {
    /// Pushes a trail marker. Returns the new marker depth.
    pub fn push_state(&mut self, kind: MarkerKind) -> usize {
        self.trail.push_state(kind)
    }

    /// Pops the top marker: runs slow backtrack actions, restores every
    /// cell logged under it in LIFO order, then runs fast actions.
    pub fn pop_state(&mut self) {
        let popped = self.trail.pop_frame();
        trace!(kind = ?popped.kind, depth = self.trail.depth(), "popping state");
        self.trail.set_unwinding(true);
        for action in popped.slow {
            action(self);
        }
        self.trail.restore_cells();
        for action in popped.fast {
            action(self);
        }
        self.trail.set_unwinding(false);
    }

    /// Pops markers until the trail is back at `depth`.
    pub(crate) fn unwind_to_depth(&mut self, depth: usize) {
        assert!(depth <= self.trail.depth(), "unwind target above the trail top");
        while self.trail.depth() > depth {
            self.pop_state();
        }
    }

    /// Registers a callback for the next unwind past the current marker.
    pub fn add_backtrack_action(
        &mut self,
        action: impl FnOnce(&mut crate::solver::engine::Solver) + 'static,
        fast: bool,
    ) {
        self.trail.add_backtrack_action(Box::new(action), fast);
    }

    /// Strictly increasing at every `push_state`.
    pub fn current_stamp(&self) -> u64 {
        self.trail.current_stamp()
    }

    /// Strictly increasing at every backtrack.
    pub fn fail_stamp(&self) -> u64 {
        self.trail.fail_stamp()
    }

    // Reversible cells for user code (custom decisions, constraints with
    // backtrackable state). Writes made at depth zero are permanent.

    pub fn rev_alloc_i64(&mut self, value: i64) -> RevCell<i64> {
        self.trail.alloc_i64(value)
    }
    pub fn rev_alloc_u64(&mut self, value: u64) -> RevCell<u64> {
        self.trail.alloc_u64(value)
    }
    pub fn rev_alloc_bool(&mut self, value: bool) -> RevCell<bool> {
        self.trail.alloc_bool(value)
    }

    pub fn rev_get_i64(&self, cell: RevCell<i64>) -> i64 {
        self.trail.get_i64(cell)
    }
    pub fn rev_get_u64(&self, cell: RevCell<u64>) -> u64 {
        self.trail.get_u64(cell)
    }
    pub fn rev_get_bool(&self, cell: RevCell<bool>) -> bool {
        self.trail.get_bool(cell)
    }

    pub fn rev_set_i64(&mut self, cell: RevCell<i64>, value: i64) {
        self.trail.set_i64(cell, value)
    }
    pub fn rev_set_u64(&mut self, cell: RevCell<u64>, value: u64) {
        self.trail.set_u64(cell, value)
    }
    pub fn rev_set_bool(&mut self, cell: RevCell<bool>, value: bool) {
        self.trail.set_bool(cell, value)
    }
}
