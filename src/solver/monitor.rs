//! Search monitors: the observer surface of the search driver.
//!
//! A monitor subscribes to search events by overriding the hooks it cares
//! about. Monitors attached to a search are notified in insertion order at
//! every transition; several hooks let them influence the search (veto a
//! solution, modify a decision, request a restart or termination).

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::PropagationResult;
use crate::solver::assignment::Assignment;
use crate::solver::decision::DecisionRef;
use crate::solver::engine::Solver;
use crate::solver::visitor::ModelVisitor;

/// A shared, mutable handle to a monitor, as stored by a search frame.
pub type MonitorRef = Rc<RefCell<dyn SearchMonitor>>;

/// Wraps a monitor value into the handle form the search entry points take.
pub fn monitor<M: SearchMonitor + 'static>(m: M) -> MonitorRef {
    Rc::new(RefCell::new(m))
}

/// Returned by [`SearchMonitor::progress_percent`] when a monitor has no
/// progress notion.
pub const NO_PROGRESS: i32 = -1;

/// How a monitor wants the driver to treat the decision about to be
/// applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecisionModification {
    /// Explore both branches, left first.
    #[default]
    NoChange,
    /// Apply the left branch without a choice point; never refute.
    KeepLeft,
    /// Jump straight to the right branch, without a choice point.
    KeepRight,
    /// Prune both branches: fail here.
    KillBoth,
    /// Explore both branches, right first.
    SwitchBranches,
}

/// Observer of every search event.
///
/// All hooks have no-op defaults. Hooks returning `PropagationResult` may
/// fail, which the driver treats exactly like a failed decision.
#[allow(unused_variables)]
pub trait SearchMonitor {
    fn enter_search(&mut self, solver: &mut Solver) {}
    fn restart_search(&mut self, solver: &mut Solver) {}
    fn exit_search(&mut self, solver: &mut Solver) {}

    /// Before the decision builder is asked for the next decision.
    fn begin_next_decision(&mut self, solver: &mut Solver) -> PropagationResult {
        Ok(())
    }
    /// After the decision builder produced `decision` (`None` at a
    /// solution candidate).
    fn end_next_decision(&mut self, solver: &mut Solver, decision: Option<&DecisionRef>) {}

    /// Lets the monitor prune or reorder the branches of `decision`.
    fn modify_decision(
        &mut self,
        solver: &mut Solver,
        decision: &DecisionRef,
    ) -> DecisionModification {
        DecisionModification::NoChange
    }

    fn apply_decision(&mut self, solver: &mut Solver, decision: &DecisionRef) -> PropagationResult {
        Ok(())
    }
    fn refute_decision(
        &mut self,
        solver: &mut Solver,
        decision: &DecisionRef,
    ) -> PropagationResult {
        Ok(())
    }
    /// After a branch ran; `applied` is false for the refuted branch.
    fn after_decision(&mut self, solver: &mut Solver, decision: &DecisionRef, applied: bool) {}

    fn begin_fail(&mut self, solver: &mut Solver) {}
    fn end_fail(&mut self, solver: &mut Solver) {}

    fn begin_initial_propagation(&mut self, solver: &mut Solver) {}
    fn end_initial_propagation(&mut self, solver: &mut Solver) {}

    /// May veto a candidate solution; vetoed candidates count as failures.
    fn accept_solution(&mut self, solver: &mut Solver) -> bool {
        true
    }
    /// Called on accepted solutions; returning true asks the enclosing
    /// `solve` to keep searching.
    fn at_solution(&mut self, solver: &mut Solver) -> bool {
        false
    }
    fn no_more_solutions(&mut self, solver: &mut Solver) {}

    /// The search tree is exhausted; returning true restarts the search
    /// for another descent.
    fn local_optimum(&mut self, solver: &mut Solver) -> bool {
        false
    }
    /// May veto a local-search delta.
    fn accept_delta(&mut self, solver: &mut Solver, delta: &Assignment) -> bool {
        true
    }
    fn accept_neighbor(&mut self, solver: &mut Solver) {}
    fn accept_unchecked_neighbor(&mut self, solver: &mut Solver) {}
    fn is_unchecked_solution_limit_reached(&mut self, solver: &mut Solver) -> bool {
        false
    }

    /// Cooperative check point; limits live here.
    fn periodic_check(&mut self, solver: &mut Solver) -> PropagationResult {
        Ok(())
    }
    /// Progress toward a limit in percent, or [`NO_PROGRESS`].
    fn progress_percent(&mut self, solver: &mut Solver) -> i32 {
        NO_PROGRESS
    }

    fn accept(&self, visitor: &mut dyn ModelVisitor) {}
}

// Notification fan-out. Monitor lists are cloned out of the frame before
// iterating so a hook can freely take `&mut Solver`.
impl Solver {
    pub(crate) fn notify_enter_search(&mut self) {
        for m in self.active_monitors() {
            m.borrow_mut().enter_search(self);
        }
    }

    pub(crate) fn notify_restart_search(&mut self) {
        for m in self.active_monitors() {
            m.borrow_mut().restart_search(self);
        }
    }

    pub(crate) fn notify_exit_search(&mut self) {
        for m in self.active_monitors() {
            m.borrow_mut().exit_search(self);
        }
    }

    pub(crate) fn notify_begin_next_decision(&mut self) -> PropagationResult {
        for m in self.active_monitors() {
            m.borrow_mut().begin_next_decision(self)?;
        }
        Ok(())
    }

    pub(crate) fn notify_end_next_decision(&mut self, decision: Option<&DecisionRef>) {
        for m in self.active_monitors() {
            m.borrow_mut().end_next_decision(self, decision);
        }
    }

    pub(crate) fn notify_modify_decision(&mut self, decision: &DecisionRef) -> DecisionModification {
        for m in self.active_monitors() {
            let modification = m.borrow_mut().modify_decision(self, decision);
            if modification != DecisionModification::NoChange {
                return modification;
            }
        }
        DecisionModification::NoChange
    }

    pub(crate) fn notify_apply_decision(&mut self, decision: &DecisionRef) -> PropagationResult {
        for m in self.active_monitors() {
            m.borrow_mut().apply_decision(self, decision)?;
        }
        Ok(())
    }

    pub(crate) fn notify_refute_decision(&mut self, decision: &DecisionRef) -> PropagationResult {
        for m in self.active_monitors() {
            m.borrow_mut().refute_decision(self, decision)?;
        }
        Ok(())
    }

    pub(crate) fn notify_after_decision(&mut self, decision: &DecisionRef, applied: bool) {
        for m in self.active_monitors() {
            m.borrow_mut().after_decision(self, decision, applied);
        }
    }

    pub(crate) fn notify_begin_fail(&mut self) {
        for m in self.active_monitors() {
            m.borrow_mut().begin_fail(self);
        }
    }

    pub(crate) fn notify_end_fail(&mut self) {
        for m in self.active_monitors() {
            m.borrow_mut().end_fail(self);
        }
    }

    pub(crate) fn notify_begin_initial_propagation(&mut self) {
        for m in self.active_monitors() {
            m.borrow_mut().begin_initial_propagation(self);
        }
    }

    pub(crate) fn notify_end_initial_propagation(&mut self) {
        for m in self.active_monitors() {
            m.borrow_mut().end_initial_propagation(self);
        }
    }

    /// All monitors must accept; any veto rejects the candidate.
    pub(crate) fn notify_accept_solution(&mut self) -> bool {
        let mut accepted = true;
        for m in self.active_monitors() {
            accepted &= m.borrow_mut().accept_solution(self);
        }
        accepted
    }

    /// True if any monitor wants the enclosing solve to keep going.
    pub(crate) fn notify_at_solution(&mut self) -> bool {
        let mut keep_searching = false;
        for m in self.active_monitors() {
            keep_searching |= m.borrow_mut().at_solution(self);
        }
        keep_searching
    }

    pub(crate) fn notify_no_more_solutions(&mut self) {
        for m in self.active_monitors() {
            m.borrow_mut().no_more_solutions(self);
        }
    }

    /// True if any monitor converts the exhaustion into a restart.
    pub(crate) fn notify_local_optimum(&mut self) -> bool {
        let mut restart = false;
        for m in self.active_monitors() {
            restart |= m.borrow_mut().local_optimum(self);
        }
        restart
    }

    pub(crate) fn notify_accept_neighbor(&mut self) {
        for m in self.active_monitors() {
            m.borrow_mut().accept_neighbor(self);
        }
    }

    /// Periodic checks for the active search and, underneath a nested
    /// search, for the top-level search as well, so outer limits can wind
    /// down inner work.
    pub(crate) fn notify_periodic_check(&mut self) -> PropagationResult {
        for m in self.active_monitors() {
            m.borrow_mut().periodic_check(self)?;
        }
        if self.searches.len() > 1 {
            for m in self.top_level_monitors() {
                m.borrow_mut().periodic_check(self)?;
            }
        }
        Ok(())
    }

    /// The maximum progress over all monitors of the top-level search.
    /// Monitors may call this from inside their own hooks, so a monitor
    /// that is currently being notified is skipped.
    pub fn top_progress_percent(&mut self) -> i32 {
        let mut progress = NO_PROGRESS;
        for m in self.top_level_monitors() {
            if let Ok(mut monitor) = m.try_borrow_mut() {
                progress = progress.max(monitor.progress_percent(self));
            }
        }
        progress
    }
}
