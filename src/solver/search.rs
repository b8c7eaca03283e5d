//! The depth-first search driver.
//!
//! A search owns a decision builder, a monitor list, and a stack of applied
//! decisions. Exploration alternates decision application with propagation;
//! failures unwind the trail to the last choice point and refute the
//! decision there. Nested searches push further frames on the search stack,
//! so `SolveOnce`/`NestedOptimize` collapse whole sub-searches into single
//! decisions of the outer tree.

use tracing::{debug, warn};

use crate::error::PropagationResult;
use crate::solver::decision::{DecisionBuilderRef, DecisionRef};
use crate::solver::engine::Solver;
use crate::solver::monitor::{DecisionModification, MonitorRef};
use crate::solver::trail::MarkerKind;

/// Where a search currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    OutsideSearch,
    InRootNode,
    InSearch,
    AtSolution,
    NoMoreSolutions,
    ProblemInfeasible,
}

impl SearchState {
    pub(crate) fn is_inside_search(self) -> bool {
        matches!(
            self,
            SearchState::InRootNode | SearchState::InSearch | SearchState::AtSolution
        )
    }
}

pub(crate) struct AppliedDecision {
    pub decision: DecisionRef,
    /// Trail depth of this decision's choice-point marker.
    pub depth: usize,
    /// True when the branches were explored right-first.
    pub swapped: bool,
}

/// One logical search frame on the solver's search stack.
pub(crate) struct Search {
    pub db: DecisionBuilderRef,
    pub monitors: Vec<MonitorRef>,
    pub state: SearchState,
    pub applied: Vec<AppliedDecision>,
    /// Trail depth of the entry sentinel; everything above it belongs to
    /// this search.
    pub entry_depth: usize,
    /// Trail depth of the post-root-propagation sentinel; restarts unwind
    /// here.
    pub root_depth: usize,
    pub created_by_solve: bool,
    pub backtrack_at_exit: bool,
    pub should_finish: bool,
    pub should_restart: bool,
    // Per-search counters: reset by restarts, unlike the solver's
    // cumulative ones.
    pub branches: u64,
    pub failures: u64,
    pub solutions: u64,
    pub local_optima: u64,
}

enum Branch {
    Fail,
    Solution,
    Decision(DecisionRef),
}

impl Solver {
    fn top_frame(&self) -> &Search {
        self.searches.last().expect("no active search")
    }

    fn top_frame_mut(&mut self) -> &mut Search {
        self.searches.last_mut().expect("no active search")
    }

    /// The state of the active search, or `OutsideSearch`.
    pub fn state(&self) -> SearchState {
        self.searches
            .last()
            .map_or(SearchState::OutsideSearch, |s| s.state)
    }

    /// Branches explored by the active search since it started or last
    /// restarted. Restarts reset this; the solver-level counter keeps
    /// accumulating.
    pub fn search_branches(&self) -> u64 {
        self.searches.last().map_or(0, |s| s.branches)
    }

    /// Failures in the active search since it started or last restarted.
    pub fn search_failures(&self) -> u64 {
        self.searches.last().map_or(0, |s| s.failures)
    }

    /// Solutions accepted by the active search; preserved across restarts.
    pub fn search_solutions(&self) -> u64 {
        self.searches.last().map_or(0, |s| s.solutions)
    }

    fn set_top_state(&mut self, state: SearchState) {
        self.top_frame_mut().state = state;
    }

    /// Asks the active search to stop at the next cooperative check point.
    pub fn finish_current_search(&mut self) {
        if let Some(frame) = self.searches.last_mut() {
            frame.should_finish = true;
        }
    }

    /// Asks the active search to unwind to its root and start over.
    /// Cumulative solver counters are preserved; per-search counters
    /// reset.
    pub fn restart_current_search(&mut self) {
        if let Some(frame) = self.searches.last_mut() {
            frame.should_restart = true;
        }
    }

    // ----- entry points -----

    /// Opens a search frame. Pair with [`next_solution`](Self::next_solution)
    /// and [`end_search`](Self::end_search).
    pub fn new_search(&mut self, db: DecisionBuilderRef, mut monitors: Vec<MonitorRef>) {
        let disabled = self.parameters.disable_solve;
        if disabled {
            warn!("solve is disabled by parameters; search will report no solutions");
        }
        if self.parameters.trace {
            monitors.push(crate::solver::monitor::monitor(
                crate::solver::monitors::trace::SearchTrace::new("search"),
            ));
        }
        let entry_depth = self.trail.depth() + 1;
        self.searches.push(Search {
            db,
            monitors,
            state: if disabled {
                SearchState::NoMoreSolutions
            } else {
                SearchState::OutsideSearch
            },
            applied: Vec::new(),
            entry_depth,
            root_depth: entry_depth + 1,
            created_by_solve: false,
            backtrack_at_exit: true,
            should_finish: false,
            should_restart: false,
            branches: 0,
            failures: 0,
            solutions: 0,
            local_optima: 0,
        });
    }

    /// Runs the search to its next accepted solution. Returns false when
    /// the tree is exhausted, the root is infeasible, or a monitor stopped
    /// the search.
    pub fn next_solution(&mut self) -> bool {
        assert!(
            !self.searches.is_empty(),
            "next_solution called outside a search"
        );
        match self.state() {
            SearchState::OutsideSearch => {
                if !self.begin_search() {
                    return false;
                }
            }
            SearchState::AtSolution => {
                // Leave the solution leaf before looking for the next one.
                self.set_top_state(SearchState::InSearch);
                if !self.backtrack_and_refute() {
                    match self.on_tree_exhausted() {
                        Some(result) => return result,
                        None => {}
                    }
                }
            }
            SearchState::NoMoreSolutions | SearchState::ProblemInfeasible => return false,
            SearchState::InRootNode | SearchState::InSearch => {}
        }
        self.search_loop()
    }

    /// Closes the active search frame, unwinding to the pre-search state
    /// unless a committing search asked to keep its solution in place.
    pub fn end_search(&mut self) {
        let frame = self.top_frame();
        let entry_depth = frame.entry_depth;
        let keep = !frame.backtrack_at_exit;
        if !keep && self.trail.depth() >= entry_depth {
            self.unwind_to_depth(entry_depth - 1);
            self.sync_touched_vars();
        }
        self.notify_exit_search();
        self.searches.pop();
    }

    /// Runs a full search: returns true iff at least one solution was
    /// accepted. The solver is restored to its pre-search state.
    pub fn solve(&mut self, db: DecisionBuilderRef, monitors: Vec<MonitorRef>) -> bool {
        self.new_search(db, monitors);
        self.top_frame_mut().created_by_solve = true;
        self.next_solution();
        let found = self.top_frame().solutions > 0;
        self.end_search();
        found
    }

    /// Like [`solve`](Self::solve), but does not backtrack past the last
    /// solution: on success the solver is left with the solution imposed.
    /// Used by nested decision builders.
    pub fn solve_and_commit(&mut self, db: DecisionBuilderRef, monitors: Vec<MonitorRef>) -> bool {
        self.new_search(db, monitors);
        self.top_frame_mut().created_by_solve = true;
        self.next_solution();
        let found = self.top_frame().solutions > 0;
        if found {
            self.top_frame_mut().backtrack_at_exit = false;
        }
        self.end_search();
        found
    }

    // ----- driver internals -----

    /// Enter the root node: post constraints, run initial propagation.
    fn begin_search(&mut self) -> bool {
        self.notify_enter_search();
        if self.searches.len() == 1 {
            self.post_pending_constraints();
        }
        let entry_depth = self.push_state(MarkerKind::Sentinel);
        self.top_frame_mut().entry_depth = entry_depth;
        self.set_top_state(SearchState::InRootNode);
        self.notify_begin_initial_propagation();
        let rooted = self.run_initial_propagation();
        self.notify_end_initial_propagation();
        match rooted {
            Ok(()) => {
                let root_depth = self.push_state(MarkerKind::Sentinel);
                self.top_frame_mut().root_depth = root_depth;
                self.set_top_state(SearchState::InSearch);
                debug!(solver = %self.name, "root node propagated");
                true
            }
            Err(_) => {
                self.fail_count += 1;
                self.top_frame_mut().failures += 1;
                self.unwind_to_depth(entry_depth - 1);
                self.sync_touched_vars();
                self.set_top_state(SearchState::ProblemInfeasible);
                debug!(solver = %self.name, "root node infeasible");
                false
            }
        }
    }

    fn search_loop(&mut self) -> bool {
        loop {
            if self.top_frame().should_finish {
                return self.wind_down();
            }
            if self.top_frame().should_restart {
                self.do_restart();
            }

            let pre = self
                .notify_periodic_check()
                .and_then(|_| self.notify_begin_next_decision());
            if self.top_frame().should_finish {
                return self.wind_down();
            }
            let branch = match pre {
                Err(_) => Branch::Fail,
                Ok(()) => {
                    let db = self.top_frame().db.clone();
                    let produced = db.next(self);
                    if let Ok(d) = &produced {
                        self.notify_end_next_decision(d.as_ref());
                    }
                    match produced {
                        Err(_) => Branch::Fail,
                        Ok(None) => Branch::Solution,
                        Ok(Some(d)) => Branch::Decision(d),
                    }
                }
            };

            match branch {
                Branch::Fail => {
                    if !self.backtrack_and_refute() {
                        if let Some(result) = self.on_tree_exhausted() {
                            return result;
                        }
                    }
                }
                Branch::Solution => {
                    if !self.notify_accept_solution() {
                        // Vetoed: the candidate counts as a failure.
                        if !self.backtrack_and_refute() {
                            if let Some(result) = self.on_tree_exhausted() {
                                return result;
                            }
                        }
                        continue;
                    }
                    self.solution_count += 1;
                    let frame = self.top_frame_mut();
                    frame.solutions += 1;
                    let in_descent = frame.local_optima > 0;
                    if in_descent {
                        self.accepted_neighbor_count += 1;
                        self.notify_accept_neighbor();
                    }
                    let keep_searching = self.notify_at_solution();
                    if keep_searching && self.top_frame().created_by_solve {
                        if !self.backtrack_and_refute() {
                            if let Some(result) = self.on_tree_exhausted() {
                                return result;
                            }
                        }
                        continue;
                    }
                    self.set_top_state(SearchState::AtSolution);
                    return true;
                }
                Branch::Decision(d) => {
                    let outcome = match self.notify_modify_decision(&d) {
                        DecisionModification::NoChange => self.run_branch(&d, false, true),
                        DecisionModification::SwitchBranches => self.run_branch(&d, true, true),
                        DecisionModification::KeepLeft => self.run_branch(&d, false, false),
                        DecisionModification::KeepRight => self.run_branch(&d, true, false),
                        DecisionModification::KillBoth => Err(crate::error::Failure),
                    };
                    if outcome.is_err() && !self.backtrack_and_refute() {
                        if let Some(result) = self.on_tree_exhausted() {
                            return result;
                        }
                    }
                }
            }
        }
    }

    /// Executes one branch of a decision, with or without a choice point.
    fn run_branch(
        &mut self,
        d: &DecisionRef,
        right_first: bool,
        with_choice_point: bool,
    ) -> PropagationResult {
        if with_choice_point {
            let depth = self.push_state(MarkerKind::ChoicePoint);
            self.top_frame_mut().applied.push(AppliedDecision {
                decision: d.clone(),
                depth,
                swapped: right_first,
            });
        }
        self.branch_count += 1;
        self.top_frame_mut().branches += 1;
        if right_first {
            self.notify_refute_decision(d)?;
            self.with_frozen_queue(|s| d.refute(s))?;
        } else {
            self.notify_apply_decision(d)?;
            self.with_frozen_queue(|s| d.apply(s))?;
        }
        self.notify_after_decision(d, !right_first);
        Ok(())
    }

    /// Unwinds to the innermost open choice point and takes its other
    /// branch. Returns false when no choice point is left in this search.
    fn backtrack_and_refute(&mut self) -> bool {
        loop {
            self.fail_count += 1;
            self.top_frame_mut().failures += 1;
            self.notify_begin_fail();
            self.trail.bump_fail_stamp();
            let Some(applied) = self.top_frame_mut().applied.pop() else {
                let root_depth = self.top_frame().root_depth;
                if self.trail.depth() >= root_depth {
                    self.unwind_to_depth(root_depth);
                }
                self.sync_touched_vars();
                self.notify_end_fail();
                return false;
            };
            self.unwind_to_depth(applied.depth - 1);
            self.sync_touched_vars();
            self.notify_end_fail();
            // The refutation runs under a fresh sentinel, in the state the
            // choice point was taken from.
            self.push_state(MarkerKind::Sentinel);
            self.branch_count += 1;
            self.top_frame_mut().branches += 1;
            let d = applied.decision;
            let refuted = if applied.swapped {
                self.notify_apply_decision(&d)
                    .and_then(|_| self.with_frozen_queue(|s| d.apply(s)))
            } else {
                self.notify_refute_decision(&d)
                    .and_then(|_| self.with_frozen_queue(|s| d.refute(s)))
            };
            match refuted {
                Ok(()) => {
                    self.notify_after_decision(&d, applied.swapped);
                    return true;
                }
                Err(_) => continue,
            }
        }
    }

    /// The search tree is spent. A monitor may turn this into a restart
    /// (`None` = keep looping); otherwise the search winds down
    /// (`Some(false)`).
    fn on_tree_exhausted(&mut self) -> Option<bool> {
        if !self.top_frame().should_finish && self.notify_local_optimum() {
            self.top_frame_mut().local_optima += 1;
            self.neighbor_count += 1;
            self.do_restart();
            return None;
        }
        Some(self.wind_down())
    }

    fn wind_down(&mut self) -> bool {
        let root_depth = self.top_frame().root_depth;
        if self.trail.depth() > root_depth {
            self.unwind_to_depth(root_depth);
            self.sync_touched_vars();
        }
        self.set_top_state(SearchState::NoMoreSolutions);
        self.notify_no_more_solutions();
        false
    }

    fn do_restart(&mut self) {
        let frame = self.top_frame_mut();
        frame.should_restart = false;
        frame.applied.clear();
        frame.branches = 0;
        frame.failures = 0;
        let root_depth = frame.root_depth;
        if self.trail.depth() > root_depth {
            self.unwind_to_depth(root_depth);
            self.sync_touched_vars();
        }
        self.notify_restart_search();
        // A fresh descent starts under its own sentinel.
        self.push_state(MarkerKind::Sentinel);
        self.set_top_state(SearchState::InSearch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::decision::{builder, Phase};
    use crate::solver::heuristics::value::IntValueStrategy;
    use crate::solver::heuristics::variable::IntVarStrategy;
    use pretty_assertions::assert_eq;

    fn enumerate_all(solver: &mut Solver, vars: &[crate::VarId]) -> Vec<Vec<i64>> {
        let db = builder(Phase::new(
            vars,
            IntVarStrategy::ChooseFirstUnbound,
            IntValueStrategy::AssignMinValue,
        ));
        let mut all = Vec::new();
        solver.new_search(db, vec![]);
        while solver.next_solution() {
            all.push(vars.iter().map(|&v| solver.value(v)).collect());
        }
        solver.end_search();
        all
    }

    #[test]
    fn enumerates_a_two_variable_grid() {
        let mut s = Solver::new("grid");
        let x = s.make_int_var(0, 1, "x");
        let y = s.make_int_var(0, 1, "y");
        let all = enumerate_all(&mut s, &[x, y]);
        assert_eq!(all, vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]);
        assert_eq!(s.state(), SearchState::OutsideSearch);
        // Everything restored after end_search.
        assert_eq!(s.size(x), 2);
        assert_eq!(s.size(y), 2);
    }

    #[test]
    fn infeasible_root_reports_no_solutions() {
        let mut s = Solver::new("infeasible");
        let x = s.make_int_var(0, 2, "x");
        s.add_constraint(crate::solver::constraints::cmp::GreaterOrEqualCst::new(x, 5))
            .unwrap();
        let db = builder(Phase::new(
            &[x],
            IntVarStrategy::ChooseFirstUnbound,
            IntValueStrategy::AssignMinValue,
        ));
        assert!(!s.solve(db, vec![]));
        assert_eq!(s.failures(), 1);
    }

    #[test]
    fn solve_without_monitors_stops_at_the_first_solution() {
        let mut s = Solver::new("first");
        let x = s.make_int_var(0, 5, "x");
        let db = builder(Phase::new(
            &[x],
            IntVarStrategy::ChooseFirstUnbound,
            IntValueStrategy::AssignMinValue,
        ));
        assert!(s.solve(db, vec![]));
        assert_eq!(s.solutions(), 1);
        // Model state is restored once the search ends.
        assert!(!s.bound(x));
    }
}
