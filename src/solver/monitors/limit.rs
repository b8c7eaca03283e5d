//! Search limits: cooperative termination on time, branches, failures, or
//! solutions, plus combinators and an improvement-rate limit.

use std::collections::VecDeque;

use crate::error::PropagationResult;
use crate::solver::decision::DecisionRef;
use crate::solver::engine::{Solver, VarId};
use crate::solver::monitor::{SearchMonitor, NO_PROGRESS};
use crate::solver::visitor::ModelVisitor;

/// A limit is a monitor whose `crossed` check stops the search when it
/// turns true. Checks run in `begin_next_decision`, `refute_decision`, and
/// on every periodic check.
pub trait SearchLimit: SearchMonitor {
    /// True when the budget is spent.
    fn crossed(&mut self, solver: &mut Solver) -> bool;
    /// Resets offsets when a search starts.
    fn init(&mut self, solver: &mut Solver);
}

const UNLIMITED: u64 = u64::MAX;

/// The standard limit: caps on wall time, branches, failures, and
/// solutions.
///
/// With `smart_time_check`, clock reads are skipped for a predicted number
/// of checks once a warm-up phase has measured how fast checks arrive.
/// With `cumulative`, the budget is shared across every search this
/// monitor is attached to: on search exit the consumed amount is deducted.
pub struct RegularLimit {
    duration_ms: u64,
    branches: u64,
    failures: u64,
    solutions: u64,
    smart_time_check: bool,
    cumulative: bool,
    duration_offset_ms: u64,
    branches_offset: u64,
    failures_offset: u64,
    solutions_offset: u64,
    check_count: u64,
    next_check: u64,
    last_elapsed_ms: u64,
    crossed_flag: bool,
}

impl RegularLimit {
    const CHECK_WARMUP: u64 = 100;
    const MAX_SKIP: u64 = 100;

    pub fn new(
        duration_ms: u64,
        branches: u64,
        failures: u64,
        solutions: u64,
        smart_time_check: bool,
        cumulative: bool,
    ) -> Self {
        Self {
            duration_ms,
            branches,
            failures,
            solutions,
            smart_time_check,
            cumulative,
            duration_offset_ms: 0,
            branches_offset: 0,
            failures_offset: 0,
            solutions_offset: 0,
            check_count: 0,
            next_check: 0,
            last_elapsed_ms: 0,
            crossed_flag: false,
        }
    }

    pub fn time(duration_ms: u64) -> Self {
        Self::new(duration_ms, UNLIMITED, UNLIMITED, UNLIMITED, false, false)
    }

    pub fn branches(branches: u64) -> Self {
        Self::new(UNLIMITED, branches, UNLIMITED, UNLIMITED, false, false)
    }

    pub fn failures(failures: u64) -> Self {
        Self::new(UNLIMITED, UNLIMITED, failures, UNLIMITED, false, false)
    }

    pub fn solutions(solutions: u64) -> Self {
        Self::new(UNLIMITED, UNLIMITED, UNLIMITED, solutions, false, false)
    }

    pub fn cumulative(mut self) -> Self {
        self.cumulative = true;
        self
    }

    pub fn smart_time_check(mut self) -> Self {
        self.smart_time_check = true;
        self
    }

    /// Replaces the budgets in place.
    pub fn update(&mut self, duration_ms: u64, branches: u64, failures: u64, solutions: u64) {
        self.duration_ms = duration_ms;
        self.branches = branches;
        self.failures = failures;
        self.solutions = solutions;
    }

    fn elapsed_ms(&mut self, solver: &Solver) -> u64 {
        self.check_count += 1;
        if self.duration_ms != UNLIMITED && self.next_check <= self.check_count {
            let elapsed = solver.wall_time_ms().saturating_sub(self.duration_offset_ms);
            if self.smart_time_check && self.check_count > Self::CHECK_WARMUP && elapsed > 0 {
                let predicted_calls = (self.duration_ms * self.check_count) / elapsed;
                self.next_check = self.check_count + predicted_calls.min(Self::MAX_SKIP);
            }
            self.last_elapsed_ms = elapsed;
        }
        self.last_elapsed_ms
    }

    fn check(&mut self, solver: &mut Solver) -> bool {
        solver.branches().saturating_sub(self.branches_offset) >= self.branches
            || solver.failures().saturating_sub(self.failures_offset) >= self.failures
            || solver.solutions().saturating_sub(self.solutions_offset) >= self.solutions
            || self.elapsed_ms(solver) >= self.duration_ms
    }

    fn enforce(&mut self, solver: &mut Solver) {
        if self.crossed(solver) {
            solver.finish_current_search();
        }
    }

    fn percent(value: u64, offset: u64, total: u64) -> i32 {
        if total == 0 || total == UNLIMITED {
            return NO_PROGRESS;
        }
        (100 * value.saturating_sub(offset) / total) as i32
    }
}

impl SearchLimit for RegularLimit {
    fn crossed(&mut self, solver: &mut Solver) -> bool {
        if self.crossed_flag || self.check(solver) {
            self.crossed_flag = true;
        }
        self.crossed_flag
    }

    fn init(&mut self, solver: &mut Solver) {
        self.branches_offset = solver.branches();
        self.failures_offset = solver.failures();
        self.solutions_offset = solver.solutions();
        self.duration_offset_ms = solver.wall_time_ms();
        self.check_count = 0;
        self.next_check = 0;
        self.last_elapsed_ms = 0;
        self.crossed_flag = false;
    }
}

impl SearchMonitor for RegularLimit {
    fn enter_search(&mut self, solver: &mut Solver) {
        self.init(solver);
    }

    fn exit_search(&mut self, solver: &mut Solver) {
        if self.cumulative {
            // Deduct what this search consumed from the shared budget.
            self.branches = self
                .branches
                .saturating_sub(solver.branches() - self.branches_offset);
            self.failures = self
                .failures
                .saturating_sub(solver.failures() - self.failures_offset);
            self.solutions = self
                .solutions
                .saturating_sub(solver.solutions() - self.solutions_offset);
            if self.duration_ms != UNLIMITED {
                self.duration_ms = self
                    .duration_ms
                    .saturating_sub(solver.wall_time_ms() - self.duration_offset_ms);
            }
        }
    }

    fn begin_next_decision(&mut self, solver: &mut Solver) -> PropagationResult {
        self.enforce(solver);
        Ok(())
    }

    fn refute_decision(&mut self, solver: &mut Solver, _d: &DecisionRef) -> PropagationResult {
        self.enforce(solver);
        Ok(())
    }

    fn periodic_check(&mut self, solver: &mut Solver) -> PropagationResult {
        self.enforce(solver);
        Ok(())
    }

    fn progress_percent(&mut self, solver: &mut Solver) -> i32 {
        let mut progress = Self::percent(solver.branches(), self.branches_offset, self.branches);
        progress = progress.max(Self::percent(
            solver.failures(),
            self.failures_offset,
            self.failures,
        ));
        progress = progress.max(Self::percent(
            solver.solutions(),
            self.solutions_offset,
            self.solutions,
        ));
        if self.duration_ms != UNLIMITED && self.duration_ms > 0 {
            let elapsed = solver.wall_time_ms().saturating_sub(self.duration_offset_ms);
            progress = progress.max((100 * elapsed / self.duration_ms) as i32);
        }
        progress
    }

    fn accept(&self, visitor: &mut dyn ModelVisitor) {
        visitor.begin_visit_extension("search_limit");
        visitor.visit_integer_argument("duration_ms", self.duration_ms.min(i64::MAX as u64) as i64);
        visitor.visit_integer_argument("branches", self.branches.min(i64::MAX as u64) as i64);
        visitor.visit_integer_argument("failures", self.failures.min(i64::MAX as u64) as i64);
        visitor.visit_integer_argument("solutions", self.solutions.min(i64::MAX as u64) as i64);
        visitor.visit_integer_argument("smart_time_check", self.smart_time_check as i64);
        visitor.visit_integer_argument("cumulative", self.cumulative as i64);
        visitor.end_visit_extension();
    }
}

/// The logical OR of two limits; both are checked on every call.
pub struct OrLimit {
    left: Box<dyn SearchLimit>,
    right: Box<dyn SearchLimit>,
}

impl OrLimit {
    pub fn new(left: Box<dyn SearchLimit>, right: Box<dyn SearchLimit>) -> Self {
        Self { left, right }
    }

    fn enforce(&mut self, solver: &mut Solver) {
        // Evaluate both sides so each keeps its bookkeeping current.
        let left = self.left.crossed(solver);
        let right = self.right.crossed(solver);
        if left || right {
            solver.finish_current_search();
        }
    }
}

impl SearchLimit for OrLimit {
    fn crossed(&mut self, solver: &mut Solver) -> bool {
        let left = self.left.crossed(solver);
        let right = self.right.crossed(solver);
        left || right
    }

    fn init(&mut self, solver: &mut Solver) {
        self.left.init(solver);
        self.right.init(solver);
    }
}

impl SearchMonitor for OrLimit {
    fn enter_search(&mut self, solver: &mut Solver) {
        self.left.enter_search(solver);
        self.right.enter_search(solver);
    }

    fn exit_search(&mut self, solver: &mut Solver) {
        self.left.exit_search(solver);
        self.right.exit_search(solver);
    }

    fn begin_next_decision(&mut self, solver: &mut Solver) -> PropagationResult {
        self.enforce(solver);
        Ok(())
    }

    fn refute_decision(&mut self, solver: &mut Solver, _d: &DecisionRef) -> PropagationResult {
        self.enforce(solver);
        Ok(())
    }

    fn periodic_check(&mut self, solver: &mut Solver) -> PropagationResult {
        self.enforce(solver);
        Ok(())
    }
}

/// A limit driven by a user callback.
pub struct CustomLimit {
    check: Box<dyn FnMut(&mut Solver) -> bool>,
}

impl CustomLimit {
    pub fn new(check: impl FnMut(&mut Solver) -> bool + 'static) -> Self {
        Self {
            check: Box::new(check),
        }
    }

    fn enforce(&mut self, solver: &mut Solver) {
        if (self.check)(solver) {
            solver.finish_current_search();
        }
    }
}

impl SearchLimit for CustomLimit {
    fn crossed(&mut self, solver: &mut Solver) -> bool {
        (self.check)(solver)
    }

    fn init(&mut self, _solver: &mut Solver) {}
}

impl SearchMonitor for CustomLimit {
    fn begin_next_decision(&mut self, solver: &mut Solver) -> PropagationResult {
        self.enforce(solver);
        Ok(())
    }

    fn periodic_check(&mut self, solver: &mut Solver) -> PropagationResult {
        self.enforce(solver);
        Ok(())
    }
}

/// Stops the search when the objective stops improving fast enough.
///
/// The average improvement per solution over the first `window` solutions
/// sets the reference rate; once the average over the sliding window drops
/// below `coefficient` times that reference, the limit is crossed.
pub struct ImprovementLimit {
    objective: VarId,
    maximize: bool,
    window: usize,
    coefficient: f64,
    last_value: Option<i64>,
    improvements: VecDeque<i64>,
    reference_rate: Option<f64>,
    crossed_flag: bool,
}

impl ImprovementLimit {
    pub fn new(objective: VarId, maximize: bool, window: usize, coefficient: f64) -> Self {
        assert!(window > 0, "improvement window must not be empty");
        Self {
            objective,
            maximize,
            window,
            coefficient,
            last_value: None,
            improvements: VecDeque::new(),
            reference_rate: None,
            crossed_flag: false,
        }
    }

    fn current_rate(&self) -> f64 {
        let total: i64 = self.improvements.iter().sum();
        total as f64 / self.improvements.len() as f64
    }
}

impl SearchLimit for ImprovementLimit {
    fn crossed(&mut self, _solver: &mut Solver) -> bool {
        self.crossed_flag
    }

    fn init(&mut self, _solver: &mut Solver) {
        self.last_value = None;
        self.improvements.clear();
        self.reference_rate = None;
        self.crossed_flag = false;
    }
}

impl SearchMonitor for ImprovementLimit {
    fn enter_search(&mut self, solver: &mut Solver) {
        self.init(solver);
    }

    fn at_solution(&mut self, solver: &mut Solver) -> bool {
        let value = solver.value(self.objective);
        if let Some(last) = self.last_value {
            let improvement = if self.maximize {
                value - last
            } else {
                last - value
            };
            self.improvements.push_back(improvement);
            if self.improvements.len() > self.window {
                self.improvements.pop_front();
            }
            if self.reference_rate.is_none() && self.improvements.len() == self.window {
                // The initial improving phase sets the bar.
                self.reference_rate = Some(self.current_rate());
            } else if let Some(reference) = self.reference_rate {
                if self.current_rate() < self.coefficient * reference {
                    self.crossed_flag = true;
                }
            }
        }
        self.last_value = Some(value);
        false
    }

    fn begin_next_decision(&mut self, solver: &mut Solver) -> PropagationResult {
        if self.crossed_flag {
            solver.finish_current_search();
        }
        Ok(())
    }

    fn periodic_check(&mut self, solver: &mut Solver) -> PropagationResult {
        if self.crossed_flag {
            solver.finish_current_search();
        }
        Ok(())
    }
}
