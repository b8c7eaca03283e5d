//! Objective management: the bound-tightening optimize monitor.

use tracing::debug;

use crate::error::PropagationResult;
use crate::solver::decision::DecisionRef;
use crate::solver::engine::{Solver, VarId};
use crate::solver::monitor::SearchMonitor;
use crate::solver::visitor::ModelVisitor;

/// Turns a satisfaction search into an optimization: each accepted
/// solution tightens the objective bound by `step`, and solutions that do
/// not strictly improve are vetoed.
pub struct OptimizeVar {
    var: VarId,
    step: i64,
    maximize: bool,
    best: i64,
    found_initial_solution: bool,
}

impl OptimizeVar {
    pub fn new(maximize: bool, var: VarId, step: i64) -> Self {
        assert!(step > 0, "optimization step must be positive");
        Self {
            var,
            step,
            maximize,
            best: if maximize { i64::MIN } else { i64::MAX },
            found_initial_solution: false,
        }
    }

    pub fn minimize(var: VarId, step: i64) -> Self {
        Self::new(false, var, step)
    }

    pub fn maximize(var: VarId, step: i64) -> Self {
        Self::new(true, var, step)
    }

    /// The best objective value seen in the current search.
    pub fn best(&self) -> i64 {
        self.best
    }

    pub fn objective_var(&self) -> VarId {
        self.var
    }

    fn apply_bound(&mut self, solver: &mut Solver) -> PropagationResult {
        if !self.found_initial_solution {
            return Ok(());
        }
        if self.maximize {
            solver.set_min(self.var, self.best.saturating_add(self.step))
        } else {
            solver.set_max(self.var, self.best.saturating_sub(self.step))
        }
    }
}

impl SearchMonitor for OptimizeVar {
    fn enter_search(&mut self, _solver: &mut Solver) {
        self.found_initial_solution = false;
        self.best = if self.maximize { i64::MIN } else { i64::MAX };
    }

    fn begin_next_decision(&mut self, solver: &mut Solver) -> PropagationResult {
        if solver.search_depth() == 0 {
            // Fresh descent (root or just after a restart).
            self.apply_bound(solver)?;
        }
        Ok(())
    }

    fn refute_decision(&mut self, solver: &mut Solver, _d: &DecisionRef) -> PropagationResult {
        self.apply_bound(solver)
    }

    fn accept_solution(&mut self, solver: &mut Solver) -> bool {
        if !self.found_initial_solution {
            return true;
        }
        let value = solver.value(self.var);
        if self.maximize {
            value > self.best
        } else {
            value < self.best
        }
    }

    fn at_solution(&mut self, solver: &mut Solver) -> bool {
        let value = solver.value(self.var);
        debug_assert!(
            !self.found_initial_solution
                || (self.maximize && value > self.best)
                || (!self.maximize && value < self.best),
            "accepted solution does not improve the objective"
        );
        self.best = value;
        self.found_initial_solution = true;
        debug!(objective = value, maximize = self.maximize, "objective improved");
        true
    }

    fn accept(&self, visitor: &mut dyn ModelVisitor) {
        visitor.begin_visit_extension("objective");
        visitor.visit_integer_argument("maximize", self.maximize as i64);
        visitor.visit_integer_argument("step", self.step);
        visitor.visit_integer_variable("var", self.var);
        visitor.end_visit_extension();
    }
}
