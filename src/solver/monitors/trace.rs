//! A monitor that logs every search event; installed by the `trace`
//! parameter.

use tracing::info;

use crate::error::PropagationResult;
use crate::solver::decision::DecisionRef;
use crate::solver::engine::Solver;
use crate::solver::monitor::SearchMonitor;

/// Logs one line per search event, tagged with a prefix.
pub struct SearchTrace {
    prefix: String,
}

impl SearchTrace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn line(&self, event: &str) {
        info!(target: "tangram::trace", "{}: {event}", self.prefix);
    }
}

impl SearchMonitor for SearchTrace {
    fn enter_search(&mut self, _solver: &mut Solver) {
        self.line("enter_search");
    }

    fn restart_search(&mut self, _solver: &mut Solver) {
        self.line("restart_search");
    }

    fn exit_search(&mut self, _solver: &mut Solver) {
        self.line("exit_search");
    }

    fn begin_next_decision(&mut self, _solver: &mut Solver) -> PropagationResult {
        self.line("begin_next_decision");
        Ok(())
    }

    fn end_next_decision(&mut self, _solver: &mut Solver, _decision: Option<&DecisionRef>) {
        self.line("end_next_decision");
    }

    fn apply_decision(&mut self, _solver: &mut Solver, decision: &DecisionRef) -> PropagationResult {
        self.line(&format!("apply_decision {decision:?}"));
        Ok(())
    }

    fn refute_decision(
        &mut self,
        _solver: &mut Solver,
        decision: &DecisionRef,
    ) -> PropagationResult {
        self.line(&format!("refute_decision {decision:?}"));
        Ok(())
    }

    fn begin_fail(&mut self, _solver: &mut Solver) {
        self.line("begin_fail");
    }

    fn end_fail(&mut self, _solver: &mut Solver) {
        self.line("end_fail");
    }

    fn begin_initial_propagation(&mut self, _solver: &mut Solver) {
        self.line("begin_initial_propagation");
    }

    fn end_initial_propagation(&mut self, _solver: &mut Solver) {
        self.line("end_initial_propagation");
    }

    fn accept_solution(&mut self, _solver: &mut Solver) -> bool {
        self.line("accept_solution");
        true
    }

    fn at_solution(&mut self, _solver: &mut Solver) -> bool {
        self.line("at_solution");
        false
    }

    fn no_more_solutions(&mut self, _solver: &mut Solver) {
        self.line("no_more_solutions");
    }

    fn local_optimum(&mut self, _solver: &mut Solver) -> bool {
        self.line("local_optimum");
        false
    }
}
