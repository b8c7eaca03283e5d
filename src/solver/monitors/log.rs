//! The search log: one line per solution plus a configurable periodic
//! line, emitted through `tracing`.

use tracing::info;

use crate::solver::engine::{Solver, VarId};
use crate::solver::monitor::{SearchMonitor, NO_PROGRESS};

/// Periodic progress logging for a search.
///
/// Prints a line at every solution and every `period` branches, with an
/// optional objective variable and an optional user display callback whose
/// output is appended to each solution line.
pub struct SearchLog {
    period: u64,
    objective: Option<VarId>,
    display: Option<Box<dyn Fn(&Solver) -> String>>,
    solution_counter: u64,
    tick_ms: u64,
    objective_min: i64,
    objective_max: i64,
    max_depth: usize,
    start_ms: u64,
}

impl SearchLog {
    pub fn new(period: u64) -> Self {
        Self {
            period: period.max(1),
            objective: None,
            display: None,
            solution_counter: 0,
            tick_ms: 0,
            objective_min: i64::MAX,
            objective_max: i64::MIN,
            max_depth: 0,
            start_ms: 0,
        }
    }

    /// Logs the value of `objective` on each solution line.
    pub fn with_objective(mut self, objective: VarId) -> Self {
        self.objective = Some(objective);
        self
    }

    /// Appends the callback's output to each solution line.
    pub fn with_display(mut self, display: impl Fn(&Solver) -> String + 'static) -> Self {
        self.display = Some(Box::new(display));
        self
    }

    fn elapsed_ms(&self, solver: &Solver) -> u64 {
        solver.wall_time_ms().saturating_sub(self.start_ms)
    }

    fn output_progress(&mut self, solver: &mut Solver) {
        let elapsed = self.elapsed_ms(solver);
        let progress = solver.top_progress_percent();
        let mut line = format!(
            "{} branches, {} ms, {} failures, max depth {}",
            solver.branches(),
            elapsed,
            solver.failures(),
            self.max_depth,
        );
        if self.objective_min != i64::MAX {
            line.push_str(&format!(
                ", objective minimum = {}, objective maximum = {}",
                self.objective_min, self.objective_max
            ));
        }
        if progress != NO_PROGRESS {
            line.push_str(&format!(", limit = {progress}%"));
        }
        info!(target: "tangram::search", "{line}");
    }
}

impl SearchMonitor for SearchLog {
    fn enter_search(&mut self, solver: &mut Solver) {
        self.start_ms = solver.wall_time_ms();
        self.solution_counter = 0;
        self.objective_min = i64::MAX;
        self.objective_max = i64::MIN;
        self.max_depth = 0;
        info!(target: "tangram::search", solver = %solver.name(), "start search");
    }

    fn exit_search(&mut self, solver: &mut Solver) {
        let ms = self.elapsed_ms(solver).max(1);
        let branches = solver.branches();
        info!(
            target: "tangram::search",
            "end search (time = {ms} ms, branches = {branches}, failures = {}, speed = {} branches/s)",
            solver.failures(),
            branches * 1000 / ms,
        );
    }

    fn begin_initial_propagation(&mut self, solver: &mut Solver) {
        self.tick_ms = solver.wall_time_ms();
    }

    fn end_initial_propagation(&mut self, solver: &mut Solver) {
        let delta = solver.wall_time_ms().saturating_sub(self.tick_ms);
        info!(
            target: "tangram::search",
            "root node processed (time = {delta} ms, constraints = {})",
            solver.constraint_count(),
        );
    }

    fn at_solution(&mut self, solver: &mut Solver) -> bool {
        self.max_depth = self.max_depth.max(solver.search_depth());
        let mut objective_part = String::new();
        if let Some(objective) = self.objective {
            let current = solver.value(objective);
            objective_part = format!("objective = {current}, ");
            if current < self.objective_min {
                self.objective_min = current;
            }
            if current > self.objective_max {
                self.objective_max = current;
            }
        }
        let mut line = format!(
            "solution #{} ({}time = {} ms, branches = {}, failures = {}, depth = {}",
            self.solution_counter,
            objective_part,
            self.elapsed_ms(solver),
            solver.branches(),
            solver.failures(),
            solver.search_depth(),
        );
        if solver.neighbors() != 0 {
            line.push_str(&format!(
                ", neighbors = {}, accepted neighbors = {}",
                solver.neighbors(),
                solver.accepted_neighbors(),
            ));
        }
        line.push(')');
        self.solution_counter += 1;
        info!(target: "tangram::search", "{line}");
        if let Some(display_fn) = &self.display {
            let rendered = display_fn(solver);
            info!(target: "tangram::search", "{}", rendered);
        }
        false
    }

    fn apply_decision(
        &mut self,
        solver: &mut Solver,
        _decision: &crate::solver::decision::DecisionRef,
    ) -> crate::error::PropagationResult {
        self.max_depth = self.max_depth.max(solver.search_depth());
        let branches = solver.branches();
        if branches > 0 && branches % self.period == 0 {
            self.output_progress(solver);
        }
        Ok(())
    }

    fn refute_decision(
        &mut self,
        solver: &mut Solver,
        _decision: &crate::solver::decision::DecisionRef,
    ) -> crate::error::PropagationResult {
        let branches = solver.branches();
        if branches > 0 && branches % self.period == 0 {
            self.output_progress(solver);
        }
        Ok(())
    }

    fn no_more_solutions(&mut self, solver: &mut Solver) {
        info!(
            target: "tangram::search",
            "finished search tree (time = {} ms, branches = {}, failures = {})",
            self.elapsed_ms(solver),
            solver.branches(),
            solver.failures(),
        );
    }
}
