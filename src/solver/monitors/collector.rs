//! Solution collectors: monitors that deep-copy accepted solutions,
//! restricted to a prototype assignment.

use crate::solver::assignment::Assignment;
use crate::solver::engine::{Solver, VarId};
use crate::solver::monitor::SearchMonitor;

/// What a collector keeps as solutions arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CollectMode {
    First,
    Last,
    /// Keep the single solution with the best objective.
    BestValue { maximize: bool },
    /// Keep the `n` best solutions by objective, best first.
    NBest { n: usize, maximize: bool },
    All,
}

/// One captured solution with the solver counters at capture time.
#[derive(Debug, Clone)]
pub struct CollectedSolution {
    pub assignment: Assignment,
    pub wall_time_ms: u64,
    pub branches: u64,
    pub failures: u64,
}

/// Stores deep copies of accepted solutions, restricted to a prototype.
///
/// The five collection policies of the classic solver are covered by the
/// constructors: [`first`](Self::first), [`last`](Self::last),
/// [`best_value`](Self::best_value), [`n_best`](Self::n_best), and
/// [`all`](Self::all).
pub struct SolutionCollector {
    prototype: Assignment,
    mode: CollectMode,
    solutions: Vec<CollectedSolution>,
    done: bool,
}

impl SolutionCollector {
    fn new(prototype: &Assignment, mode: CollectMode) -> Self {
        if matches!(
            mode,
            CollectMode::BestValue { .. } | CollectMode::NBest { .. }
        ) {
            assert!(
                prototype.has_objective(),
                "objective-ranked collectors need an objective in the prototype"
            );
        }
        Self {
            prototype: prototype.clone(),
            mode,
            solutions: Vec::new(),
            done: false,
        }
    }

    /// Keeps only the first solution.
    pub fn first(prototype: &Assignment) -> Self {
        Self::new(prototype, CollectMode::First)
    }

    /// Keeps only the most recent solution.
    pub fn last(prototype: &Assignment) -> Self {
        Self::new(prototype, CollectMode::Last)
    }

    /// Keeps the solution with the best objective value.
    pub fn best_value(prototype: &Assignment, maximize: bool) -> Self {
        Self::new(prototype, CollectMode::BestValue { maximize })
    }

    /// Keeps the `n` solutions with the best objective values, best first.
    pub fn n_best(prototype: &Assignment, n: usize, maximize: bool) -> Self {
        assert!(n > 0, "n_best collector with n == 0");
        Self::new(prototype, CollectMode::NBest { n, maximize })
    }

    /// Keeps every solution, in discovery order.
    pub fn all(prototype: &Assignment) -> Self {
        Self::new(prototype, CollectMode::All)
    }

    pub fn solution_count(&self) -> usize {
        self.solutions.len()
    }

    pub fn solution(&self, n: usize) -> &Assignment {
        &self.solutions[n].assignment
    }

    pub fn collected(&self, n: usize) -> &CollectedSolution {
        &self.solutions[n]
    }

    /// The stored value of `var` in solution `n`.
    pub fn value(&self, n: usize, var: VarId) -> i64 {
        self.solutions[n].assignment.value(var)
    }

    pub fn objective_value(&self, n: usize) -> i64 {
        self.solutions[n].assignment.objective_value()
    }

    pub fn wall_time_ms(&self, n: usize) -> u64 {
        self.solutions[n].wall_time_ms
    }

    pub fn branches(&self, n: usize) -> u64 {
        self.solutions[n].branches
    }

    pub fn failures(&self, n: usize) -> u64 {
        self.solutions[n].failures
    }

    fn capture(&self, solver: &Solver) -> CollectedSolution {
        let mut assignment = Assignment::from_prototype(&self.prototype);
        assignment.store(solver);
        CollectedSolution {
            assignment,
            wall_time_ms: solver.wall_time_ms(),
            branches: solver.branches(),
            failures: solver.failures(),
        }
    }

    fn rank(&self, a: &Assignment, maximize: bool) -> i64 {
        let value = a.objective_value();
        if maximize {
            -value
        } else {
            value
        }
    }
}

impl SearchMonitor for SolutionCollector {
    fn enter_search(&mut self, _solver: &mut Solver) {
        self.solutions.clear();
        self.done = false;
    }

    fn at_solution(&mut self, solver: &mut Solver) -> bool {
        match self.mode {
            CollectMode::First => {
                if !self.done {
                    self.solutions.push(self.capture(solver));
                    self.done = true;
                }
                false
            }
            CollectMode::Last => {
                let captured = self.capture(solver);
                self.solutions.clear();
                self.solutions.push(captured);
                true
            }
            CollectMode::BestValue { maximize } => {
                let captured = self.capture(solver);
                let better = match self.solutions.first() {
                    None => true,
                    Some(best) => {
                        self.rank(&captured.assignment, maximize)
                            < self.rank(&best.assignment, maximize)
                    }
                };
                if better {
                    self.solutions.clear();
                    self.solutions.push(captured);
                }
                true
            }
            CollectMode::NBest { n, maximize } => {
                self.solutions.push(self.capture(solver));
                self.solutions.sort_by_key(|s| {
                    let value = s.assignment.objective_value();
                    if maximize {
                        -value
                    } else {
                        value
                    }
                });
                self.solutions.truncate(n);
                true
            }
            CollectMode::All => {
                self.solutions.push(self.capture(solver));
                true
            }
        }
    }
}
