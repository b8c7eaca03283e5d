//! Decisions, decision builders, and their combinators.
//!
//! A decision is a two-branch choice point: `apply` commits the left
//! branch, `refute` the right, and either may fail. A decision builder
//! produces the next decision for the current solver state; returning
//! `None` declares the subtree a solution candidate.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{Failure, PropagationResult};
use crate::solver::assignment::Assignment;
use crate::solver::engine::{Solver, VarId};
use crate::solver::heuristics::value::{IntValueStrategy, ValueSelector};
use crate::solver::heuristics::variable::{IntVarStrategy, VariableSelector};
use crate::solver::monitor::{monitor, MonitorRef};
use crate::solver::monitors::collector::SolutionCollector;
use crate::solver::objective::OptimizeVar;
use crate::solver::trail::RevCell;

/// Visitor over the structure of a decision; symmetry breakers use this to
/// recognize assignments.
#[allow(unused_variables)]
pub trait DecisionVisitor {
    fn visit_set_variable_value(&mut self, var: VarId, value: i64) {}
    fn visit_split_variable_domain(&mut self, var: VarId, value: i64, lower_first: bool) {}
    fn visit_unknown_decision(&mut self) {}
}

/// A two-branch choice point.
pub trait Decision: std::fmt::Debug {
    fn apply(&self, solver: &mut Solver) -> PropagationResult;
    fn refute(&self, solver: &mut Solver) -> PropagationResult;
    fn accept(&self, visitor: &mut dyn DecisionVisitor) {
        visitor.visit_unknown_decision();
    }
}

pub type DecisionRef = Rc<dyn Decision>;

/// Produces decisions for the search driver. `next` returning `Ok(None)`
/// declares the current state a solution candidate.
pub trait DecisionBuilder: std::fmt::Debug {
    fn next(&self, solver: &mut Solver) -> PropagationResult<Option<DecisionRef>>;
}

pub type DecisionBuilderRef = Rc<dyn DecisionBuilder>;

/// Wraps a decision builder value into the handle form the search entry
/// points take.
pub fn builder<B: DecisionBuilder + 'static>(b: B) -> DecisionBuilderRef {
    Rc::new(b)
}

// ----- concrete decisions -----

/// Left branch `var == value`, right branch `var != value`.
#[derive(Debug)]
pub struct AssignVariableValue {
    pub var: VarId,
    pub value: i64,
}

impl Decision for AssignVariableValue {
    fn apply(&self, solver: &mut Solver) -> PropagationResult {
        solver.set_value(self.var, self.value)
    }

    fn refute(&self, solver: &mut Solver) -> PropagationResult {
        solver.remove_value(self.var, self.value)
    }

    fn accept(&self, visitor: &mut dyn DecisionVisitor) {
        visitor.visit_set_variable_value(self.var, self.value);
    }
}

/// Splits a domain at `value`: one branch keeps `[min, value]`, the other
/// `[value + 1, max]`; `lower_first` picks which is applied first.
#[derive(Debug)]
pub struct SplitVariableDomain {
    pub var: VarId,
    pub value: i64,
    pub lower_first: bool,
}

impl SplitVariableDomain {
    fn lower(&self, solver: &mut Solver) -> PropagationResult {
        solver.set_max(self.var, self.value)
    }

    fn upper(&self, solver: &mut Solver) -> PropagationResult {
        solver.set_min(self.var, self.value + 1)
    }
}

impl Decision for SplitVariableDomain {
    fn apply(&self, solver: &mut Solver) -> PropagationResult {
        if self.lower_first {
            self.lower(solver)
        } else {
            self.upper(solver)
        }
    }

    fn refute(&self, solver: &mut Solver) -> PropagationResult {
        if self.lower_first {
            self.upper(solver)
        } else {
            self.lower(solver)
        }
    }

    fn accept(&self, visitor: &mut dyn DecisionVisitor) {
        visitor.visit_split_variable_domain(self.var, self.value, self.lower_first);
    }
}

// ----- the standard phase builder -----

/// The standard assign/split decision builder over a fixed variable list,
/// parameterized by a variable-selection and a value-selection strategy.
pub struct Phase {
    vars: Vec<VarId>,
    variable_selector: Box<dyn VariableSelector>,
    value_strategy: IntValueStrategy,
    value_selector: Box<dyn ValueSelector>,
}

impl std::fmt::Debug for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Phase")
            .field("vars", &self.vars.len())
            .field("value_strategy", &self.value_strategy)
            .finish()
    }
}

impl Phase {
    pub fn new(vars: &[VarId], var_strategy: IntVarStrategy, value_strategy: IntValueStrategy) -> Self {
        Self {
            vars: vars.to_vec(),
            variable_selector: var_strategy.selector(),
            value_strategy,
            value_selector: value_strategy.selector(),
        }
    }
}

impl DecisionBuilder for Phase {
    fn next(&self, solver: &mut Solver) -> PropagationResult<Option<DecisionRef>> {
        let Some(var) = self.variable_selector.select(solver, &self.vars) else {
            return Ok(None);
        };
        match self.value_strategy {
            IntValueStrategy::SplitLowerHalf | IntValueStrategy::SplitUpperHalf => {
                let value = (solver.min(var) + solver.max(var)) / 2;
                Ok(Some(Rc::new(SplitVariableDomain {
                    var,
                    value,
                    lower_first: self.value_strategy == IntValueStrategy::SplitLowerHalf,
                })))
            }
            _ => {
                let value = self.value_selector.select(solver, var);
                Ok(Some(Rc::new(AssignVariableValue { var, value })))
            }
        }
    }
}

// ----- combinators -----

/// Sequential composition: each builder plays until it has nothing left to
/// decide, then hands over to the next.
#[derive(Debug)]
pub struct Compose {
    builders: Vec<DecisionBuilderRef>,
}

impl Compose {
    pub fn new(builders: Vec<DecisionBuilderRef>) -> Self {
        Self { builders }
    }
}

impl DecisionBuilder for Compose {
    fn next(&self, solver: &mut Solver) -> PropagationResult<Option<DecisionRef>> {
        for b in &self.builders {
            if let Some(d) = b.next(solver)? {
                return Ok(Some(d));
            }
        }
        Ok(None)
    }
}

/// Alternatives: explores the first builder's subtree; once it is
/// exhausted, moves on to the next, failing when all are spent.
pub struct TryAll {
    builders: Vec<DecisionBuilderRef>,
    state: RefCell<Option<TryState>>,
}

#[derive(Clone, Copy)]
struct TryState {
    index: RevCell<i64>,
    branched: RevCell<bool>,
}

impl std::fmt::Debug for TryAll {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TryAll")
            .field("alternatives", &self.builders.len())
            .finish()
    }
}

impl TryAll {
    pub fn new(builders: Vec<DecisionBuilderRef>) -> Self {
        Self {
            builders,
            state: RefCell::new(None),
        }
    }
}

impl DecisionBuilder for TryAll {
    fn next(&self, solver: &mut Solver) -> PropagationResult<Option<DecisionRef>> {
        if self.builders.is_empty() {
            return Ok(None);
        }
        let state = {
            let mut slot = self.state.borrow_mut();
            *slot.get_or_insert_with(|| TryState {
                index: solver.rev_alloc_i64(0),
                branched: solver.rev_alloc_bool(false),
            })
        };
        let index = solver.rev_get_i64(state.index) as usize;
        if index >= self.builders.len() {
            return Err(Failure);
        }
        if !solver.rev_get_bool(state.branched) {
            return Ok(Some(Rc::new(TryDecision {
                index: state.index,
                branched: state.branched,
                alternatives: self.builders.len(),
            })));
        }
        self.builders[index].next(solver)
    }
}

/// The branching decision of [`TryAll`]: the left branch commits to the
/// current alternative, the right branch advances to the next one.
#[derive(Debug)]
struct TryDecision {
    index: RevCell<i64>,
    branched: RevCell<bool>,
    alternatives: usize,
}

impl Decision for TryDecision {
    fn apply(&self, solver: &mut Solver) -> PropagationResult {
        solver.rev_set_bool(self.branched, true);
        Ok(())
    }

    fn refute(&self, solver: &mut Solver) -> PropagationResult {
        let next = solver.rev_get_i64(self.index) + 1;
        if next as usize >= self.alternatives {
            return solver.fail();
        }
        solver.rev_set_i64(self.index, next);
        Ok(())
    }
}

/// Collapses a nested search to a single decision: runs `db` on a fresh
/// search frame and keeps the first solution's state in place, failing if
/// there is none.
pub struct SolveOnce {
    db: DecisionBuilderRef,
    monitors: Vec<MonitorRef>,
}

impl std::fmt::Debug for SolveOnce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SolveOnce({:?})", self.db)
    }
}

impl SolveOnce {
    pub fn new(db: DecisionBuilderRef) -> Self {
        Self {
            db,
            monitors: Vec::new(),
        }
    }

    pub fn with_monitors(db: DecisionBuilderRef, monitors: Vec<MonitorRef>) -> Self {
        Self { db, monitors }
    }
}

impl DecisionBuilder for SolveOnce {
    fn next(&self, solver: &mut Solver) -> PropagationResult<Option<DecisionRef>> {
        if solver.solve_and_commit(self.db.clone(), self.monitors.clone()) {
            Ok(None)
        } else {
            Err(Failure)
        }
    }
}

/// Collapses a nested optimization to a single decision: optimizes `db`
/// against the prototype's objective and imposes the best assignment
/// found.
pub struct NestedOptimize {
    db: DecisionBuilderRef,
    prototype: Assignment,
    maximize: bool,
    step: i64,
    monitors: Vec<MonitorRef>,
}

impl std::fmt::Debug for NestedOptimize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "NestedOptimize(db = {:?}, maximize = {}, step = {})",
            self.db, self.maximize, self.step
        )
    }
}

impl NestedOptimize {
    pub fn new(db: DecisionBuilderRef, prototype: Assignment, maximize: bool, step: i64) -> Self {
        Self::with_monitors(db, prototype, maximize, step, Vec::new())
    }

    pub fn with_monitors(
        db: DecisionBuilderRef,
        prototype: Assignment,
        maximize: bool,
        step: i64,
        monitors: Vec<MonitorRef>,
    ) -> Self {
        assert!(
            prototype.has_objective(),
            "nested optimization needs an objective in its prototype"
        );
        Self {
            db,
            prototype,
            maximize,
            step,
            monitors,
        }
    }
}

impl DecisionBuilder for NestedOptimize {
    fn next(&self, solver: &mut Solver) -> PropagationResult<Option<DecisionRef>> {
        let objective = self.prototype.objective_var().unwrap();
        let collector = Rc::new(RefCell::new(SolutionCollector::last(&self.prototype)));
        let optimize = monitor(OptimizeVar::new(self.maximize, objective, self.step));
        let mut monitors = self.monitors.clone();
        monitors.push(collector.clone() as MonitorRef);
        monitors.push(optimize);
        solver.solve(self.db.clone(), monitors);
        let best = {
            let c = collector.borrow();
            if c.solution_count() == 0 {
                return Err(Failure);
            }
            c.solution(0).clone()
        };
        best.restore(solver)?;
        Ok(None)
    }
}
