//! Symmetry breaking during search.
//!
//! Each symmetry breaker watches the assignment decisions taken on left
//! branches and declares, for each, the literal of the symmetrical
//! decision. When a decision is refuted, the conjunction of the still-open
//! left-branch guards implies the negation of the symmetrical decision;
//! the manager enforces that with a lazily added constraint.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::PropagationResult;
use crate::solver::constraint::{Constraint, ConstraintDescriptor};
use crate::solver::constraints::reified::{IsEqualCst, IsGreaterOrEqualCst, IsLessOrEqualCst};
use crate::solver::decision::{DecisionRef, DecisionVisitor};
use crate::solver::demon::DemonPriority;
use crate::solver::engine::{Solver, VarId};
use crate::solver::monitor::SearchMonitor;
use crate::solver::trail::RevCell;

/// Declares the symmetrical counterparts of assignment decisions.
///
/// When the search applies `var == value`, the breaker is visited and
/// should call one of the `add_*_clause` methods on the ops handle with
/// the *symmetrical* decision (e.g. for a board mirrored left-right, the
/// mirrored square and value).
pub trait SymmetryBreaker {
    fn on_set_variable_value(&mut self, ops: &mut SymmetryOps<'_>, var: VarId, value: i64);
}

/// Handle the manager passes to breakers while visiting a decision.
pub struct SymmetryOps<'a> {
    solver: &'a mut Solver,
    terms: Vec<VarId>,
}

impl SymmetryOps<'_> {
    pub fn solver(&mut self) -> &mut Solver {
        self.solver
    }

    /// Declares the literal `var == value` as the symmetrical decision.
    pub fn add_integer_variable_equal_value_clause(&mut self, var: VarId, value: i64) {
        let term = self.solver.make_bool_var("sym_eq");
        let _ = self.solver.add_constraint(IsEqualCst::new(var, value, term));
        self.terms.push(term);
    }

    /// Declares the literal `var >= value`.
    pub fn add_integer_variable_greater_or_equal_value_clause(&mut self, var: VarId, value: i64) {
        let term = self.solver.make_bool_var("sym_ge");
        let _ = self
            .solver
            .add_constraint(IsGreaterOrEqualCst::new(var, value, term));
        self.terms.push(term);
    }

    /// Declares the literal `var <= value`.
    pub fn add_integer_variable_less_or_equal_value_clause(&mut self, var: VarId, value: i64) {
        let term = self.solver.make_bool_var("sym_le");
        let _ = self
            .solver
            .add_constraint(IsLessOrEqualCst::new(var, value, term));
        self.terms.push(term);
    }
}

struct ClauseEntry {
    term: VarId,
    /// False while the guarding decision sits on its left branch.
    refuted: RevCell<bool>,
    decision: DecisionRef,
}

type ClauseStack = Rc<RefCell<Vec<ClauseEntry>>>;

/// Maintains one clause stack per breaker and posts the implied
/// constraints on refutation.
pub struct SymmetryManager {
    breakers: Vec<Rc<RefCell<dyn SymmetryBreaker>>>,
    clauses: Vec<ClauseStack>,
}

impl SymmetryManager {
    pub fn new(breakers: Vec<Rc<RefCell<dyn SymmetryBreaker>>>) -> Self {
        let clauses = breakers
            .iter()
            .map(|_| Rc::new(RefCell::new(Vec::new())))
            .collect();
        Self { breakers, clauses }
    }

    fn check_symmetries(
        &mut self,
        solver: &mut Solver,
        breaker_index: usize,
    ) -> PropagationResult {
        let stack = Rc::clone(&self.clauses[breaker_index]);
        let mut guard = Vec::new();
        {
            let entries = stack.borrow();
            let (last, earlier) = entries.split_last().unwrap();
            for entry in earlier {
                if !solver.rev_get_bool(entry.refuted) {
                    if solver.max(entry.term) == 0 {
                        // A premise is already false; the clause is vacuous.
                        return Ok(());
                    }
                    if solver.min(entry.term) == 0 {
                        guard.push(entry.term);
                    }
                }
            }
            guard.push(last.term);
        }
        {
            let mut entries = stack.borrow_mut();
            let last = entries.last_mut().unwrap();
            solver.rev_set_bool(last.refuted, true);
        }
        // Premises x_i == a_i and the symmetrical literal y cannot all
        // hold: at least one guard must be false.
        solver.add_constraint(NotAllTrue::new(guard))
    }
}

impl SearchMonitor for SymmetryManager {
    fn end_next_decision(&mut self, solver: &mut Solver, decision: Option<&DecisionRef>) {
        let Some(decision) = decision else { return };
        for (breaker, stack) in self.breakers.iter().zip(&self.clauses) {
            let terms = {
                let mut breaker = breaker.borrow_mut();
                let mut collector = TermCollector {
                    solver: &mut *solver,
                    breaker: &mut *breaker,
                    terms: Vec::new(),
                };
                decision.accept(&mut collector);
                collector.terms
            };
            for term in terms {
                let refuted = solver.rev_alloc_bool(false);
                stack.borrow_mut().push(ClauseEntry {
                    term,
                    refuted,
                    decision: decision.clone(),
                });
                let stack = Rc::clone(stack);
                solver.add_backtrack_action(move |_s| {
                    stack.borrow_mut().pop();
                }, false);
            }
        }
    }

    fn refute_decision(&mut self, solver: &mut Solver, decision: &DecisionRef) -> PropagationResult {
        for i in 0..self.breakers.len() {
            let matches = {
                let entries = self.clauses[i].borrow();
                entries
                    .last()
                    .map_or(false, |e| Rc::ptr_eq(&e.decision, decision))
            };
            if matches {
                self.check_symmetries(solver, i)?;
            }
        }
        Ok(())
    }
}

struct TermCollector<'a> {
    solver: &'a mut Solver,
    breaker: &'a mut dyn SymmetryBreaker,
    terms: Vec<VarId>,
}

impl DecisionVisitor for TermCollector<'_> {
    fn visit_set_variable_value(&mut self, var: VarId, value: i64) {
        let mut ops = SymmetryOps {
            solver: &mut *self.solver,
            terms: Vec::new(),
        };
        self.breaker.on_set_variable_value(&mut ops, var, value);
        self.terms.append(&mut ops.terms);
    }
}

/// At least one of the boolean variables is false.
#[derive(Debug, Clone)]
struct NotAllTrue {
    vars: Vec<VarId>,
}

impl NotAllTrue {
    fn new(vars: Vec<VarId>) -> Self {
        Self { vars }
    }

    fn propagate(solver: &mut Solver, vars: &[VarId]) -> PropagationResult {
        let mut open = None;
        let mut open_count = 0;
        for &v in vars {
            if solver.bound(v) {
                if solver.value(v) == 0 {
                    return Ok(());
                }
            } else {
                open = Some(v);
                open_count += 1;
            }
        }
        match (open, open_count) {
            (None, _) => solver.fail(),
            (Some(last), 1) => solver.set_value(last, 0),
            _ => Ok(()),
        }
    }
}

impl Constraint for NotAllTrue {
    fn post(&self, solver: &mut Solver) {
        let vars = Rc::new(self.vars.clone());
        let body = {
            let vars = Rc::clone(&vars);
            move |s: &mut Solver| Self::propagate(s, &vars)
        };
        let demon = solver.make_demon(DemonPriority::Normal, "not_all_true", body);
        for &v in self.vars.iter() {
            solver.when_bound(v, demon);
        }
    }

    fn initial_propagate(&self, solver: &mut Solver) -> PropagationResult {
        Self::propagate(solver, &self.vars)
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        let vars = self
            .vars
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" & ");
        ConstraintDescriptor {
            name: "NotAllTrue".to_string(),
            description: format!("!({vars})"),
        }
    }
}
