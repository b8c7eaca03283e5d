//! Assignments: detachable snapshots of variable values.
//!
//! An assignment holds stored bounds for a chosen subset of variables plus
//! an optional objective element. Collectors deep-copy assignments at
//! capture time; nested searches and local-search state restore them onto
//! a solver later.

use serde::{Deserialize, Serialize};

use crate::error::PropagationResult;
use crate::solver::engine::{Solver, VarId};

/// One variable's slot in an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntVarElement {
    pub var: VarId,
    pub min: i64,
    pub max: i64,
    /// Deactivated elements are skipped by `store` and `restore`.
    pub activated: bool,
}

impl IntVarElement {
    fn new(var: VarId) -> Self {
        Self {
            var,
            min: 0,
            max: 0,
            activated: true,
        }
    }

    pub fn bound(&self) -> bool {
        self.min == self.max
    }
}

/// A detachable snapshot of a subset of variables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    elements: Vec<IntVarElement>,
    objective: Option<IntVarElement>,
}

impl Assignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty assignment with the same structure as `prototype`.
    pub fn from_prototype(prototype: &Assignment) -> Self {
        prototype.clone()
    }

    /// Adds a variable slot. Adding the same variable twice is a modeling
    /// bug.
    pub fn add(&mut self, var: VarId) -> &mut Self {
        assert!(
            self.find(var).is_none(),
            "variable {var} added to assignment twice"
        );
        self.elements.push(IntVarElement::new(var));
        self
    }

    pub fn add_all(&mut self, vars: &[VarId]) -> &mut Self {
        for &v in vars {
            self.add(v);
        }
        self
    }

    /// Declares `var` the objective of this assignment.
    pub fn add_objective(&mut self, var: VarId) -> &mut Self {
        self.objective = Some(IntVarElement::new(var));
        self
    }

    pub fn has_objective(&self) -> bool {
        self.objective.is_some()
    }

    pub fn objective_var(&self) -> Option<VarId> {
        self.objective.as_ref().map(|e| e.var)
    }

    /// The stored objective value; the objective must be stored and bound.
    pub fn objective_value(&self) -> i64 {
        let element = self.objective.as_ref().expect("assignment has no objective");
        assert!(element.bound(), "objective was not stored bound");
        element.min
    }

    fn find(&self, var: VarId) -> Option<usize> {
        self.elements.iter().position(|e| e.var == var)
    }

    pub fn contains(&self, var: VarId) -> bool {
        self.find(var).is_some()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn vars(&self) -> impl Iterator<Item = VarId> + '_ {
        self.elements.iter().map(|e| e.var)
    }

    pub fn elements(&self) -> &[IntVarElement] {
        &self.elements
    }

    /// The stored value of a bound element.
    pub fn value(&self, var: VarId) -> i64 {
        let element = &self.elements[self.find(var).expect("variable not in assignment")];
        assert!(element.bound(), "stored element is not bound");
        element.min
    }

    pub fn set_value(&mut self, var: VarId, value: i64) {
        let i = self.find(var).expect("variable not in assignment");
        self.elements[i].min = value;
        self.elements[i].max = value;
    }

    pub fn activate(&mut self, var: VarId) {
        let i = self.find(var).expect("variable not in assignment");
        self.elements[i].activated = true;
    }

    pub fn deactivate(&mut self, var: VarId) {
        let i = self.find(var).expect("variable not in assignment");
        self.elements[i].activated = false;
    }

    pub fn activated(&self, var: VarId) -> bool {
        self.elements[self.find(var).expect("variable not in assignment")].activated
    }

    /// Reads the current bounds of every activated element from the
    /// solver.
    pub fn store(&mut self, solver: &Solver) {
        for e in &mut self.elements {
            if e.activated {
                e.min = solver.min(e.var);
                e.max = solver.max(e.var);
            }
        }
        if let Some(e) = &mut self.objective {
            if e.activated {
                e.min = solver.min(e.var);
                e.max = solver.max(e.var);
            }
        }
    }

    /// Imposes the stored bounds of every activated element on the solver.
    pub fn restore(&self, solver: &mut Solver) -> PropagationResult {
        solver.with_frozen_queue(|s| {
            for e in &self.elements {
                if e.activated {
                    s.set_range(e.var, e.min, e.max)?;
                }
            }
            Ok(())
        })
    }
}

impl Solver {
    /// Imposes `assignment` on a scratch subtree and reports whether
    /// propagation accepts it. The solver state is unwound afterwards.
    pub fn check_assignment(&mut self, assignment: &Assignment) -> bool {
        self.post_pending_constraints();
        let depth = self.trail.depth();
        self.push_state(crate::solver::trail::MarkerKind::SimpleMarker);
        let outcome = self
            .run_initial_propagation()
            .and_then(|_| assignment.restore(self));
        self.unwind_to_depth(depth);
        self.sync_touched_vars();
        outcome.is_ok()
    }
}
