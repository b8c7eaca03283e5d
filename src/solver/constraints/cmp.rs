//! Small comparison constraints over variables and constants.

use crate::error::PropagationResult;
use crate::solver::constraint::{Constraint, ConstraintDescriptor};
use crate::solver::demon::DemonPriority;
use crate::solver::engine::{Solver, VarId};

/// `left != right`.
#[derive(Debug, Clone)]
pub struct NotEqual {
    pub left: VarId,
    pub right: VarId,
}

impl NotEqual {
    pub fn new(left: VarId, right: VarId) -> Self {
        Self { left, right }
    }

    fn propagate(solver: &mut Solver, left: VarId, right: VarId) -> PropagationResult {
        if solver.bound(left) {
            solver.remove_value(right, solver.value(left))?;
        }
        if solver.bound(right) {
            solver.remove_value(left, solver.value(right))?;
        }
        Ok(())
    }
}

impl Constraint for NotEqual {
    fn post(&self, solver: &mut Solver) {
        let (left, right) = (self.left, self.right);
        let demon = solver.make_demon(DemonPriority::Normal, "not_equal", move |s| {
            Self::propagate(s, left, right)
        });
        solver.when_bound(left, demon);
        solver.when_bound(right, demon);
    }

    fn initial_propagate(&self, solver: &mut Solver) -> PropagationResult {
        Self::propagate(solver, self.left, self.right)
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        ConstraintDescriptor {
            name: "NotEqual".to_string(),
            description: format!("{} != {}", self.left, self.right),
        }
    }
}

/// `var >= value`. A one-shot bound: monotone narrowing makes any demon
/// redundant.
#[derive(Debug, Clone)]
pub struct GreaterOrEqualCst {
    pub var: VarId,
    pub value: i64,
}

impl GreaterOrEqualCst {
    pub fn new(var: VarId, value: i64) -> Self {
        Self { var, value }
    }
}

impl Constraint for GreaterOrEqualCst {
    fn post(&self, _solver: &mut Solver) {}

    fn initial_propagate(&self, solver: &mut Solver) -> PropagationResult {
        solver.set_min(self.var, self.value)
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        ConstraintDescriptor {
            name: "GreaterOrEqualCst".to_string(),
            description: format!("{} >= {}", self.var, self.value),
        }
    }
}

/// `var <= value`.
#[derive(Debug, Clone)]
pub struct LessOrEqualCst {
    pub var: VarId,
    pub value: i64,
}

impl LessOrEqualCst {
    pub fn new(var: VarId, value: i64) -> Self {
        Self { var, value }
    }
}

impl Constraint for LessOrEqualCst {
    fn post(&self, _solver: &mut Solver) {}

    fn initial_propagate(&self, solver: &mut Solver) -> PropagationResult {
        solver.set_max(self.var, self.value)
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        ConstraintDescriptor {
            name: "LessOrEqualCst".to_string(),
            description: format!("{} <= {}", self.var, self.value),
        }
    }
}

/// `var != value`.
#[derive(Debug, Clone)]
pub struct NotEqualCst {
    pub var: VarId,
    pub value: i64,
}

impl NotEqualCst {
    pub fn new(var: VarId, value: i64) -> Self {
        Self { var, value }
    }
}

impl Constraint for NotEqualCst {
    fn post(&self, _solver: &mut Solver) {}

    fn initial_propagate(&self, solver: &mut Solver) -> PropagationResult {
        solver.remove_value(self.var, self.value)
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        ConstraintDescriptor {
            name: "NotEqualCst".to_string(),
            description: format!("{} != {}", self.var, self.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_equal_waits_for_a_binding() {
        let mut s = Solver::new("cmp");
        let x = s.make_int_var(0, 5, "x");
        let y = s.make_int_var(0, 5, "y");
        s.add_constraint(NotEqual::new(x, y)).unwrap();
        s.post_pending_constraints();
        s.run_initial_propagation().unwrap();
        assert_eq!(s.size(y), 6);
        s.set_value(x, 3).unwrap();
        assert!(!s.contains(y, 3));
    }

    #[test]
    fn constant_bounds_apply_once() {
        let mut s = Solver::new("cmp");
        let x = s.make_int_var(0, 10, "x");
        s.add_constraint(GreaterOrEqualCst::new(x, 4)).unwrap();
        s.add_constraint(LessOrEqualCst::new(x, 7)).unwrap();
        s.add_constraint(NotEqualCst::new(x, 5)).unwrap();
        s.run_initial_propagation().unwrap();
        assert_eq!(s.min(x), 4);
        assert_eq!(s.max(x), 7);
        assert!(!s.contains(x, 5));
    }
}
