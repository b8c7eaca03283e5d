//! Reified constraints: a boolean target variable reflects whether a
//! condition holds, and forcing the target imposes (or forbids) it.
//!
//! These are the building blocks the metaheuristics assemble their
//! aspiration and tabu criteria from.

use std::rc::Rc;

use crate::error::PropagationResult;
use crate::solver::constraint::{Constraint, ConstraintDescriptor};
use crate::solver::demon::DemonPriority;
use crate::solver::engine::{Solver, VarId};

/// `target == 1 ⇔ var == value`.
#[derive(Debug, Clone)]
pub struct IsEqualCst {
    pub var: VarId,
    pub value: i64,
    pub target: VarId,
}

impl IsEqualCst {
    pub fn new(var: VarId, value: i64, target: VarId) -> Self {
        Self { var, value, target }
    }

    fn propagate(solver: &mut Solver, var: VarId, value: i64, target: VarId) -> PropagationResult {
        if solver.bound(target) {
            if solver.value(target) == 1 {
                solver.set_value(var, value)
            } else {
                solver.remove_value(var, value)
            }
        } else if !solver.contains(var, value) {
            solver.set_value(target, 0)
        } else if solver.bound(var) {
            solver.set_value(target, 1)
        } else {
            Ok(())
        }
    }
}

impl Constraint for IsEqualCst {
    fn post(&self, solver: &mut Solver) {
        let (var, value, target) = (self.var, self.value, self.target);
        let demon = solver.make_demon(DemonPriority::Normal, "is_equal_cst", move |s| {
            Self::propagate(s, var, value, target)
        });
        solver.when_domain(var, demon);
        solver.when_bound(target, demon);
    }

    fn initial_propagate(&self, solver: &mut Solver) -> PropagationResult {
        Self::propagate(solver, self.var, self.value, self.target)
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        ConstraintDescriptor {
            name: "IsEqualCst".to_string(),
            description: format!("{} <=> ({} == {})", self.target, self.var, self.value),
        }
    }
}

/// `target == 1 ⇔ var != value`.
#[derive(Debug, Clone)]
pub struct IsDifferentCst {
    pub var: VarId,
    pub value: i64,
    pub target: VarId,
}

impl IsDifferentCst {
    pub fn new(var: VarId, value: i64, target: VarId) -> Self {
        Self { var, value, target }
    }

    fn propagate(solver: &mut Solver, var: VarId, value: i64, target: VarId) -> PropagationResult {
        if solver.bound(target) {
            if solver.value(target) == 1 {
                solver.remove_value(var, value)
            } else {
                solver.set_value(var, value)
            }
        } else if !solver.contains(var, value) {
            solver.set_value(target, 1)
        } else if solver.bound(var) {
            solver.set_value(target, 0)
        } else {
            Ok(())
        }
    }
}

impl Constraint for IsDifferentCst {
    fn post(&self, solver: &mut Solver) {
        let (var, value, target) = (self.var, self.value, self.target);
        let demon = solver.make_demon(DemonPriority::Normal, "is_different_cst", move |s| {
            Self::propagate(s, var, value, target)
        });
        solver.when_domain(var, demon);
        solver.when_bound(target, demon);
    }

    fn initial_propagate(&self, solver: &mut Solver) -> PropagationResult {
        Self::propagate(solver, self.var, self.value, self.target)
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        ConstraintDescriptor {
            name: "IsDifferentCst".to_string(),
            description: format!("{} <=> ({} != {})", self.target, self.var, self.value),
        }
    }
}

/// `target == 1 ⇔ var >= value`.
#[derive(Debug, Clone)]
pub struct IsGreaterOrEqualCst {
    pub var: VarId,
    pub value: i64,
    pub target: VarId,
}

impl IsGreaterOrEqualCst {
    pub fn new(var: VarId, value: i64, target: VarId) -> Self {
        Self { var, value, target }
    }

    fn propagate(solver: &mut Solver, var: VarId, value: i64, target: VarId) -> PropagationResult {
        if solver.bound(target) {
            if solver.value(target) == 1 {
                solver.set_min(var, value)
            } else {
                solver.set_max(var, value - 1)
            }
        } else if solver.min(var) >= value {
            solver.set_value(target, 1)
        } else if solver.max(var) < value {
            solver.set_value(target, 0)
        } else {
            Ok(())
        }
    }
}

impl Constraint for IsGreaterOrEqualCst {
    fn post(&self, solver: &mut Solver) {
        let (var, value, target) = (self.var, self.value, self.target);
        let demon = solver.make_demon(DemonPriority::Normal, "is_ge_cst", move |s| {
            Self::propagate(s, var, value, target)
        });
        solver.when_range(var, demon);
        solver.when_bound(target, demon);
    }

    fn initial_propagate(&self, solver: &mut Solver) -> PropagationResult {
        Self::propagate(solver, self.var, self.value, self.target)
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        ConstraintDescriptor {
            name: "IsGreaterOrEqualCst".to_string(),
            description: format!("{} <=> ({} >= {})", self.target, self.var, self.value),
        }
    }
}

/// `target == 1 ⇔ var <= value`.
#[derive(Debug, Clone)]
pub struct IsLessOrEqualCst {
    pub var: VarId,
    pub value: i64,
    pub target: VarId,
}

impl IsLessOrEqualCst {
    pub fn new(var: VarId, value: i64, target: VarId) -> Self {
        Self { var, value, target }
    }

    fn propagate(solver: &mut Solver, var: VarId, value: i64, target: VarId) -> PropagationResult {
        if solver.bound(target) {
            if solver.value(target) == 1 {
                solver.set_max(var, value)
            } else {
                solver.set_min(var, value + 1)
            }
        } else if solver.max(var) <= value {
            solver.set_value(target, 1)
        } else if solver.min(var) > value {
            solver.set_value(target, 0)
        } else {
            Ok(())
        }
    }
}

impl Constraint for IsLessOrEqualCst {
    fn post(&self, solver: &mut Solver) {
        let (var, value, target) = (self.var, self.value, self.target);
        let demon = solver.make_demon(DemonPriority::Normal, "is_le_cst", move |s| {
            Self::propagate(s, var, value, target)
        });
        solver.when_range(var, demon);
        solver.when_bound(target, demon);
    }

    fn initial_propagate(&self, solver: &mut Solver) -> PropagationResult {
        Self::propagate(solver, self.var, self.value, self.target)
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        ConstraintDescriptor {
            name: "IsLessOrEqualCst".to_string(),
            description: format!("{} <=> ({} <= {})", self.target, self.var, self.value),
        }
    }
}

/// At least one of the boolean variables is true.
#[derive(Debug, Clone)]
pub struct BoolOr {
    pub vars: Vec<VarId>,
}

impl BoolOr {
    pub fn new(vars: Vec<VarId>) -> Self {
        Self { vars }
    }

    fn propagate(solver: &mut Solver, vars: &[VarId]) -> PropagationResult {
        let mut unbound = None;
        let mut unbound_count = 0;
        for &v in vars {
            if solver.bound(v) {
                if solver.value(v) == 1 {
                    return Ok(()); // satisfied
                }
            } else {
                unbound = Some(v);
                unbound_count += 1;
            }
        }
        match (unbound, unbound_count) {
            (None, _) => solver.fail(),
            (Some(last), 1) => solver.set_value(last, 1),
            _ => Ok(()),
        }
    }
}

impl Constraint for BoolOr {
    fn post(&self, solver: &mut Solver) {
        let vars = Rc::new(self.vars.clone());
        let body = {
            let vars = Rc::clone(&vars);
            move |s: &mut Solver| Self::propagate(s, &vars)
        };
        let demon = solver.make_demon(DemonPriority::Normal, "bool_or", body);
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
            .join(" | ");
        ConstraintDescriptor {
            name: "BoolOr".to_string(),
            description: vars,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forcing_the_target_imposes_equality() {
        let mut s = Solver::new("reified");
        let x = s.make_int_var(0, 9, "x");
        let b = s.make_bool_var("b");
        s.add_constraint(IsEqualCst::new(x, 4, b)).unwrap();
        s.post_pending_constraints();
        s.run_initial_propagation().unwrap();
        s.set_value(b, 1).unwrap();
        assert_eq!(s.value(x), 4);
    }

    #[test]
    fn losing_the_value_settles_the_target() {
        let mut s = Solver::new("reified");
        let x = s.make_int_var(0, 9, "x");
        let b = s.make_bool_var("b");
        s.add_constraint(IsEqualCst::new(x, 4, b)).unwrap();
        s.post_pending_constraints();
        s.run_initial_propagation().unwrap();
        s.remove_value(x, 4).unwrap();
        assert_eq!(s.value(b), 0);
    }

    #[test]
    fn threshold_reification_tracks_bounds() {
        let mut s = Solver::new("reified");
        let x = s.make_int_var(0, 9, "x");
        let b = s.make_bool_var("b");
        s.add_constraint(IsGreaterOrEqualCst::new(x, 5, b)).unwrap();
        s.post_pending_constraints();
        s.run_initial_propagation().unwrap();
        s.set_min(x, 6).unwrap();
        assert_eq!(s.value(b), 1);
    }

    #[test]
    fn bool_or_forces_the_last_candidate() {
        let mut s = Solver::new("reified");
        let a = s.make_bool_var("a");
        let b = s.make_bool_var("b");
        s.add_constraint(BoolOr::new(vec![a, b])).unwrap();
        s.post_pending_constraints();
        s.run_initial_propagation().unwrap();
        s.set_value(a, 0).unwrap();
        assert_eq!(s.value(b), 1);
    }
}
