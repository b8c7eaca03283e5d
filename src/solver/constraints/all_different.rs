//! A constraint that ensures all variables in a given set take distinct
//! values.

use std::rc::Rc;

use crate::error::PropagationResult;
use crate::solver::constraint::{Constraint, ConstraintDescriptor};
use crate::solver::demon::DemonPriority;
use crate::solver::engine::{Solver, VarId};
use crate::solver::visitor::ModelVisitor;

/// Value-based all-different: whenever one variable binds, its value is
/// removed from every other domain.
#[derive(Debug, Clone)]
pub struct AllDifferent {
    pub vars: Vec<VarId>,
}

impl AllDifferent {
    pub fn new(vars: Vec<VarId>) -> Self {
        Self { vars }
    }

    fn on_bound(solver: &mut Solver, vars: &[VarId], index: usize) -> PropagationResult {
        let value = solver.value(vars[index]);
        for (j, &other) in vars.iter().enumerate() {
            if j != index {
                solver.remove_value(other, value)?;
            }
        }
        Ok(())
    }
}

impl Constraint for AllDifferent {
    fn post(&self, solver: &mut Solver) {
        let vars = Rc::new(self.vars.clone());
        for (i, &v) in self.vars.iter().enumerate() {
            let vars = Rc::clone(&vars);
            let demon = solver.make_demon(DemonPriority::Normal, "all_different", move |s| {
                Self::on_bound(s, &vars, i)
            });
            solver.when_bound(v, demon);
        }
    }

    fn initial_propagate(&self, solver: &mut Solver) -> PropagationResult {
        for (i, &v) in self.vars.iter().enumerate() {
            if solver.bound(v) {
                Self::on_bound(solver, &self.vars, i)?;
            }
        }
        Ok(())
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        let vars = self
            .vars
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        ConstraintDescriptor {
            name: "AllDifferent".to_string(),
            description: format!("AllDifferent({vars})"),
        }
    }

    fn accept(&self, visitor: &mut dyn ModelVisitor) {
        visitor.begin_visit_constraint(&self.descriptor());
        visitor.visit_integer_variable_array("vars", &self.vars);
        visitor.end_visit_constraint();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_one_variable_prunes_the_others() {
        let mut s = Solver::new("alldiff");
        let x = s.make_int_var(0, 2, "x");
        let y = s.make_int_var(0, 2, "y");
        let z = s.make_int_var(0, 2, "z");
        s.add_constraint(AllDifferent::new(vec![x, y, z])).unwrap();
        s.post_pending_constraints();
        s.run_initial_propagation().unwrap();
        s.set_value(x, 1).unwrap();
        assert!(!s.contains(y, 1));
        assert!(!s.contains(z, 1));
    }

    #[test]
    fn pigeonhole_wipeout_fails() {
        let mut s = Solver::new("alldiff");
        let x = s.make_int_var(0, 0, "x");
        let y = s.make_int_var(0, 1, "y");
        let z = s.make_int_var(0, 1, "z");
        s.add_constraint(AllDifferent::new(vec![x, y, z])).unwrap();
        s.post_pending_constraints();
        // Three variables, two values once x eats 0.
        assert!(s.run_initial_propagation().is_err());
    }
}
