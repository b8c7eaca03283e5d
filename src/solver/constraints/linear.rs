//! Linear arithmetic over integer variables: `Σ cᵢ·xᵢ == total`.

use std::rc::Rc;

use crate::error::{PropagationResult, SolverError};
use crate::solver::constraint::{Constraint, ConstraintDescriptor};
use crate::solver::demon::DemonPriority;
use crate::solver::engine::{Solver, VarId};
use crate::solver::expr::{div_ceil, div_floor};
use crate::solver::visitor::ModelVisitor;

/// Enforces `Σ coefficients[i] * vars[i] == total` with bounds reasoning.
#[derive(Debug, Clone)]
pub struct ScalProdEq {
    vars: Vec<VarId>,
    coefficients: Vec<i64>,
    total: i64,
}

impl ScalProdEq {
    pub fn new(vars: Vec<VarId>, coefficients: Vec<i64>, total: i64) -> Result<Self, SolverError> {
        if vars.len() != coefficients.len() {
            return Err(SolverError::MismatchedTerms {
                vars: vars.len(),
                coefficients: coefficients.len(),
            });
        }
        Ok(Self {
            vars,
            coefficients,
            total,
        })
    }

    fn propagate(
        solver: &mut Solver,
        vars: &[VarId],
        coefficients: &[i64],
        total: i64,
    ) -> PropagationResult {
        let total = total as i128;
        let mut sum_min: i128 = 0;
        let mut sum_max: i128 = 0;
        for (&v, &c) in vars.iter().zip(coefficients) {
            let c = c as i128;
            let (lo, hi) = (solver.min(v) as i128, solver.max(v) as i128);
            if c > 0 {
                sum_min += c * lo;
                sum_max += c * hi;
            } else {
                sum_min += c * hi;
                sum_max += c * lo;
            }
        }
        if sum_min > total || sum_max < total {
            return solver.fail();
        }
        for (&v, &c) in vars.iter().zip(coefficients) {
            if c == 0 {
                continue;
            }
            let c128 = c as i128;
            let (lo, hi) = (solver.min(v) as i128, solver.max(v) as i128);
            let (contrib_min, contrib_max) = if c128 > 0 {
                (c128 * lo, c128 * hi)
            } else {
                (c128 * hi, c128 * lo)
            };
            let rest_min = sum_min - contrib_min;
            let rest_max = sum_max - contrib_max;
            // c * v must land in [total - rest_max, total - rest_min].
            let term_lo = (total - rest_max).clamp(i64::MIN as i128, i64::MAX as i128) as i64;
            let term_hi = (total - rest_min).clamp(i64::MIN as i128, i64::MAX as i128) as i64;
            if c > 0 {
                solver.set_range(v, div_ceil(term_lo, c), div_floor(term_hi, c))?;
            } else {
                solver.set_range(v, div_ceil(term_hi, c), div_floor(term_lo, c))?;
            }
        }
        Ok(())
    }
}

impl Constraint for ScalProdEq {
    fn post(&self, solver: &mut Solver) {
        let vars = Rc::new(self.vars.clone());
        let coefficients = Rc::new(self.coefficients.clone());
        let total = self.total;
        let body = {
            let vars = Rc::clone(&vars);
            let coefficients = Rc::clone(&coefficients);
            move |s: &mut Solver| Self::propagate(s, &vars, &coefficients, total)
        };
        let demon = solver.make_demon(DemonPriority::Normal, "scal_prod_eq", body);
        for &v in self.vars.iter() {
            solver.when_range(v, demon);
        }
    }

    fn initial_propagate(&self, solver: &mut Solver) -> PropagationResult {
        Self::propagate(solver, &self.vars, &self.coefficients, self.total)
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        let terms = self
            .vars
            .iter()
            .zip(&self.coefficients)
            .map(|(v, c)| format!("{c}*{v}"))
            .collect::<Vec<_>>()
            .join(" + ");
        ConstraintDescriptor {
            name: "ScalProdEq".to_string(),
            description: format!("{} == {}", terms, self.total),
        }
    }

    fn accept(&self, visitor: &mut dyn ModelVisitor) {
        visitor.begin_visit_constraint(&self.descriptor());
        visitor.visit_integer_variable_array("vars", &self.vars);
        visitor.visit_integer_array("coefficients", &self.coefficients);
        visitor.visit_integer_argument("total", self.total);
        visitor.end_visit_constraint();
    }
}

/// Enforces `Σ vars == total`; a scalar product with unit coefficients.
#[derive(Debug, Clone)]
pub struct SumEq(ScalProdEq);

impl SumEq {
    pub fn new(vars: Vec<VarId>, total: i64) -> Self {
        let coefficients = vec![1; vars.len()];
        Self(ScalProdEq::new(vars, coefficients, total).expect("unit coefficients"))
    }
}

impl Constraint for SumEq {
    fn post(&self, solver: &mut Solver) {
        self.0.post(solver)
    }

    fn initial_propagate(&self, solver: &mut Solver) -> PropagationResult {
        self.0.initial_propagate(solver)
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        ConstraintDescriptor {
            name: "SumEq".to_string(),
            description: self.0.descriptor().description,
        }
    }

    fn accept(&self, visitor: &mut dyn ModelVisitor) {
        self.0.accept(visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bounds_propagate_through_a_sum() {
        let mut s = Solver::new("linear");
        let x = s.make_int_var(0, 10, "x");
        let y = s.make_int_var(0, 10, "y");
        s.add_constraint(SumEq::new(vec![x, y], 14)).unwrap();
        s.run_initial_propagation().unwrap();
        assert_eq!(s.min(x), 4);
        assert_eq!(s.min(y), 4);
    }

    #[test]
    fn negative_coefficients_flip_the_bounds() {
        let mut s = Solver::new("linear");
        let x = s.make_int_var(0, 10, "x");
        let y = s.make_int_var(0, 10, "y");
        // x - y == 3
        let c = ScalProdEq::new(vec![x, y], vec![1, -1], 3).unwrap();
        s.add_constraint(c).unwrap();
        s.run_initial_propagation().unwrap();
        assert_eq!(s.min(x), 3);
        assert_eq!(s.max(y), 7);
    }

    #[test]
    fn infeasible_sum_fails() {
        let mut s = Solver::new("linear");
        let x = s.make_int_var(0, 3, "x");
        let y = s.make_int_var(0, 3, "y");
        s.add_constraint(SumEq::new(vec![x, y], 20)).unwrap();
        assert!(s.run_initial_propagation().is_err());
    }

    #[test]
    fn mismatched_terms_are_rejected() {
        assert!(ScalProdEq::new(vec![VarId(0)], vec![1, 2], 0).is_err());
    }
}
