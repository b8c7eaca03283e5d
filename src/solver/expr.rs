//! Lazy integer expressions.
//!
//! Expressions form a small arena-backed graph over variables. The common
//! shapes are closed variants, so the hot min/max paths dispatch without
//! any virtual calls. Casting an expression to a variable with
//! [`Solver::expr_var`] materializes an `IntVar` and installs a cast
//! constraint that keeps the two equal; the node memoizes the cast so
//! repeated casts share one variable.

use crate::error::PropagationResult;
use crate::solver::constraint::{Constraint, ConstraintDescriptor};
use crate::solver::demon::DemonPriority;
use crate::solver::engine::{ExprId, Solver, VarId};

#[derive(Debug, Clone)]
pub(crate) enum ExprKind {
    Var(VarId),
    Offset { sub: ExprId, value: i64 },
    Scaled { sub: ExprId, coefficient: i64 },
    Opposite { sub: ExprId },
    Sum { left: ExprId, right: ExprId },
    Abs { sub: ExprId },
}

#[derive(Debug)]
pub(crate) struct ExprNode {
    pub kind: ExprKind,
    pub cast_var: Option<VarId>,
}

pub(crate) fn div_ceil(a: i64, b: i64) -> i64 {
    let q = a / b;
    if a % b != 0 && (a < 0) == (b < 0) {
        q + 1
    } else {
        q
    }
}

pub(crate) fn div_floor(a: i64, b: i64) -> i64 {
    let q = a / b;
    if a % b != 0 && (a < 0) != (b < 0) {
        q - 1
    } else {
        q
    }
}

impl Solver {
    fn new_expr(&mut self, kind: ExprKind) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(ExprNode {
            kind,
            cast_var: None,
        });
        id
    }

    /// Wraps a variable as an expression.
    pub fn expr_of(&mut self, var: VarId) -> ExprId {
        self.new_expr(ExprKind::Var(var))
    }

    /// `sub + value`.
    pub fn make_offset(&mut self, sub: ExprId, value: i64) -> ExprId {
        if value == 0 {
            return sub;
        }
        self.new_expr(ExprKind::Offset { sub, value })
    }

    /// `coefficient * sub`. A zero coefficient is a modeling bug.
    pub fn make_scaled(&mut self, sub: ExprId, coefficient: i64) -> ExprId {
        assert_ne!(coefficient, 0, "scaling an expression by zero");
        if coefficient == 1 {
            return sub;
        }
        self.new_expr(ExprKind::Scaled { sub, coefficient })
    }

    /// `-sub`.
    pub fn make_opposite(&mut self, sub: ExprId) -> ExprId {
        self.new_expr(ExprKind::Opposite { sub })
    }

    /// `left + right`.
    pub fn make_sum_expr(&mut self, left: ExprId, right: ExprId) -> ExprId {
        self.new_expr(ExprKind::Sum { left, right })
    }

    /// `e1 - e2`, built from sum and opposite.
    pub fn make_difference(&mut self, left: ExprId, right: ExprId) -> ExprId {
        let negated = self.make_opposite(right);
        self.make_sum_expr(left, negated)
    }

    /// `|sub|`.
    pub fn make_abs(&mut self, sub: ExprId) -> ExprId {
        self.new_expr(ExprKind::Abs { sub })
    }

    /// Sums a whole list of variables, folding binary sums.
    pub fn make_sum_of(&mut self, vars: &[VarId]) -> ExprId {
        assert!(!vars.is_empty(), "sum of an empty variable list");
        let mut acc = self.expr_of(vars[0]);
        for &v in &vars[1..] {
            let next = self.expr_of(v);
            acc = self.make_sum_expr(acc, next);
        }
        acc
    }

    pub fn expr_min(&self, e: ExprId) -> i64 {
        match self.exprs[e.0 as usize].kind.clone() {
            ExprKind::Var(v) => self.min(v),
            ExprKind::Offset { sub, value } => self.expr_min(sub) + value,
            ExprKind::Scaled { sub, coefficient } => {
                if coefficient > 0 {
                    coefficient * self.expr_min(sub)
                } else {
                    coefficient * self.expr_max(sub)
                }
            }
            ExprKind::Opposite { sub } => -self.expr_max(sub),
            ExprKind::Sum { left, right } => self.expr_min(left) + self.expr_min(right),
            ExprKind::Abs { sub } => {
                let lo = self.expr_min(sub);
                let hi = self.expr_max(sub);
                if lo <= 0 && hi >= 0 {
                    0
                } else {
                    lo.abs().min(hi.abs())
                }
            }
        }
    }

    pub fn expr_max(&self, e: ExprId) -> i64 {
        match self.exprs[e.0 as usize].kind.clone() {
            ExprKind::Var(v) => self.max(v),
            ExprKind::Offset { sub, value } => self.expr_max(sub) + value,
            ExprKind::Scaled { sub, coefficient } => {
                if coefficient > 0 {
                    coefficient * self.expr_max(sub)
                } else {
                    coefficient * self.expr_min(sub)
                }
            }
            ExprKind::Opposite { sub } => -self.expr_min(sub),
            ExprKind::Sum { left, right } => self.expr_max(left) + self.expr_max(right),
            ExprKind::Abs { sub } => {
                let lo = self.expr_min(sub);
                let hi = self.expr_max(sub);
                lo.abs().max(hi.abs())
            }
        }
    }

    pub fn expr_bound(&self, e: ExprId) -> bool {
        self.expr_min(e) == self.expr_max(e)
    }

    pub fn expr_set_min(&mut self, e: ExprId, m: i64) -> PropagationResult {
        match self.exprs[e.0 as usize].kind.clone() {
            ExprKind::Var(v) => self.set_min(v, m),
            ExprKind::Offset { sub, value } => self.expr_set_min(sub, m - value),
            ExprKind::Scaled { sub, coefficient } => {
                if coefficient > 0 {
                    self.expr_set_min(sub, div_ceil(m, coefficient))
                } else {
                    self.expr_set_max(sub, div_floor(m, coefficient))
                }
            }
            ExprKind::Opposite { sub } => self.expr_set_max(sub, -m),
            ExprKind::Sum { left, right } => {
                self.expr_set_min(left, m - self.expr_max(right))?;
                self.expr_set_min(right, m - self.expr_max(left))
            }
            ExprKind::Abs { sub } => {
                if m <= 0 {
                    return Ok(());
                }
                // The sub-expression must leave (-m, m); only representable
                // when one side is already excluded.
                if self.expr_min(sub) > -m {
                    self.expr_set_min(sub, m)
                } else if self.expr_max(sub) < m {
                    self.expr_set_max(sub, -m)
                } else {
                    Ok(())
                }
            }
        }
    }

    pub fn expr_set_max(&mut self, e: ExprId, m: i64) -> PropagationResult {
        match self.exprs[e.0 as usize].kind.clone() {
            ExprKind::Var(v) => self.set_max(v, m),
            ExprKind::Offset { sub, value } => self.expr_set_max(sub, m - value),
            ExprKind::Scaled { sub, coefficient } => {
                if coefficient > 0 {
                    self.expr_set_max(sub, div_floor(m, coefficient))
                } else {
                    self.expr_set_min(sub, div_ceil(m, coefficient))
                }
            }
            ExprKind::Opposite { sub } => self.expr_set_min(sub, -m),
            ExprKind::Sum { left, right } => {
                self.expr_set_max(left, m - self.expr_min(right))?;
                self.expr_set_max(right, m - self.expr_min(left))
            }
            ExprKind::Abs { sub } => {
                if m < 0 {
                    return self.fail();
                }
                self.expr_set_min(sub, -m)?;
                self.expr_set_max(sub, m)
            }
        }
    }

    pub fn expr_set_range(&mut self, e: ExprId, l: i64, u: i64) -> PropagationResult {
        self.expr_set_min(e, l)?;
        self.expr_set_max(e, u)
    }

    /// The variables underneath an expression, leaves left to right.
    pub(crate) fn expr_support(&self, e: ExprId) -> Vec<VarId> {
        let mut support = Vec::new();
        self.collect_support(e, &mut support);
        support
    }

    fn collect_support(&self, e: ExprId, out: &mut Vec<VarId>) {
        match self.exprs[e.0 as usize].kind.clone() {
            ExprKind::Var(v) => out.push(v),
            ExprKind::Offset { sub, .. }
            | ExprKind::Scaled { sub, .. }
            | ExprKind::Opposite { sub }
            | ExprKind::Abs { sub } => self.collect_support(sub, out),
            ExprKind::Sum { left, right } => {
                self.collect_support(left, out);
                self.collect_support(right, out);
            }
        }
    }

    pub(crate) fn expr_display(&self, e: ExprId) -> String {
        match self.exprs[e.0 as usize].kind.clone() {
            ExprKind::Var(v) => self.var_name(v),
            ExprKind::Offset { sub, value } => {
                format!("({} + {})", self.expr_display(sub), value)
            }
            ExprKind::Scaled { sub, coefficient } => {
                format!("({} * {})", coefficient, self.expr_display(sub))
            }
            ExprKind::Opposite { sub } => format!("(-{})", self.expr_display(sub)),
            ExprKind::Sum { left, right } => {
                format!("({} + {})", self.expr_display(left), self.expr_display(right))
            }
            ExprKind::Abs { sub } => format!("|{}|", self.expr_display(sub)),
        }
    }

    /// Materializes the expression as a variable.
    ///
    /// The first cast creates a fresh variable spanning the expression's
    /// current bounds and installs a [`CastConstraint`] maintaining
    /// equality; later casts return the memoized variable.
    pub fn expr_var(&mut self, e: ExprId) -> VarId {
        if let ExprKind::Var(v) = self.exprs[e.0 as usize].kind {
            return v;
        }
        if let Some(v) = self.exprs[e.0 as usize].cast_var {
            return v;
        }
        let name = format!("cast<{}>", self.expr_display(e));
        let var = self.make_int_var(self.expr_min(e), self.expr_max(e), &name);
        self.exprs[e.0 as usize].cast_var = Some(var);
        // Failure can only surface when casting during search; the cast
        // variable spans the expression, so the initial pass cannot wipe it.
        let _ = self.add_constraint(CastConstraint { var, expr: e });
        var
    }
}

/// Maintains `var == expr` for a variable materialized from an expression.
#[derive(Debug)]
pub struct CastConstraint {
    var: VarId,
    expr: ExprId,
}

impl CastConstraint {
    fn pull(solver: &mut Solver, var: VarId, expr: ExprId) -> PropagationResult {
        solver.expr_set_range(expr, solver.min(var), solver.max(var))
    }

    fn push(solver: &mut Solver, var: VarId, expr: ExprId) -> PropagationResult {
        let lo = solver.expr_min(expr);
        let hi = solver.expr_max(expr);
        solver.set_range(var, lo, hi)
    }
}

impl Constraint for CastConstraint {
    fn post(&self, solver: &mut Solver) {
        let (var, expr) = (self.var, self.expr);
        let pull = solver.make_demon(DemonPriority::Var, "cast_pull", move |s| {
            Self::pull(s, var, expr)
        });
        solver.when_range(var, pull);
        let push = solver.make_demon(DemonPriority::Var, "cast_push", move |s| {
            Self::push(s, var, expr)
        });
        for support in solver.expr_support(expr) {
            solver.when_range(support, push);
        }
    }

    fn initial_propagate(&self, solver: &mut Solver) -> PropagationResult {
        Self::push(solver, self.var, self.expr)?;
        Self::pull(solver, self.var, self.expr)
    }

    fn descriptor(&self) -> ConstraintDescriptor {
        ConstraintDescriptor {
            name: "CastConstraint".to_string(),
            description: format!("?{} == expr#{}", self.var.0, self.expr.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn offset_bounds_follow_the_variable() {
        let mut s = Solver::new("expr");
        let x = s.make_int_var(2, 8, "x");
        let e = s.expr_of(x);
        let shifted = s.make_offset(e, 5);
        assert_eq!(s.expr_min(shifted), 7);
        assert_eq!(s.expr_max(shifted), 13);
        s.expr_set_max(shifted, 10).unwrap();
        assert_eq!(s.max(x), 5);
    }

    #[test]
    fn scaled_respects_sign() {
        let mut s = Solver::new("expr");
        let x = s.make_int_var(1, 4, "x");
        let e = s.expr_of(x);
        let negated = s.make_scaled(e, -3);
        assert_eq!(s.expr_min(negated), -12);
        assert_eq!(s.expr_max(negated), -3);
    }

    #[test]
    fn sum_pushes_bounds_both_ways() {
        let mut s = Solver::new("expr");
        let x = s.make_int_var(0, 10, "x");
        let y = s.make_int_var(0, 10, "y");
        let ex = s.expr_of(x);
        let ey = s.expr_of(y);
        let sum = s.make_sum_expr(ex, ey);
        s.expr_set_min(sum, 15).unwrap();
        assert_eq!(s.min(x), 5);
        assert_eq!(s.min(y), 5);
    }

    #[test]
    fn cast_memoizes_its_variable() {
        let mut s = Solver::new("expr");
        let x = s.make_int_var(0, 7, "x");
        let e = s.expr_of(x);
        let shifted = s.make_offset(e, 3);
        let v1 = s.expr_var(shifted);
        let v2 = s.expr_var(shifted);
        assert_eq!(v1, v2);
        assert_eq!(s.min(v1), 3);
        assert_eq!(s.max(v1), 10);
    }
}
