//! Model visiting: a read-only walk over constraints and their arguments.

use tracing::info;

use crate::solver::constraint::ConstraintDescriptor;
use crate::solver::engine::{ExprId, Solver, VarId};

/// Visitor over the model structure. Constraints, limits, and objectives
/// present themselves through these hooks.
#[allow(unused_variables)]
pub trait ModelVisitor {
    fn begin_visit_model(&mut self, solver_name: &str) {}
    fn end_visit_model(&mut self) {}

    fn begin_visit_constraint(&mut self, descriptor: &ConstraintDescriptor) {}
    fn end_visit_constraint(&mut self) {}

    /// Extensions cover non-constraint model features (objective, limits).
    fn begin_visit_extension(&mut self, name: &str) {}
    fn end_visit_extension(&mut self) {}

    fn visit_integer_argument(&mut self, name: &str, value: i64) {}
    fn visit_integer_array(&mut self, name: &str, values: &[i64]) {}
    fn visit_integer_variable(&mut self, name: &str, var: VarId) {}
    fn visit_integer_variable_array(&mut self, name: &str, vars: &[VarId]) {}
    fn visit_integer_expression(&mut self, name: &str, expr: ExprId) {}
}

impl Solver {
    /// Walks every model constraint through `visitor`.
    pub fn accept(&self, visitor: &mut dyn ModelVisitor) {
        visitor.begin_visit_model(&self.name);
        for entry in &self.constraints {
            entry.constraint.accept(visitor);
        }
        visitor.end_visit_model();
    }
}

/// Logs the visited model through `tracing`, one line per constraint.
#[derive(Debug, Default)]
pub struct PrintModelVisitor {
    depth: usize,
}

impl PrintModelVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    fn emit(&self, line: String) {
        info!(indent = self.depth, "{line}");
    }
}

impl ModelVisitor for PrintModelVisitor {
    fn begin_visit_model(&mut self, solver_name: &str) {
        self.emit(format!("model {solver_name}"));
    }

    fn begin_visit_constraint(&mut self, descriptor: &ConstraintDescriptor) {
        self.emit(descriptor.to_string());
        self.depth += 1;
    }

    fn end_visit_constraint(&mut self) {
        self.depth -= 1;
    }

    fn begin_visit_extension(&mut self, name: &str) {
        self.emit(format!("extension {name}"));
        self.depth += 1;
    }

    fn end_visit_extension(&mut self) {
        self.depth -= 1;
    }

    fn visit_integer_argument(&mut self, name: &str, value: i64) {
        self.emit(format!("{name} = {value}"));
    }

    fn visit_integer_array(&mut self, name: &str, values: &[i64]) {
        self.emit(format!("{name} = {values:?}"));
    }

    fn visit_integer_variable(&mut self, name: &str, var: VarId) {
        self.emit(format!("{name} = {var}"));
    }

    fn visit_integer_variable_array(&mut self, name: &str, vars: &[VarId]) {
        let vars = vars.iter().map(|v| v.to_string()).collect::<Vec<_>>();
        self.emit(format!("{name} = [{}]", vars.join(", ")));
    }

    fn visit_integer_expression(&mut self, name: &str, expr: ExprId) {
        self.emit(format!("{name} = expr#{}", expr.0));
    }
}
