//! The constraint base: posting demons and seeding the propagation
//! fixpoint.

use crate::error::PropagationResult;
use crate::solver::engine::Solver;
use crate::solver::visitor::ModelVisitor;

/// A human-readable description of a constraint, used by logs, the model
/// printer, and the propagation profiler.
#[derive(Debug, Clone)]
pub struct ConstraintDescriptor {
    pub name: String,
    pub description: String,
}

impl std::fmt::Display for ConstraintDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.description)
    }
}

/// A rule over solver-owned variables.
///
/// `post` runs once when the constraint enters the model: it creates demons
/// and attaches them to variable events. `initial_propagate` runs when a
/// search opens its root node (or immediately, for constraints added during
/// search) and performs the first narrowing pass. After that, all
/// propagation happens through the posted demons.
///
/// Propagators must be monotone (never widen a domain) and confluent (the
/// fixpoint must not depend on demon scheduling order).
pub trait Constraint: std::fmt::Debug {
    fn post(&self, solver: &mut Solver);

    fn initial_propagate(&self, solver: &mut Solver) -> PropagationResult;

    fn descriptor(&self) -> ConstraintDescriptor;

    /// Presents the constraint to a model visitor. The default visit
    /// carries only the descriptor; constraints with interesting arguments
    /// override this.
    fn accept(&self, visitor: &mut dyn ModelVisitor) {
        visitor.begin_visit_constraint(&self.descriptor());
        visitor.end_visit_constraint();
    }
}
