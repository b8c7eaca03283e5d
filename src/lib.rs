//! Tangram is a finite-domain constraint programming solver built around a
//! reversibility trail and a depth-first backtracking search.
//!
//! A model is made of integer variables with finite domains, expressions
//! over them, and constraints. A [`DecisionBuilder`] picks the branching
//! strategy, and the search interleaves decisions with constraint
//! propagation: every domain change is logged on the trail, so failing a
//! subtree unwinds it in time proportional to the changes made.
//!
//! # Core Concepts
//!
//! - **[`Solver`]**: owns everything: variables, constraints, the trail,
//!   the propagation queue, and the search stack.
//! - **[`Constraint`]**: a rule over variables. `post` attaches demons to
//!   variable events; propagation then runs those demons to fixpoint.
//! - **[`DecisionBuilder`]**: the branching strategy. [`Phase`] covers the
//!   standard variable/value strategies; combinators like [`Compose`] and
//!   [`TryAll`] assemble bigger ones.
//! - **[`SearchMonitor`]**: observers of the search: logs, limits,
//!   solution collectors, objective management, metaheuristics.
//!
//! # Example: Pheasants and Rabbits
//!
//! Twenty heads, fifty-six legs; how many pheasants and how many rabbits?
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use tangram::{
//!     builder, IntValueStrategy, IntVarStrategy, Assignment, MonitorRef, Phase, ScalProdEq,
//!     SolutionCollector, Solver, SumEq,
//! };
//!
//! let mut solver = Solver::new("pheasants_and_rabbits");
//! let pheasants = solver.make_int_var(0, 20, "pheasants");
//! let rabbits = solver.make_int_var(0, 20, "rabbits");
//!
//! solver
//!     .add_constraint(SumEq::new(vec![pheasants, rabbits], 20))
//!     .unwrap();
//! solver
//!     .add_constraint(ScalProdEq::new(vec![pheasants, rabbits], vec![2, 4], 56).unwrap())
//!     .unwrap();
//!
//! let mut prototype = Assignment::new();
//! prototype.add_all(&[pheasants, rabbits]);
//! let collector = Rc::new(RefCell::new(SolutionCollector::first(&prototype)));
//!
//! let db = builder(Phase::new(
//!     &[pheasants, rabbits],
//!     IntVarStrategy::ChooseFirstUnbound,
//!     IntValueStrategy::AssignMinValue,
//! ));
//! assert!(solver.solve(db, vec![collector.clone() as MonitorRef]));
//!
//! let solutions = collector.borrow();
//! assert_eq!(solutions.value(0, pheasants), 12);
//! assert_eq!(solutions.value(0, rabbits), 8);
//! ```

pub mod error;
pub mod solver;

pub use error::{Error, Failure, PropagationResult, Result, SolverError};

pub use solver::{
    assignment::{Assignment, IntVarElement},
    constraint::{Constraint, ConstraintDescriptor},
    constraints,
    decision::{
        builder, AssignVariableValue, Compose, Decision, DecisionBuilder, DecisionBuilderRef,
        DecisionRef, DecisionVisitor, NestedOptimize, Phase, SolveOnce, SplitVariableDomain,
        TryAll,
    },
    demon::{DemonId, DemonPriority},
    engine::{ConstraintId, ExprId, Solver, VarId},
    expr::CastConstraint,
    heuristics,
    heuristics::{value::IntValueStrategy, variable::IntVarStrategy},
    metaheuristics::{GuidedLocalSearch, SimulatedAnnealing, TabuSearch},
    monitor::{monitor, DecisionModification, MonitorRef, SearchMonitor, NO_PROGRESS},
    monitors,
    monitors::{
        collector::{CollectedSolution, SolutionCollector},
        limit::{CustomLimit, ImprovementLimit, OrLimit, RegularLimit, SearchLimit},
        log::SearchLog,
        restart::{luby, ConstantRestart, LubyRestart},
        symmetry::{SymmetryBreaker, SymmetryManager, SymmetryOps},
        trace::SearchTrace,
    },
    objective::OptimizeVar,
    params::SolverParameters,
    search::SearchState,
    trail::{MarkerKind, RevCell},
    var::DomainIter,
    visitor::{ModelVisitor, PrintModelVisitor},
};

pub use solver::constraints::{
    all_different::AllDifferent,
    cmp::{GreaterOrEqualCst, LessOrEqualCst, NotEqual, NotEqualCst},
    linear::{ScalProdEq, SumEq},
    reified::{BoolOr, IsDifferentCst, IsEqualCst, IsGreaterOrEqualCst, IsLessOrEqualCst},
};
