//! Nested searches and decision-builder combinators.

use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use tangram::{
    builder, Assignment, Compose, GreaterOrEqualCst, IntValueStrategy, IntVarStrategy,
    MonitorRef, NestedOptimize, NotEqual, Phase, SolutionCollector, Solver, SolveOnce, TryAll,
    VarId,
};

fn min_value_phase(vars: &[VarId]) -> tangram::DecisionBuilderRef {
    builder(Phase::new(
        vars,
        IntVarStrategy::ChooseFirstUnbound,
        IntValueStrategy::AssignMinValue,
    ))
}

#[test]
fn compose_chains_two_phases() {
    let mut solver = Solver::new("compose");
    let x = solver.make_int_var(0, 2, "x");
    let y = solver.make_int_var(0, 2, "y");
    let db = builder(Compose::new(vec![
        min_value_phase(&[x]),
        builder(Phase::new(
            &[y],
            IntVarStrategy::ChooseFirstUnbound,
            IntValueStrategy::AssignMaxValue,
        )),
    ]));

    let mut prototype = Assignment::new();
    prototype.add_all(&[x, y]);
    let collector = Rc::new(RefCell::new(SolutionCollector::first(&prototype)));
    assert!(solver.solve(db, vec![collector.clone() as MonitorRef]));
    // The first phase assigns x its minimum, the second y its maximum.
    assert_eq!(collector.borrow().value(0, x), 0);
    assert_eq!(collector.borrow().value(0, y), 2);
}

#[test]
fn try_all_moves_to_the_next_alternative_on_exhaustion() {
    let mut solver = Solver::new("try_all");
    let x = solver.make_int_var(0, 5, "x");
    // The first alternative pins x into an infeasible corner.
    solver
        .add_constraint(GreaterOrEqualCst::new(x, 3))
        .unwrap();

    #[derive(Debug)]
    struct PinTo {
        var: VarId,
        value: i64,
    }
    impl tangram::DecisionBuilder for PinTo {
        fn next(
            &self,
            solver: &mut Solver,
        ) -> tangram::PropagationResult<Option<tangram::DecisionRef>> {
            if solver.bound(self.var) {
                return Ok(None);
            }
            solver.set_value(self.var, self.value)?;
            Ok(None)
        }
    }

    let db = builder(TryAll::new(vec![
        builder(PinTo { var: x, value: 1 }), // dies on the x >= 3 constraint
        builder(PinTo { var: x, value: 4 }),
    ]));

    let mut prototype = Assignment::new();
    prototype.add(x);
    let collector = Rc::new(RefCell::new(SolutionCollector::first(&prototype)));
    assert!(solver.solve(db, vec![collector.clone() as MonitorRef]));
    assert_eq!(collector.borrow().value(0, x), 4);
}

#[test]
fn solve_once_collapses_a_nested_search() {
    let mut solver = Solver::new("solve_once");
    let x = solver.make_int_var(0, 3, "x");
    let y = solver.make_int_var(0, 3, "y");
    solver.add_constraint(NotEqual::new(x, y)).unwrap();

    // The outer search decides x; an inner search completes y.
    let inner = builder(SolveOnce::new(min_value_phase(&[y])));
    let db = builder(Compose::new(vec![min_value_phase(&[x]), inner]));

    let mut prototype = Assignment::new();
    prototype.add_all(&[x, y]);
    let collector = Rc::new(RefCell::new(SolutionCollector::first(&prototype)));
    assert!(solver.solve(db, vec![collector.clone() as MonitorRef]));
    let solutions = collector.borrow();
    assert_eq!(solutions.value(0, x), 0);
    assert_eq!(solutions.value(0, y), 1);
}

#[test]
fn nested_optimize_imposes_the_best_assignment() {
    let mut solver = Solver::new("nested_optimize");
    let x = solver.make_int_var(0, 9, "x");

    let mut prototype = Assignment::new();
    prototype.add(x);
    prototype.add_objective(x);

    let db = builder(NestedOptimize::new(
        min_value_phase(&[x]),
        prototype.clone(),
        true, // maximize
        1,
    ));

    let mut outer_prototype = Assignment::new();
    outer_prototype.add(x);
    let collector = Rc::new(RefCell::new(SolutionCollector::first(&outer_prototype)));
    assert!(solver.solve(db, vec![collector.clone() as MonitorRef]));
    assert_eq!(collector.borrow().value(0, x), 9);
}
