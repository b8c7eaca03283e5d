//! End-to-end search scenarios with known answers.

use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use tangram::{
    builder, AllDifferent, Assignment, IntValueStrategy, IntVarStrategy, MonitorRef, NotEqual,
    Phase, ScalProdEq, SolutionCollector, Solver, SumEq, VarId,
};

fn first_unbound_min_value(vars: &[VarId]) -> tangram::DecisionBuilderRef {
    builder(Phase::new(
        vars,
        IntVarStrategy::ChooseFirstUnbound,
        IntValueStrategy::AssignMinValue,
    ))
}

#[test]
fn pheasants_and_rabbits() {
    let mut solver = Solver::new("pheasants_and_rabbits");
    let p = solver.make_int_var(0, 20, "pheasants");
    let r = solver.make_int_var(0, 20, "rabbits");
    solver.add_constraint(SumEq::new(vec![p, r], 20)).unwrap();
    solver
        .add_constraint(ScalProdEq::new(vec![p, r], vec![2, 4], 56).unwrap())
        .unwrap();

    let mut prototype = Assignment::new();
    prototype.add_all(&[p, r]);
    let collector = Rc::new(RefCell::new(SolutionCollector::first(&prototype)));

    assert!(solver.solve(
        first_unbound_min_value(&[p, r]),
        vec![collector.clone() as MonitorRef],
    ));

    let solutions = collector.borrow();
    assert_eq!(solutions.solution_count(), 1);
    assert_eq!(solutions.value(0, p), 12);
    assert_eq!(solutions.value(0, r), 8);
}

#[test]
fn eight_queens_has_ninety_two_solutions() {
    let n = 8usize;
    let mut solver = Solver::new("n_queens");
    let queens: Vec<VarId> = (0..n)
        .map(|i| solver.make_int_var(0, n as i64 - 1, &format!("x{i}")))
        .collect();

    // Columns, and both diagonals through shifted cast variables.
    solver
        .add_constraint(AllDifferent::new(queens.clone()))
        .unwrap();
    let mut plus = Vec::new();
    let mut minus = Vec::new();
    for (i, &q) in queens.iter().enumerate() {
        let e = solver.expr_of(q);
        let up = solver.make_offset(e, i as i64);
        plus.push(solver.expr_var(up));
        let e = solver.expr_of(q);
        let down = solver.make_offset(e, -(i as i64));
        minus.push(solver.expr_var(down));
    }
    solver.add_constraint(AllDifferent::new(plus)).unwrap();
    solver.add_constraint(AllDifferent::new(minus)).unwrap();

    let mut prototype = Assignment::new();
    prototype.add_all(&queens);
    let collector = Rc::new(RefCell::new(SolutionCollector::all(&prototype)));

    solver.solve(
        first_unbound_min_value(&queens),
        vec![collector.clone() as MonitorRef],
    );

    assert_eq!(collector.borrow().solution_count(), 92);
}

#[test]
fn distinct_pair_with_free_third_variable() {
    let mut solver = Solver::new("distinct_triple");
    let x = solver.make_int_var(0, 2, "x");
    let y = solver.make_int_var(0, 2, "y");
    let z = solver.make_int_var(0, 2, "z");
    solver.add_constraint(NotEqual::new(x, y)).unwrap();

    let mut prototype = Assignment::new();
    prototype.add_all(&[x, y, z]);
    let collector = Rc::new(RefCell::new(SolutionCollector::all(&prototype)));

    solver.solve(
        first_unbound_min_value(&[x, y, z]),
        vec![collector.clone() as MonitorRef],
    );

    let solutions = collector.borrow();
    assert_eq!(solutions.solution_count(), 18);
    for i in 0..solutions.solution_count() {
        assert_ne!(solutions.value(i, x), solutions.value(i, y));
    }
}

#[test]
fn collected_solutions_pass_check_assignment() {
    let mut solver = Solver::new("check_roundtrip");
    let x = solver.make_int_var(0, 3, "x");
    let y = solver.make_int_var(0, 3, "y");
    solver.add_constraint(NotEqual::new(x, y)).unwrap();

    let mut prototype = Assignment::new();
    prototype.add_all(&[x, y]);
    let collector = Rc::new(RefCell::new(SolutionCollector::all(&prototype)));
    solver.solve(
        first_unbound_min_value(&[x, y]),
        vec![collector.clone() as MonitorRef],
    );

    let stored: Vec<Assignment> = (0..collector.borrow().solution_count())
        .map(|i| collector.borrow().solution(i).clone())
        .collect();
    assert!(!stored.is_empty());
    for assignment in &stored {
        assert!(solver.check_assignment(assignment));
    }

    // Restoring onto an equivalent fresh solver also checks out.
    let mut fresh = Solver::new("check_roundtrip_fresh");
    let fx = fresh.make_int_var(0, 3, "x");
    let fy = fresh.make_int_var(0, 3, "y");
    fresh.add_constraint(NotEqual::new(fx, fy)).unwrap();
    for assignment in &stored {
        assert!(fresh.check_assignment(assignment));
    }
}
