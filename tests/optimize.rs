//! Objective optimization through the bound-tightening monitor.

use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use tangram::{
    builder, Assignment, IntValueStrategy, IntVarStrategy, MonitorRef, OptimizeVar, Phase,
    ScalProdEq, SolutionCollector, Solver, VarId,
};

/// A tiny knapsack: items with weights and values, capacity via a slack
/// variable, objective pinned by a linear equality.
fn knapsack(solver: &mut Solver, weights: &[i64], values: &[i64], capacity: i64) -> (Vec<VarId>, VarId) {
    let items: Vec<VarId> = (0..weights.len())
        .map(|i| solver.make_bool_var(&format!("take_{i}")))
        .collect();
    let slack = solver.make_int_var(0, capacity, "slack");
    let mut weight_vars = items.clone();
    weight_vars.push(slack);
    let mut weight_coefficients = weights.to_vec();
    weight_coefficients.push(1);
    solver
        .add_constraint(ScalProdEq::new(weight_vars, weight_coefficients, capacity).unwrap())
        .unwrap();

    let max_value: i64 = values.iter().sum();
    let objective = solver.make_int_var(0, max_value, "value");
    let mut value_vars = items.clone();
    value_vars.push(objective);
    let mut value_coefficients = values.to_vec();
    value_coefficients.push(-1);
    solver
        .add_constraint(ScalProdEq::new(value_vars, value_coefficients, 0).unwrap())
        .unwrap();
    (items, objective)
}

#[test]
fn maximization_produces_strictly_increasing_solutions() {
    let mut solver = Solver::new("knapsack");
    let (items, objective) = knapsack(&mut solver, &[2, 3, 4, 5], &[3, 4, 5, 6], 9);

    let mut prototype = Assignment::new();
    prototype.add_all(&items);
    prototype.add_objective(objective);
    let collector = Rc::new(RefCell::new(SolutionCollector::all(&prototype)));
    let optimize = tangram::monitor(OptimizeVar::maximize(objective, 1));

    let db = builder(Phase::new(
        &items,
        IntVarStrategy::ChooseFirstUnbound,
        IntValueStrategy::AssignMinValue,
    ));
    assert!(solver.solve(db, vec![collector.clone() as MonitorRef, optimize]));

    let solutions = collector.borrow();
    assert!(solutions.solution_count() > 0);
    // Accepted solutions strictly improve the objective.
    let values: Vec<i64> = (0..solutions.solution_count())
        .map(|i| solutions.objective_value(i))
        .collect();
    for pair in values.windows(2) {
        assert!(pair[1] > pair[0]);
    }
    // 2 + 3 + 4 fits the capacity for value 12; nothing beats it.
    assert_eq!(*values.last().unwrap(), 12);
}

#[test]
fn minimization_reaches_the_floor() {
    let mut solver = Solver::new("min");
    let x = solver.make_int_var(3, 17, "x");

    let mut prototype = Assignment::new();
    prototype.add(x);
    prototype.add_objective(x);
    let collector = Rc::new(RefCell::new(SolutionCollector::best_value(&prototype, false)));
    let optimize = tangram::monitor(OptimizeVar::minimize(x, 1));

    let db = builder(Phase::new(
        &[x],
        IntVarStrategy::ChooseFirstUnbound,
        IntValueStrategy::AssignMaxValue,
    ));
    assert!(solver.solve(db, vec![collector.clone() as MonitorRef, optimize]));
    assert_eq!(collector.borrow().objective_value(0), 3);
}

#[test]
fn best_value_collector_keeps_only_the_best() {
    let mut solver = Solver::new("best");
    let x = solver.make_int_var(0, 5, "x");
    let mut prototype = Assignment::new();
    prototype.add(x);
    prototype.add_objective(x);
    let collector = Rc::new(RefCell::new(SolutionCollector::best_value(&prototype, true)));

    let db = builder(Phase::new(
        &[x],
        IntVarStrategy::ChooseFirstUnbound,
        IntValueStrategy::AssignMinValue,
    ));
    solver.solve(db, vec![collector.clone() as MonitorRef]);

    let solutions = collector.borrow();
    assert_eq!(solutions.solution_count(), 1);
    assert_eq!(solutions.objective_value(0), 5);
}

#[test]
fn n_best_collector_ranks_solutions() {
    let mut solver = Solver::new("n_best");
    let x = solver.make_int_var(0, 5, "x");
    let mut prototype = Assignment::new();
    prototype.add(x);
    prototype.add_objective(x);
    let collector = Rc::new(RefCell::new(SolutionCollector::n_best(&prototype, 3, true)));

    let db = builder(Phase::new(
        &[x],
        IntVarStrategy::ChooseFirstUnbound,
        IntValueStrategy::AssignMinValue,
    ));
    solver.solve(db, vec![collector.clone() as MonitorRef]);

    let solutions = collector.borrow();
    assert_eq!(solutions.solution_count(), 3);
    let values: Vec<i64> = (0..3).map(|i| solutions.objective_value(i)).collect();
    assert_eq!(values, vec![5, 4, 3]);
}
