//! Metaheuristic monitors driving restarting searches.

use std::cell::RefCell;
use std::rc::Rc;

use tangram::{
    builder, Assignment, IntValueStrategy, IntVarStrategy, MonitorRef, Phase, RegularLimit,
    ScalProdEq, SimulatedAnnealing, SolutionCollector, Solver, SolverParameters, TabuSearch,
    VarId,
};

fn knapsack(
    solver: &mut Solver,
    weights: &[i64],
    values: &[i64],
    capacity: i64,
) -> (Vec<VarId>, VarId) {
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

fn seeded() -> Solver {
    Solver::with_parameters(
        "metaheuristics",
        SolverParameters {
            random_seed: 7,
            ..SolverParameters::default()
        },
    )
}

#[test]
fn tabu_search_reaches_the_knapsack_optimum() {
    let mut solver = seeded();
    let (items, objective) = knapsack(&mut solver, &[2, 3, 4, 5], &[3, 4, 5, 6], 9);

    let mut prototype = Assignment::new();
    prototype.add_all(&items);
    prototype.add_objective(objective);
    let collector = Rc::new(RefCell::new(SolutionCollector::best_value(&prototype, true)));

    let tabu = tangram::monitor(TabuSearch::new(true, objective, 1, &items, 5, 5, 1.0));
    let limit = tangram::monitor(RegularLimit::failures(1000));

    let db = builder(Phase::new(
        &items,
        IntVarStrategy::ChooseFirstUnbound,
        IntValueStrategy::AssignMinValue,
    ));
    solver.solve(db, vec![tabu, collector.clone() as MonitorRef, limit]);

    let best = collector.borrow();
    assert!(best.solution_count() > 0);
    assert_eq!(best.objective_value(0), 12);
    // The restarting walk actually explored neighbors.
    assert!(solver.neighbors() > 0);
}

#[test]
fn simulated_annealing_freezes_and_terminates() {
    let mut solver = seeded();
    let (items, objective) = knapsack(&mut solver, &[3, 4, 5], &[2, 3, 4], 8);

    let mut prototype = Assignment::new();
    prototype.add_all(&items);
    prototype.add_objective(objective);
    let collector = Rc::new(RefCell::new(SolutionCollector::best_value(&prototype, true)));

    let annealing = tangram::monitor(SimulatedAnnealing::new(true, objective, 1, 20));
    let limit = tangram::monitor(RegularLimit::failures(5000));

    let db = builder(Phase::new(
        &items,
        IntVarStrategy::ChooseFirstUnbound,
        IntValueStrategy::AssignMinValue,
    ));
    solver.solve(db, vec![annealing, collector.clone() as MonitorRef, limit]);

    let best = collector.borrow();
    assert!(best.solution_count() > 0);
    // Weights 3 + 5 fit the capacity of 8 for value 6.
    assert_eq!(best.objective_value(0), 6);
}

#[test]
fn guided_local_search_penalizes_its_way_out() {
    use tangram::GuidedLocalSearch;

    let mut solver = seeded();
    let (items, objective) = knapsack(&mut solver, &[2, 3, 4], &[3, 4, 5], 7);

    let mut prototype = Assignment::new();
    prototype.add_all(&items);
    prototype.add_objective(objective);
    let collector = Rc::new(RefCell::new(SolutionCollector::best_value(&prototype, true)));

    let values = [3i64, 4, 5];
    let gls = tangram::monitor(GuidedLocalSearch::new(
        true,
        objective,
        1,
        &items,
        0.5,
        move |i, taken| if taken == 1 { values[i] } else { 0 },
        false,
    ));
    let limit = tangram::monitor(RegularLimit::failures(2000));

    let db = builder(Phase::new(
        &items,
        IntVarStrategy::ChooseFirstUnbound,
        IntValueStrategy::AssignMinValue,
    ));
    solver.solve(db, vec![gls, collector.clone() as MonitorRef, limit]);

    let best = collector.borrow();
    assert!(best.solution_count() > 0);
    // 3 + 4 fills the sack for value 9.
    assert_eq!(best.objective_value(0), 9);
}

#[test]
fn guided_local_search_sparse_storage_behaves_like_dense() {
    use tangram::GuidedLocalSearch;

    let mut solver = seeded();
    let (items, objective) = knapsack(&mut solver, &[2, 3], &[5, 4], 5);

    let mut prototype = Assignment::new();
    prototype.add_all(&items);
    prototype.add_objective(objective);
    let collector = Rc::new(RefCell::new(SolutionCollector::best_value(&prototype, true)));

    let gls = tangram::monitor(GuidedLocalSearch::new(
        true,
        objective,
        1,
        &items,
        0.5,
        |_, taken| taken,
        true,
    ));
    let limit = tangram::monitor(RegularLimit::failures(500));

    let db = builder(Phase::new(
        &items,
        IntVarStrategy::ChooseFirstUnbound,
        IntValueStrategy::AssignMinValue,
    ));
    solver.solve(db, vec![gls, collector.clone() as MonitorRef, limit]);

    assert!(collector.borrow().solution_count() > 0);
    assert_eq!(collector.borrow().objective_value(0), 9);
}
