//! A 0-1 knapsack solved by tabu search over a restarting tree search.

use std::cell::RefCell;
use std::rc::Rc;

use clap::Parser;
use tangram::{
    builder, Assignment, IntValueStrategy, IntVarStrategy, MonitorRef, Phase, RegularLimit,
    ScalProdEq, SolutionCollector, Solver, TabuSearch, VarId,
};

#[derive(Parser, Debug)]
#[command(about = "0-1 knapsack under tabu search")]
struct Args {
    /// Knapsack capacity.
    #[arg(long, default_value_t = 30)]
    capacity: i64,
    /// Failure budget for the walk.
    #[arg(long, default_value_t = 5000)]
    failures: u64,
    #[arg(long, default_value_t = 5)]
    keep_tenure: u64,
    #[arg(long, default_value_t = 5)]
    forbid_tenure: u64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let weights = [5i64, 8, 3, 11, 7, 9, 4];
    let values = [10i64, 14, 6, 23, 8, 17, 5];

    let mut solver = Solver::new("knapsack_tabu");
    let items: Vec<VarId> = (0..weights.len())
        .map(|i| solver.make_bool_var(&format!("take_{i}")))
        .collect();
    let slack = solver.make_int_var(0, args.capacity, "slack");
    let mut weight_vars = items.clone();
    weight_vars.push(slack);
    let mut weight_coefficients = weights.to_vec();
    weight_coefficients.push(1);
    solver
        .add_constraint(ScalProdEq::new(weight_vars, weight_coefficients, args.capacity).unwrap())
        .unwrap();

    let objective = solver.make_int_var(0, values.iter().sum::<i64>(), "value");
    let mut value_vars = items.clone();
    value_vars.push(objective);
    let mut value_coefficients = values.to_vec();
    value_coefficients.push(-1);
    solver
        .add_constraint(ScalProdEq::new(value_vars, value_coefficients, 0).unwrap())
        .unwrap();

    let mut prototype = Assignment::new();
    prototype.add_all(&items);
    prototype.add_objective(objective);
    let collector = Rc::new(RefCell::new(SolutionCollector::best_value(&prototype, true)));

    let tabu = tangram::monitor(TabuSearch::new(
        true,
        objective,
        1,
        &items,
        args.keep_tenure,
        args.forbid_tenure,
        1.0,
    ));
    let limit = tangram::monitor(RegularLimit::failures(args.failures));

    let db = builder(Phase::new(
        &items,
        IntVarStrategy::ChooseFirstUnbound,
        IntValueStrategy::AssignMaxValue,
    ));
    solver.solve(db, vec![tabu, collector.clone() as MonitorRef, limit]);

    let best = collector.borrow();
    if best.solution_count() > 0 {
        let taken: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, &v)| best.solution(0).value(v) == 1)
            .map(|(i, _)| i)
            .collect();
        println!(
            "best value = {}, items = {:?}, neighbors = {}",
            best.objective_value(0),
            taken,
            solver.neighbors(),
        );
    } else {
        println!("no solution inside the budget");
    }
}
