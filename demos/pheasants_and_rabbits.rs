//! The classic counting puzzle: heads and legs in a cage.

use std::cell::RefCell;
use std::rc::Rc;

use clap::Parser;
use tangram::{
    builder, Assignment, IntValueStrategy, IntVarStrategy, MonitorRef, Phase, ScalProdEq,
    SolutionCollector, Solver, SumEq,
};

#[derive(Parser, Debug)]
#[command(about = "Pheasants and rabbits: 20 heads, 56 legs")]
struct Args {
    #[arg(long, default_value_t = 20)]
    heads: i64,
    #[arg(long, default_value_t = 56)]
    legs: i64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let mut solver = Solver::new("pheasants_and_rabbits");
    let pheasants = solver.make_int_var(0, args.heads, "pheasants");
    let rabbits = solver.make_int_var(0, args.heads, "rabbits");
    solver
        .add_constraint(SumEq::new(vec![pheasants, rabbits], args.heads))
        .unwrap();
    solver
        .add_constraint(
            ScalProdEq::new(vec![pheasants, rabbits], vec![2, 4], args.legs).unwrap(),
        )
        .unwrap();

    let mut prototype = Assignment::new();
    prototype.add_all(&[pheasants, rabbits]);
    let collector = Rc::new(RefCell::new(SolutionCollector::first(&prototype)));

    let db = builder(Phase::new(
        &[pheasants, rabbits],
        IntVarStrategy::ChooseFirstUnbound,
        IntValueStrategy::AssignMinValue,
    ));
    if solver.solve(db, vec![collector.clone() as MonitorRef]) {
        let solutions = collector.borrow();
        println!(
            "pheasants = {}, rabbits = {}",
            solutions.value(0, pheasants),
            solutions.value(0, rabbits),
        );
    } else {
        println!("no consistent farmyard");
    }
}
