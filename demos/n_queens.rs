//! The n-queens puzzle: place n queens on an n×n board so that none
//! attacks another.

use std::cell::RefCell;
use std::rc::Rc;

use clap::Parser;
use tangram::{
    builder, AllDifferent, Assignment, IntValueStrategy, IntVarStrategy, MonitorRef, Phase,
    SearchLog, SolutionCollector, Solver, VarId,
};

#[derive(Parser, Debug)]
#[command(about = "Solve n-queens with a finite-domain CP search")]
struct Args {
    /// Board size.
    #[arg(short, default_value_t = 8)]
    n: usize,
    /// Count all solutions instead of stopping at the first.
    #[arg(long)]
    all: bool,
    /// Print the propagation profile after the search.
    #[arg(long)]
    profile: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let mut solver = if args.profile {
        Solver::with_parameters(
            "n_queens",
            tangram::SolverParameters {
                profile: true,
                ..tangram::SolverParameters::default()
            },
        )
    } else {
        Solver::new("n_queens")
    };
    let n = args.n as i64;
    let queens: Vec<VarId> = (0..args.n)
        .map(|i| solver.make_int_var(0, n - 1, &format!("x{i}")))
        .collect();

    solver
        .add_constraint(AllDifferent::new(queens.clone()))
        .unwrap();
    let mut up = Vec::new();
    let mut down = Vec::new();
    for (i, &q) in queens.iter().enumerate() {
        let e = solver.expr_of(q);
        let shifted = solver.make_offset(e, i as i64);
        up.push(solver.expr_var(shifted));
        let e = solver.expr_of(q);
        let shifted = solver.make_offset(e, -(i as i64));
        down.push(solver.expr_var(shifted));
    }
    solver.add_constraint(AllDifferent::new(up)).unwrap();
    solver.add_constraint(AllDifferent::new(down)).unwrap();

    let mut prototype = Assignment::new();
    prototype.add_all(&queens);
    let collector = Rc::new(RefCell::new(if args.all {
        SolutionCollector::all(&prototype)
    } else {
        SolutionCollector::first(&prototype)
    }));

    let db = builder(Phase::new(
        &queens,
        IntVarStrategy::ChooseMinSizeLowestMin,
        IntValueStrategy::AssignMinValue,
    ));
    let log = tangram::monitor(SearchLog::new(10_000));
    let found = solver.solve(db, vec![collector.clone() as MonitorRef, log]);

    let solutions = collector.borrow();
    if args.all {
        println!("{} solutions for n = {}", solutions.solution_count(), args.n);
    } else if found {
        let board: Vec<i64> = queens.iter().map(|&q| solutions.value(0, q)).collect();
        for row in 0..args.n {
            let line: String = (0..args.n)
                .map(|col| if board[row] == col as i64 { 'Q' } else { '.' })
                .collect();
            println!("{line}");
        }
        println!("{}", serde_json::to_string(&board).unwrap());
    } else {
        println!("no solution for n = {}", args.n);
    }
    println!(
        "branches = {}, failures = {}",
        solver.branches(),
        solver.failures()
    );
    if args.profile {
        println!("{}", solver.profile_table());
    }
}
