//! Limit monitors: scalar caps, combinators, cumulative budgets, and the
//! restart counter policy.

use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use tangram::{
    builder, Assignment, ConstantRestart, CustomLimit, IntValueStrategy, IntVarStrategy,
    MonitorRef, OrLimit, Phase, RegularLimit, SolutionCollector, Solver, VarId,
};

fn wide_model(solver: &mut Solver, n: usize, span: i64) -> Vec<VarId> {
    (0..n)
        .map(|i| solver.make_int_var(0, span, &format!("v{i}")))
        .collect()
}

fn enumerate_db(vars: &[VarId]) -> tangram::DecisionBuilderRef {
    builder(Phase::new(
        vars,
        IntVarStrategy::ChooseFirstUnbound,
        IntValueStrategy::AssignMinValue,
    ))
}

fn collect_all(vars: &[VarId]) -> Rc<RefCell<SolutionCollector>> {
    let mut prototype = Assignment::new();
    prototype.add_all(vars);
    Rc::new(RefCell::new(SolutionCollector::all(&prototype)))
}

#[test]
fn solutions_limit_stops_early() {
    let mut solver = Solver::new("limits");
    let vars = wide_model(&mut solver, 3, 3);
    let collector = collect_all(&vars);
    let limit = tangram::monitor(RegularLimit::solutions(5));
    solver.solve(
        enumerate_db(&vars),
        vec![collector.clone() as MonitorRef, limit],
    );
    assert_eq!(collector.borrow().solution_count(), 5);
}

#[test]
fn failures_limit_stops_early() {
    let mut solver = Solver::new("limits");
    // Pigeonhole: four variables, three values; every leaf fails.
    let vars = wide_model(&mut solver, 4, 2);
    solver
        .add_constraint(tangram::AllDifferent::new(vars.clone()))
        .unwrap();
    let limit = tangram::monitor(RegularLimit::failures(10));
    assert!(!solver.solve(enumerate_db(&vars), vec![limit]));
    assert!(solver.failures() >= 10);
    assert!(solver.failures() <= 13);
}

#[test]
fn branches_limit_stops_early() {
    let mut solver = Solver::new("limits");
    let vars = wide_model(&mut solver, 4, 6);
    let collector = collect_all(&vars);
    let limit = tangram::monitor(RegularLimit::branches(20));
    solver.solve(
        enumerate_db(&vars),
        vec![collector.clone() as MonitorRef, limit],
    );
    // The cap is cooperative: a backtrack chain in flight may add a few
    // branches past it.
    assert!(solver.branches() <= 26);
}

#[test]
fn cumulative_limit_spans_searches() {
    let mut solver = Solver::new("limits");
    let vars = wide_model(&mut solver, 3, 3);
    let limit = tangram::monitor(RegularLimit::solutions(6).cumulative());

    let collector = collect_all(&vars);
    solver.solve(
        enumerate_db(&vars),
        vec![collector.clone() as MonitorRef, limit.clone()],
    );
    let first_run = collector.borrow().solution_count();
    assert_eq!(first_run, 6);

    // The budget is spent; a second search gets nothing.
    let collector2 = collect_all(&vars);
    solver.solve(
        enumerate_db(&vars),
        vec![collector2.clone() as MonitorRef, limit],
    );
    assert_eq!(collector2.borrow().solution_count(), 0);
}

#[test]
fn or_limit_checks_both_sides() {
    let mut solver = Solver::new("limits");
    let vars = wide_model(&mut solver, 3, 3);
    let collector = collect_all(&vars);
    let limit = tangram::monitor(OrLimit::new(
        Box::new(RegularLimit::solutions(4)),
        Box::new(RegularLimit::branches(1_000_000)),
    ));
    solver.solve(
        enumerate_db(&vars),
        vec![collector.clone() as MonitorRef, limit],
    );
    assert_eq!(collector.borrow().solution_count(), 4);
}

#[test]
fn custom_limit_consults_the_callback() {
    let mut solver = Solver::new("limits");
    let vars = wide_model(&mut solver, 3, 3);
    let collector = collect_all(&vars);
    let limit = tangram::monitor(CustomLimit::new(|s: &mut Solver| s.solutions() >= 3));
    solver.solve(
        enumerate_db(&vars),
        vec![collector.clone() as MonitorRef, limit],
    );
    assert_eq!(collector.borrow().solution_count(), 3);
}

#[test]
fn restarts_reset_per_search_counters_but_not_cumulative_ones() {
    let mut solver = Solver::new("restarts");
    // Pigeonhole again: failures arrive steadily, solutions never.
    let vars = wide_model(&mut solver, 3, 1);
    solver
        .add_constraint(tangram::AllDifferent::new(vars.clone()))
        .unwrap();

    // Restart every 2 failures, stop after 20.
    let restart = tangram::monitor(ConstantRestart::new(2));
    let limit = tangram::monitor(RegularLimit::failures(20));

    let stats = Rc::new(RefCell::new(RestartStats::default()));
    let observer = tangram::monitor(RestartObserver {
        stats: stats.clone(),
    });
    solver.solve(enumerate_db(&vars), vec![restart, limit, observer]);

    let seen = stats.borrow();
    assert!(seen.restarts > 0);
    // Per-search failures reset at each restart; the solver-wide counter
    // keeps accumulating.
    assert_eq!(seen.max_search_failures, 0);
    assert!(seen.max_total_failures >= 4);
}

#[derive(Default)]
struct RestartStats {
    restarts: u64,
    max_search_failures: u64,
    max_total_failures: u64,
}

struct RestartObserver {
    stats: Rc<RefCell<RestartStats>>,
}

impl tangram::SearchMonitor for RestartObserver {
    fn restart_search(&mut self, solver: &mut Solver) {
        let mut stats = self.stats.borrow_mut();
        stats.restarts += 1;
        stats.max_search_failures = stats.max_search_failures.max(solver.search_failures());
        stats.max_total_failures = stats.max_total_failures.max(solver.failures());
    }
}

#[test]
fn improvement_limit_tolerates_a_steady_climb() {
    use tangram::{ImprovementLimit, OptimizeVar};

    let mut solver = Solver::new("improvement");
    let x = solver.make_int_var(0, 30, "x");
    let mut prototype = Assignment::new();
    prototype.add(x);
    prototype.add_objective(x);
    let collector = Rc::new(RefCell::new(SolutionCollector::best_value(&prototype, false)));
    let optimize = tangram::monitor(OptimizeVar::minimize(x, 1));
    // Every solution improves by exactly one: the rate never drops below
    // half of the reference, so the limit must not trigger.
    let limit = tangram::monitor(ImprovementLimit::new(x, false, 4, 0.5));

    let db = builder(Phase::new(
        &[x],
        IntVarStrategy::ChooseFirstUnbound,
        IntValueStrategy::AssignMaxValue,
    ));
    assert!(solver.solve(
        db,
        vec![collector.clone() as MonitorRef, optimize, limit],
    ));
    assert_eq!(collector.borrow().objective_value(0), 0);
}
