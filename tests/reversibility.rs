//! Quantified reversibility properties: anything a search subtree does to
//! a variable is undone exactly on backtrack, and the queue batches
//! demons once per event burst.

use proptest::prelude::*;
use tangram::{DemonPriority, MarkerKind, Solver, VarId};

#[derive(Debug, Clone)]
enum Mutation {
    SetMin(i64),
    SetMax(i64),
    RemoveValue(i64),
    RemoveInterval(i64, i64),
}

fn mutation_strategy() -> impl Strategy<Value = Mutation> {
    prop_oneof![
        (0i64..60).prop_map(Mutation::SetMin),
        (0i64..60).prop_map(Mutation::SetMax),
        (0i64..60).prop_map(Mutation::RemoveValue),
        (0i64..60, 0i64..8).prop_map(|(l, w)| Mutation::RemoveInterval(l, l + w)),
    ]
}

fn apply(solver: &mut Solver, var: VarId, mutation: &Mutation) {
    // Failures are fine; the domain must stay intact when they happen.
    let _ = match *mutation {
        Mutation::SetMin(m) => solver.set_min(var, m),
        Mutation::SetMax(m) => solver.set_max(var, m),
        Mutation::RemoveValue(v) => solver.remove_value(var, v),
        Mutation::RemoveInterval(l, u) => solver.remove_interval(var, l, u),
    };
}

proptest! {
    /// After popping back past a mutation burst, min, max, size, and
    /// every membership query equal their values before the burst.
    #[test]
    fn backtracking_restores_the_domain_exactly(
        prefix in proptest::collection::vec(mutation_strategy(), 0..6),
        burst in proptest::collection::vec(mutation_strategy(), 1..20),
    ) {
        let mut solver = Solver::new("rev");
        let var = solver.make_int_var(0, 59, "v");
        for m in &prefix {
            apply(&mut solver, var, m);
        }
        let before_min = solver.min(var);
        let before_max = solver.max(var);
        let before_size = solver.size(var);
        let before_membership: Vec<bool> = (0..60).map(|k| solver.contains(var, k)).collect();

        solver.push_state(MarkerKind::Sentinel);
        for m in &burst {
            apply(&mut solver, var, m);
        }
        solver.pop_state();

        prop_assert_eq!(solver.min(var), before_min);
        prop_assert_eq!(solver.max(var), before_max);
        prop_assert_eq!(solver.size(var), before_size);
        for (k, expected) in before_membership.iter().enumerate() {
            prop_assert_eq!(solver.contains(var, k as i64), *expected);
        }
    }
}

#[test]
fn demons_run_once_per_batch() {
    use std::cell::Cell;
    use std::rc::Rc;

    let mut solver = Solver::new("batch");
    let x = solver.make_int_var(0, 100, "x");
    let runs = Rc::new(Cell::new(0u32));
    let counter = runs.clone();
    let demon = solver.make_demon(DemonPriority::Normal, "count_runs", move |_s| {
        counter.set(counter.get() + 1);
        Ok(())
    });
    solver.when_range(x, demon);

    // Three range events inside one frozen batch collapse to one run.
    solver.freeze_queue();
    solver.set_min(x, 10).unwrap();
    solver.set_min(x, 20).unwrap();
    solver.set_max(x, 80).unwrap();
    solver.unfreeze_queue().unwrap();
    assert_eq!(runs.get(), 1);

    // A separate batch schedules the demon again.
    solver.set_min(x, 30).unwrap();
    assert_eq!(runs.get(), 2);
}

#[test]
fn nested_freezes_must_balance_before_draining() {
    use std::cell::Cell;
    use std::rc::Rc;

    let mut solver = Solver::new("freeze");
    let x = solver.make_int_var(0, 10, "x");
    let runs = Rc::new(Cell::new(0u32));
    let counter = runs.clone();
    let demon = solver.make_demon(DemonPriority::Normal, "count_runs", move |_s| {
        counter.set(counter.get() + 1);
        Ok(())
    });
    solver.when_range(x, demon);

    solver.freeze_queue();
    solver.freeze_queue();
    solver.set_min(x, 3).unwrap();
    solver.unfreeze_queue().unwrap();
    // Still one freeze deep: nothing ran yet.
    assert_eq!(runs.get(), 0);
    solver.unfreeze_queue().unwrap();
    assert_eq!(runs.get(), 1);
}

#[test]
fn delayed_demons_run_after_the_others() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let mut solver = Solver::new("priorities");
    let x = solver.make_int_var(0, 10, "x");
    let order = Rc::new(RefCell::new(Vec::new()));

    let log = order.clone();
    let delayed = solver.make_demon(DemonPriority::Delayed, "delayed", move |_s| {
        log.borrow_mut().push("delayed");
        Ok(())
    });
    let log = order.clone();
    let normal = solver.make_demon(DemonPriority::Normal, "normal", move |_s| {
        log.borrow_mut().push("normal");
        Ok(())
    });
    let log = order.clone();
    let var_priority = solver.make_demon(DemonPriority::Var, "var", move |_s| {
        log.borrow_mut().push("var");
        Ok(())
    });

    solver.freeze_queue();
    solver.enqueue(delayed);
    solver.enqueue(var_priority);
    solver.enqueue(normal);
    solver.unfreeze_queue().unwrap();
    let _ = x;
    assert_eq!(*order.borrow(), vec!["normal", "var", "delayed"]);
}

#[test]
fn inhibited_demons_are_skipped() {
    use std::cell::Cell;
    use std::rc::Rc;

    let mut solver = Solver::new("inhibit");
    let x = solver.make_int_var(0, 10, "x");
    let runs = Rc::new(Cell::new(0u32));
    let counter = runs.clone();
    let demon = solver.make_demon(DemonPriority::Normal, "count_runs", move |_s| {
        counter.set(counter.get() + 1);
        Ok(())
    });
    solver.when_range(x, demon);

    solver.inhibit(demon);
    solver.set_min(x, 2).unwrap();
    assert_eq!(runs.get(), 0);

    solver.desinhibit(demon);
    solver.set_min(x, 4).unwrap();
    assert_eq!(runs.get(), 1);
}

#[test]
fn stamps_advance_with_pushes_and_failures() {
    let mut solver = Solver::new("stamps");
    let s0 = solver.current_stamp();
    solver.push_state(MarkerKind::Sentinel);
    assert!(solver.current_stamp() > s0);
    solver.pop_state();
    // The push stamp never goes backwards.
    assert!(solver.current_stamp() > s0);
}
