//! Interval-removal semantics: bound tightening must hop over forbidden
//! intervals exactly.

use tangram::{
    builder, Decision, DecisionBuilder, DecisionRef, PropagationResult, Solver, VarId,
};

fn solver_with_var(forbidden: &[(i64, i64)]) -> (Solver, VarId) {
    let mut solver = Solver::new("forbidden_intervals");
    let var = solver.make_int_var(0, 1000, "var");
    for &(start, end) in forbidden {
        solver.remove_interval(var, start, end).unwrap();
    }
    (solver, var)
}

/// A decision builder that runs a scripted sequence of bound checks and
/// tightenings at the root of the search.
struct Script {
    var: VarId,
    steps: fn(&mut Solver, VarId) -> PropagationResult,
}

impl std::fmt::Debug for Script {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Script").finish()
    }
}

impl DecisionBuilder for Script {
    fn next(&self, solver: &mut Solver) -> PropagationResult<Option<DecisionRef>> {
        (self.steps)(solver, self.var)?;
        Ok(None)
    }
}

#[test]
fn simple_reduction_on_both_sides() {
    let (mut solver, var) = solver_with_var(&[(0, 100), (900, 1000)]);
    assert_eq!(solver.min(var), 101);
    assert_eq!(solver.max(var), 899);
    assert_eq!(solver.size(var), 799);

    fn steps(s: &mut Solver, v: VarId) -> PropagationResult {
        assert_eq!(s.min(v), 101);
        assert_eq!(s.max(v), 899);
        Ok(())
    }
    assert!(solver.solve(builder(Script { var, steps }), vec![]));
}

#[test]
fn multiple_reductions_on_min() {
    let (mut solver, var) = solver_with_var(&[(10, 20), (500, 510), (800, 900)]);

    fn steps(s: &mut Solver, v: VarId) -> PropagationResult {
        assert_eq!(s.min(v), 0);
        assert_eq!(s.max(v), 1000);
        s.set_min(v, 5)?;
        assert_eq!(s.min(v), 5);
        assert_eq!(s.max(v), 1000);
        s.set_max(v, 995)?;
        assert_eq!(s.min(v), 5);
        assert_eq!(s.max(v), 995);
        s.set_min(v, 10)?;
        assert_eq!(s.min(v), 21);
        assert_eq!(s.max(v), 995);
        s.set_min(v, 30)?;
        assert_eq!(s.min(v), 30);
        s.set_min(v, 505)?;
        assert_eq!(s.min(v), 511);
        s.set_min(v, 600)?;
        assert_eq!(s.min(v), 600);
        s.set_min(v, 900)?;
        assert_eq!(s.min(v), 901);
        assert_eq!(s.max(v), 995);
        Ok(())
    }
    assert!(solver.solve(builder(Script { var, steps }), vec![]));
    // The scripted tightenings are unwound when the search ends.
    assert_eq!(solver.min(var), 0);
    assert_eq!(solver.max(var), 1000);
}

#[test]
fn multiple_reductions_on_max() {
    let (mut solver, var) = solver_with_var(&[(10, 20), (500, 510), (800, 900)]);

    fn steps(s: &mut Solver, v: VarId) -> PropagationResult {
        s.set_min(v, 5)?;
        s.set_max(v, 995)?;
        assert_eq!(s.min(v), 5);
        assert_eq!(s.max(v), 995);
        s.set_max(v, 900)?;
        assert_eq!(s.max(v), 799);
        s.set_max(v, 750)?;
        assert_eq!(s.max(v), 750);
        s.set_max(v, 505)?;
        assert_eq!(s.max(v), 499);
        s.set_max(v, 300)?;
        assert_eq!(s.max(v), 300);
        s.set_max(v, 20)?;
        assert_eq!(s.max(v), 9);
        assert_eq!(s.min(v), 5);
        Ok(())
    }
    assert!(solver.solve(builder(Script { var, steps }), vec![]));
}

/// A decision used to pin interval state under a real choice point.
#[derive(Debug)]
struct Narrow {
    var: VarId,
}

impl Decision for Narrow {
    fn apply(&self, solver: &mut Solver) -> PropagationResult {
        solver.set_min(self.var, 505)
    }

    fn refute(&self, solver: &mut Solver) -> PropagationResult {
        solver.set_max(self.var, 499)
    }
}

#[derive(Debug)]
struct NarrowOnce {
    var: VarId,
}

impl DecisionBuilder for NarrowOnce {
    fn next(&self, solver: &mut Solver) -> PropagationResult<Option<DecisionRef>> {
        if solver.min(self.var) >= 511 || solver.max(self.var) <= 499 {
            return Ok(None);
        }
        Ok(Some(std::rc::Rc::new(Narrow { var: self.var })))
    }
}

#[test]
fn interval_state_follows_backtracking() {
    let (mut solver, var) = solver_with_var(&[(500, 510)]);
    let db = builder(NarrowOnce { var });
    solver.new_search(db, vec![]);
    assert!(solver.next_solution());
    // Left branch hops the forbidden interval.
    assert_eq!(solver.min(var), 511);
    assert!(solver.next_solution());
    // Refutation lands just below it.
    assert_eq!(solver.max(var), 499);
    solver.end_search();
    assert_eq!(solver.min(var), 0);
    assert_eq!(solver.max(var), 1000);
}
