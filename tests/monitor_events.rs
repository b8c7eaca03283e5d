//! Monitor notification order and the decision-modification protocol.

use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use tangram::{
    builder, DecisionModification, DecisionRef, IntValueStrategy, IntVarStrategy, Phase,
    PropagationResult, SearchMonitor, Solver, VarId,
};

type EventLog = Rc<RefCell<Vec<String>>>;

struct Recorder {
    tag: &'static str,
    log: EventLog,
}

impl Recorder {
    fn push(&self, event: &str) {
        self.log.borrow_mut().push(format!("{}:{event}", self.tag));
    }
}

impl SearchMonitor for Recorder {
    fn enter_search(&mut self, _s: &mut Solver) {
        self.push("enter_search");
    }
    fn exit_search(&mut self, _s: &mut Solver) {
        self.push("exit_search");
    }
    fn begin_initial_propagation(&mut self, _s: &mut Solver) {
        self.push("begin_initial_propagation");
    }
    fn end_initial_propagation(&mut self, _s: &mut Solver) {
        self.push("end_initial_propagation");
    }
    fn apply_decision(&mut self, _s: &mut Solver, _d: &DecisionRef) -> PropagationResult {
        self.push("apply_decision");
        Ok(())
    }
    fn refute_decision(&mut self, _s: &mut Solver, _d: &DecisionRef) -> PropagationResult {
        self.push("refute_decision");
        Ok(())
    }
    fn begin_fail(&mut self, _s: &mut Solver) {
        self.push("begin_fail");
    }
    fn accept_solution(&mut self, _s: &mut Solver) -> bool {
        self.push("accept_solution");
        true
    }
    fn at_solution(&mut self, _s: &mut Solver) -> bool {
        self.push("at_solution");
        false
    }
    fn no_more_solutions(&mut self, _s: &mut Solver) {
        self.push("no_more_solutions");
    }
}

fn one_var_db(x: VarId) -> tangram::DecisionBuilderRef {
    builder(Phase::new(
        &[x],
        IntVarStrategy::ChooseFirstUnbound,
        IntValueStrategy::AssignMinValue,
    ))
}

#[test]
fn the_driver_emits_the_canonical_event_sequence() {
    let mut solver = Solver::new("events");
    let x = solver.make_int_var(0, 0, "x");
    let log: EventLog = Rc::new(RefCell::new(Vec::new()));
    let recorder = tangram::monitor(Recorder {
        tag: "m",
        log: log.clone(),
    });

    // A single bound variable: the first candidate is the only solution.
    assert!(solver.solve(one_var_db(x), vec![recorder]));

    let events = log.borrow().clone();
    assert_eq!(
        events,
        vec![
            "m:enter_search",
            "m:begin_initial_propagation",
            "m:end_initial_propagation",
            "m:accept_solution",
            "m:at_solution",
            "m:exit_search",
        ]
    );
}

#[test]
fn monitors_are_notified_in_insertion_order() {
    let mut solver = Solver::new("events");
    let x = solver.make_int_var(0, 0, "x");
    let log: EventLog = Rc::new(RefCell::new(Vec::new()));
    let first = tangram::monitor(Recorder {
        tag: "first",
        log: log.clone(),
    });
    let second = tangram::monitor(Recorder {
        tag: "second",
        log: log.clone(),
    });

    solver.solve(one_var_db(x), vec![first, second]);

    let events = log.borrow().clone();
    let enters: Vec<&String> = events.iter().filter(|e| e.ends_with("enter_search")).collect();
    assert_eq!(enters, vec!["first:enter_search", "second:enter_search"]);
    let accepts: Vec<&String> = events
        .iter()
        .filter(|e| e.ends_with("accept_solution"))
        .collect();
    assert_eq!(accepts, vec!["first:accept_solution", "second:accept_solution"]);
}

struct VetoAll;

impl SearchMonitor for VetoAll {
    fn accept_solution(&mut self, _s: &mut Solver) -> bool {
        false
    }
}

#[test]
fn a_vetoing_monitor_turns_candidates_into_failures() {
    let mut solver = Solver::new("veto");
    let x = solver.make_int_var(0, 2, "x");
    assert!(!solver.solve(one_var_db(x), vec![tangram::monitor(VetoAll)]));
    assert_eq!(solver.solutions(), 0);
    assert!(solver.failures() >= 3);
}

struct AlwaysKeepRight;

impl SearchMonitor for AlwaysKeepRight {
    fn modify_decision(&mut self, _s: &mut Solver, _d: &DecisionRef) -> DecisionModification {
        DecisionModification::KeepRight
    }
}

#[test]
fn keep_right_skips_the_left_branches() {
    let mut solver = Solver::new("keep_right");
    let x = solver.make_int_var(0, 3, "x");
    let log: EventLog = Rc::new(RefCell::new(Vec::new()));
    let recorder = tangram::monitor(Recorder {
        tag: "m",
        log: log.clone(),
    });

    // Keeping only right branches removes the minimum each time; the
    // solution is the domain's maximum.
    solver.new_search(one_var_db(x), vec![tangram::monitor(AlwaysKeepRight), recorder]);
    assert!(solver.next_solution());
    assert_eq!(solver.value(x), 3);
    solver.end_search();

    let events = log.borrow().clone();
    assert!(events.iter().any(|e| e == "m:refute_decision"));
    assert!(!events.iter().any(|e| e == "m:apply_decision"));
}

struct KillEverything;

impl SearchMonitor for KillEverything {
    fn modify_decision(&mut self, _s: &mut Solver, _d: &DecisionRef) -> DecisionModification {
        DecisionModification::KillBoth
    }
}

#[test]
fn kill_both_prunes_the_whole_tree() {
    let mut solver = Solver::new("kill_both");
    let x = solver.make_int_var(0, 3, "x");
    assert!(!solver.solve(one_var_db(x), vec![tangram::monitor(KillEverything)]));
}
