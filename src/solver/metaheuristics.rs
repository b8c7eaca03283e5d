//! Metaheuristics: tabu search, simulated annealing, and guided local
//! search, expressed as search monitors.
//!
//! Each one steers a restarting search: during a descent it injects
//! constraints shaping which neighbors are acceptable, records the
//! solutions it sees, and when the descent's tree is exhausted it treats
//! that as a local optimum and asks the driver to restart. A search limit
//! should accompany them, since tabu search in particular restarts until
//! stopped.

use std::collections::{HashMap, VecDeque};

use rand::Rng;
use tracing::debug;

use crate::error::PropagationResult;
use crate::solver::assignment::Assignment;
use crate::solver::constraints::cmp::{GreaterOrEqualCst, LessOrEqualCst, NotEqualCst};
use crate::solver::constraints::reified::{BoolOr, IsDifferentCst, IsEqualCst, IsGreaterOrEqualCst, IsLessOrEqualCst};
use crate::solver::decision::DecisionRef;
use crate::solver::engine::{Solver, VarId};
use crate::solver::monitor::SearchMonitor;

/// Objective bookkeeping shared by the metaheuristics: the value of the
/// last solution in this descent and the best over the whole search.
struct ObjectiveTracker {
    objective: VarId,
    step: i64,
    maximize: bool,
    current: i64,
    best: i64,
}

impl ObjectiveTracker {
    fn new(maximize: bool, objective: VarId, step: i64) -> Self {
        assert!(step > 0, "metaheuristic step must be positive");
        Self {
            objective,
            step,
            maximize,
            current: i64::MAX,
            best: i64::MAX,
        }
    }

    fn enter_search(&mut self, solver: &Solver) {
        if self.maximize {
            self.best = solver.min(self.objective);
            self.current = i64::MIN;
        } else {
            self.best = solver.max(self.objective);
            self.current = i64::MAX;
        }
    }

    fn at_solution(&mut self, solver: &Solver) {
        self.current = solver.value(self.objective);
        self.best = if self.maximize {
            self.best.max(self.current)
        } else {
            self.best.min(self.current)
        };
    }

    fn reset_current(&mut self) {
        self.current = if self.maximize { i64::MIN } else { i64::MAX };
    }

    /// The descent bound: go downhill from the last solution.
    fn downhill_bound(&self) -> Option<i64> {
        if self.maximize {
            (self.current > i64::MIN).then(|| self.current.saturating_add(self.step))
        } else {
            (self.current < i64::MAX).then(|| self.current.saturating_sub(self.step))
        }
    }
}

// ---------- Tabu search ----------

#[derive(Debug, Clone, Copy)]
struct VarValue {
    var: VarId,
    value: i64,
    stamp: u64,
}

/// Tabu search: keeps recently changed variables at their values (the
/// keep list) and forbids recently abandoned values (the forbid list),
/// unless the aspiration criterion (beating the best solution) holds.
/// `tabu_factor` softens the criterion: 1.0 tolerates no violation, 0.0
/// all of them.
pub struct TabuSearch {
    tracker: ObjectiveTracker,
    vars: Vec<VarId>,
    assignment: Assignment,
    last: i64,
    keep_tabu_list: VecDeque<VarValue>,
    keep_tenure: u64,
    forbid_tabu_list: VecDeque<VarValue>,
    forbid_tenure: u64,
    tabu_factor: f64,
    stamp: u64,
    found_initial_solution: bool,
}

impl TabuSearch {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        maximize: bool,
        objective: VarId,
        step: i64,
        vars: &[VarId],
        keep_tenure: u64,
        forbid_tenure: u64,
        tabu_factor: f64,
    ) -> Self {
        let mut assignment = Assignment::new();
        assignment.add_all(vars);
        Self {
            tracker: ObjectiveTracker::new(maximize, objective, step),
            vars: vars.to_vec(),
            assignment,
            last: i64::MAX,
            keep_tabu_list: VecDeque::new(),
            keep_tenure,
            forbid_tabu_list: VecDeque::new(),
            forbid_tenure,
            tabu_factor,
            stamp: 0,
            found_initial_solution: false,
        }
    }

    fn age_list(tenure: u64, stamp: u64, list: &mut VecDeque<VarValue>) {
        while let Some(back) = list.back() {
            if back.stamp + tenure < stamp {
                list.pop_back();
            } else {
                break;
            }
        }
    }

    fn age_lists(&mut self) {
        Self::age_list(self.keep_tenure, self.stamp, &mut self.keep_tabu_list);
        Self::age_list(self.forbid_tenure, self.stamp, &mut self.forbid_tabu_list);
        self.stamp += 1;
    }

    /// Posts the aspiration/tabu criterion and the downhill bound for this
    /// descent.
    fn inject(&mut self, solver: &mut Solver) -> PropagationResult {
        let objective = self.tracker.objective;

        // Aspiration: beating the best solution overrides the tabu lists.
        let aspiration = solver.make_bool_var("aspiration");
        if self.tracker.maximize {
            solver.add_constraint(IsGreaterOrEqualCst::new(
                objective,
                self.tracker.best.saturating_add(self.tracker.step),
                aspiration,
            ))?;
        } else {
            solver.add_constraint(IsLessOrEqualCst::new(
                objective,
                self.tracker.best.saturating_sub(self.tracker.step),
                aspiration,
            ))?;
        }

        let mut tabu_vars = Vec::new();
        for vv in &self.keep_tabu_list {
            let t = solver.make_bool_var("keep_tabu");
            solver.add_constraint(IsEqualCst::new(vv.var, vv.value, t))?;
            tabu_vars.push(t);
        }
        for vv in &self.forbid_tabu_list {
            let t = solver.make_bool_var("forbid_tabu");
            solver.add_constraint(IsDifferentCst::new(vv.var, vv.value, t))?;
            tabu_vars.push(t);
        }
        if !tabu_vars.is_empty() {
            let required = (tabu_vars.len() as f64 * self.tabu_factor).ceil() as i64;
            let tabu = solver.make_bool_var("tabu");
            let sum = solver.make_sum_of(&tabu_vars);
            let sum_var = solver.expr_var(sum);
            solver.add_constraint(IsGreaterOrEqualCst::new(sum_var, required, tabu))?;
            solver.add_constraint(BoolOr::new(vec![aspiration, tabu]))?;
        }

        // Go downhill to the next local optimum.
        if let Some(bound) = self.tracker.downhill_bound() {
            if self.tracker.maximize {
                solver.add_constraint(GreaterOrEqualCst::new(objective, bound))?;
            } else {
                solver.add_constraint(LessOrEqualCst::new(objective, bound))?;
            }
        }

        // Cost plateaus breed tabu cycles.
        if self.found_initial_solution {
            solver.add_constraint(NotEqualCst::new(objective, self.last))?;
        }
        Ok(())
    }
}

impl SearchMonitor for TabuSearch {
    fn enter_search(&mut self, solver: &mut Solver) {
        self.tracker.enter_search(solver);
        self.found_initial_solution = false;
    }

    fn apply_decision(&mut self, solver: &mut Solver, _d: &DecisionRef) -> PropagationResult {
        // The criteria hold for a whole descent; inject them with the
        // first decision after the root or a restart.
        if solver.search_depth() <= 1 {
            self.inject(solver)?;
        }
        Ok(())
    }

    fn at_solution(&mut self, solver: &mut Solver) -> bool {
        self.tracker.at_solution(solver);
        self.found_initial_solution = true;
        self.last = self.tracker.current;
        // After the first local optimum, record which variables moved.
        if self.stamp != 0 {
            for &var in &self.vars {
                let old_value = self.assignment.value(var);
                let new_value = solver.value(var);
                if old_value != new_value {
                    self.keep_tabu_list.push_front(VarValue {
                        var,
                        value: new_value,
                        stamp: self.stamp,
                    });
                    self.forbid_tabu_list.push_front(VarValue {
                        var,
                        value: old_value,
                        stamp: self.stamp,
                    });
                }
            }
        }
        self.assignment.store(solver);
        true
    }

    fn local_optimum(&mut self, _solver: &mut Solver) -> bool {
        debug!(stamp = self.stamp, "tabu search reached a local optimum");
        self.age_lists();
        self.tracker.reset_current();
        self.found_initial_solution
    }

    fn accept_neighbor(&mut self, _solver: &mut Solver) {
        if self.stamp != 0 {
            self.age_lists();
        }
    }
}

// ---------- Simulated annealing ----------

/// Simulated annealing with the Cauchy schedule `T(k) = T0 / k`: each
/// descent relaxes the downhill bound by an energy sampled from the
/// current temperature, and the walk freezes once the temperature reaches
/// zero.
pub struct SimulatedAnnealing {
    tracker: ObjectiveTracker,
    initial_temperature: i64,
    iteration: u64,
    found_initial_solution: bool,
}

impl SimulatedAnnealing {
    pub fn new(maximize: bool, objective: VarId, step: i64, initial_temperature: i64) -> Self {
        Self {
            tracker: ObjectiveTracker::new(maximize, objective, step),
            initial_temperature,
            iteration: 0,
            found_initial_solution: false,
        }
    }

    fn temperature(&self) -> f64 {
        if self.iteration > 0 {
            self.initial_temperature as f64 / self.iteration as f64
        } else {
            0.0
        }
    }

    fn energy_bound(&self, solver: &mut Solver) -> i64 {
        let uniform: f64 = solver.rng.gen::<f64>().max(f64::MIN_POSITIVE);
        (self.temperature() * uniform.log2()) as i64
    }
}

impl SearchMonitor for SimulatedAnnealing {
    fn enter_search(&mut self, solver: &mut Solver) {
        self.tracker.enter_search(solver);
        self.found_initial_solution = false;
    }

    fn apply_decision(&mut self, solver: &mut Solver, _d: &DecisionRef) -> PropagationResult {
        if solver.search_depth() > 1 {
            return Ok(());
        }
        let energy = self.energy_bound(solver);
        let objective = self.tracker.objective;
        if self.tracker.maximize {
            if self.tracker.current > i64::MIN {
                let bound = self
                    .tracker
                    .current
                    .saturating_add(self.tracker.step)
                    .saturating_add(energy);
                solver.add_constraint(GreaterOrEqualCst::new(objective, bound))?;
            }
        } else if self.tracker.current < i64::MAX {
            let bound = self
                .tracker
                .current
                .saturating_sub(self.tracker.step)
                .saturating_sub(energy);
            solver.add_constraint(LessOrEqualCst::new(objective, bound))?;
        }
        Ok(())
    }

    fn at_solution(&mut self, solver: &mut Solver) -> bool {
        self.tracker.at_solution(solver);
        self.found_initial_solution = true;
        true
    }

    fn local_optimum(&mut self, _solver: &mut Solver) -> bool {
        self.tracker.reset_current();
        self.iteration += 1;
        self.found_initial_solution && self.temperature() > 0.0
    }

    fn accept_neighbor(&mut self, _solver: &mut Solver) {
        if self.iteration > 0 {
            self.iteration += 1;
        }
    }
}

// ---------- Guided local search ----------

/// Penalty storage for (variable, value) pairs.
enum Penalties {
    /// Matrix-backed; value indices must be non-negative.
    Table(Vec<Vec<i64>>),
    /// Hash-backed, for sparse or signed value spaces.
    Map(HashMap<(usize, i64), i64>),
}

impl Penalties {
    fn increment(&mut self, index: usize, value: i64) {
        match self {
            Penalties::Table(rows) => {
                let row = &mut rows[index];
                let slot = usize::try_from(value).expect("dense penalties need non-negative values");
                if slot >= row.len() {
                    row.resize(slot + 1, 0);
                }
                row[slot] += 1;
            }
            Penalties::Map(map) => {
                *map.entry((index, value)).or_insert(0) += 1;
            }
        }
    }

    fn value(&self, index: usize, value: i64) -> i64 {
        match self {
            Penalties::Table(rows) => usize::try_from(value)
                .ok()
                .and_then(|slot| rows[index].get(slot))
                .copied()
                .unwrap_or(0),
            Penalties::Map(map) => map.get(&(index, value)).copied().unwrap_or(0),
        }
    }

    fn reset(&mut self) {
        match self {
            Penalties::Table(rows) => rows.iter_mut().for_each(|r| r.clear()),
            Penalties::Map(map) => map.clear(),
        }
    }
}

/// Guided local search: penalizes the (variable, value) features of each
/// local optimum, steering later descents away from them. The effective
/// objective is `base + λ · Σ penalty(i, vᵢ) · cost(i, vᵢ)` over the
/// current assignment; on each local optimum the features maximizing
/// `cost / (1 + penalty)` take an extra penalty.
pub struct GuidedLocalSearch {
    tracker: ObjectiveTracker,
    vars: Vec<VarId>,
    assignment: Assignment,
    penalty_factor: f64,
    costs: Box<dyn Fn(usize, i64) -> i64>,
    penalties: Penalties,
    found_initial_solution: bool,
}

impl GuidedLocalSearch {
    /// `costs(i, v)` is the base cost of variable `i` taking value `v`.
    /// `sparse` selects hash-backed penalty storage.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        maximize: bool,
        objective: VarId,
        step: i64,
        vars: &[VarId],
        penalty_factor: f64,
        costs: impl Fn(usize, i64) -> i64 + 'static,
        sparse: bool,
    ) -> Self {
        let mut assignment = Assignment::new();
        assignment.add_all(vars);
        let penalties = if sparse {
            Penalties::Map(HashMap::new())
        } else {
            Penalties::Table(vec![Vec::new(); vars.len()])
        };
        Self {
            tracker: ObjectiveTracker::new(maximize, objective, step),
            vars: vars.to_vec(),
            assignment,
            penalty_factor,
            costs: Box::new(costs),
            penalties,
            found_initial_solution: false,
        }
    }

    /// The penalty component of the effective objective for the stored
    /// assignment.
    fn assignment_penalty(&self) -> i64 {
        let mut total = 0.0;
        for (i, _) in self.vars.iter().enumerate() {
            let value = self.assignment.value(self.vars[i]);
            let penalty = self.penalties.value(i, value);
            total += self.penalty_factor * (penalty * (self.costs)(i, value)) as f64;
        }
        total as i64
    }
}

impl SearchMonitor for GuidedLocalSearch {
    fn enter_search(&mut self, solver: &mut Solver) {
        self.tracker.enter_search(solver);
        self.found_initial_solution = false;
        self.penalties.reset();
    }

    fn apply_decision(&mut self, solver: &mut Solver, _d: &DecisionRef) -> PropagationResult {
        if solver.search_depth() > 1 || !self.found_initial_solution {
            return Ok(());
        }
        // Bound the base objective by the penalized value of the last
        // solution: penalties let the walk accept worse base costs.
        let relaxation = self.assignment_penalty();
        let objective = self.tracker.objective;
        if self.tracker.maximize {
            let bound = self
                .tracker
                .current
                .saturating_add(self.tracker.step)
                .saturating_sub(relaxation);
            solver.add_constraint(GreaterOrEqualCst::new(objective, bound))?;
        } else {
            let bound = self
                .tracker
                .current
                .saturating_sub(self.tracker.step)
                .saturating_add(relaxation);
            solver.add_constraint(LessOrEqualCst::new(objective, bound))?;
        }
        Ok(())
    }

    fn at_solution(&mut self, solver: &mut Solver) -> bool {
        self.tracker.at_solution(solver);
        self.found_initial_solution = true;
        self.assignment.store(solver);
        true
    }

    fn local_optimum(&mut self, _solver: &mut Solver) -> bool {
        if !self.found_initial_solution {
            return false;
        }
        // Penalize the features with the highest utility.
        let mut best_utility = f64::MIN;
        let mut winners: Vec<(usize, i64)> = Vec::new();
        for (i, &var) in self.vars.iter().enumerate() {
            let value = self.assignment.value(var);
            let cost = (self.costs)(i, value);
            let utility = cost as f64 / (1.0 + self.penalties.value(i, value) as f64);
            if utility > best_utility {
                best_utility = utility;
                winners.clear();
                winners.push((i, value));
            } else if utility == best_utility {
                winners.push((i, value));
            }
        }
        for (i, value) in winners {
            self.penalties.increment(i, value);
        }
        self.tracker.reset_current();
        true
    }
}
