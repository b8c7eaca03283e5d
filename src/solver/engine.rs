//! The solver itself: owner of the trail, the demon queue, and the arenas
//! holding variables, expressions, constraints, and demons.
//!
//! Everything the model refers to is solver-owned and addressed by a typed
//! index. Cross-references between solver objects always go through
//! indices, never through shared pointers, so reversibility and lifetimes
//! are enforced in one place: the trail.

use std::rc::Rc;
use std::time::Instant;

use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use tracing::{debug, info};

use crate::error::{Failure, PropagationResult};
use crate::solver::constraint::Constraint;
use crate::solver::demon::DemonData;
use crate::solver::expr::ExprNode;
use crate::solver::monitor::MonitorRef;
use crate::solver::params::SolverParameters;
use crate::solver::queue::DemonQueue;
use crate::solver::search::Search;
use crate::solver::stats::DemonRunStats;
use crate::solver::trail::Trail;
use crate::solver::var::VarState;

/// A typed index to an integer variable owned by a solver.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct VarId(pub(crate) u32);

/// A typed index to an integer expression node owned by a solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(pub(crate) u32);

/// A typed index to a model constraint owned by a solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstraintId(pub(crate) u32);

impl std::fmt::Display for VarId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "?{}", self.0)
    }
}

pub(crate) struct ConstraintEntry {
    pub constraint: Rc<dyn Constraint>,
    pub posted: bool,
}

/// The main finite-domain constraint solver.
///
/// A `Solver` holds a model (variables, expressions, constraints), the
/// reversibility trail that makes search backtrackable, and the demon queue
/// that drives propagation to fixpoint. Searches are run with
/// [`solve`](Self::solve) or the decomposed
/// [`new_search`](Self::new_search) / [`next_solution`](Self::next_solution)
/// / [`end_search`](Self::end_search) form.
pub struct Solver {
    pub(crate) name: String,
    pub(crate) parameters: SolverParameters,
    pub(crate) trail: Trail,
    pub(crate) queue: DemonQueue,
    pub(crate) demons: Vec<DemonData>,
    pub(crate) vars: Vec<VarState>,
    pub(crate) exprs: Vec<ExprNode>,
    pub(crate) constraints: Vec<ConstraintEntry>,
    pub(crate) searches: Vec<Search>,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) demon_stats: Vec<DemonRunStats>,
    // Cumulative counters; they survive end_search and restarts.
    pub(crate) branch_count: u64,
    pub(crate) fail_count: u64,
    pub(crate) solution_count: u64,
    pub(crate) neighbor_count: u64,
    pub(crate) accepted_neighbor_count: u64,
    pub(crate) filtered_neighbor_count: u64,
    started: Instant,
}

impl Solver {
    /// Creates a solver with default parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_parameters(name, SolverParameters::default())
    }

    /// Creates a solver configured by `parameters`.
    pub fn with_parameters(name: impl Into<String>, parameters: SolverParameters) -> Self {
        let rng = if parameters.random_seed < 0 {
            ChaCha8Rng::from_entropy()
        } else {
            ChaCha8Rng::seed_from_u64(parameters.random_seed as u64)
        };
        let name = name.into();
        debug!(solver = %name, "creating solver");
        Self {
            name,
            parameters,
            trail: Trail::new(),
            queue: DemonQueue::new(),
            demons: Vec::new(),
            vars: Vec::new(),
            exprs: Vec::new(),
            constraints: Vec::new(),
            searches: Vec::new(),
            rng,
            demon_stats: Vec::new(),
            branch_count: 0,
            fail_count: 0,
            solution_count: 0,
            neighbor_count: 0,
            accepted_neighbor_count: 0,
            filtered_neighbor_count: 0,
            started: Instant::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &SolverParameters {
        &self.parameters
    }

    /// Signals an in-search inconsistency. Always written `solver.fail()?`
    /// or `return solver.fail()` inside propagators and decisions.
    pub fn fail(&self) -> PropagationResult {
        Err(Failure)
    }

    // ----- counters -----

    /// Branches explored, cumulative over every search on this solver.
    pub fn branches(&self) -> u64 {
        self.branch_count
    }

    /// Failures (leaves and dead ends), cumulative.
    pub fn failures(&self) -> u64 {
        self.fail_count
    }

    /// Accepted solutions, cumulative.
    pub fn solutions(&self) -> u64 {
        self.solution_count
    }

    /// Neighbor descents attempted by metaheuristic-driven searches.
    pub fn neighbors(&self) -> u64 {
        self.neighbor_count
    }

    pub fn accepted_neighbors(&self) -> u64 {
        self.accepted_neighbor_count
    }

    pub fn filtered_neighbors(&self) -> u64 {
        self.filtered_neighbor_count
    }

    /// Milliseconds since the solver was created.
    pub fn wall_time_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Number of model constraints.
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// The number of decisions applied in the active search.
    pub fn search_depth(&self) -> usize {
        self.searches.last().map_or(0, |s| s.applied.len())
    }

    // ----- model construction -----

    /// Adds a constraint to the model.
    ///
    /// Outside of search the constraint is recorded and posted when the
    /// next search opens its root node; the returned result is always `Ok`.
    /// Inside a search the constraint is posted and propagated on the spot,
    /// scoped to the current subtree, and the result reports whether
    /// propagation survived.
    pub fn add_constraint(&mut self, constraint: impl Constraint + 'static) -> PropagationResult {
        self.add_constraint_rc(Rc::new(constraint))
    }

    pub(crate) fn add_constraint_rc(
        &mut self,
        constraint: Rc<dyn Constraint>,
    ) -> PropagationResult {
        if self.parameters.print_added_constraints {
            info!(constraint = %constraint.descriptor(), "adding constraint");
        }
        if self.in_search() {
            // Transient: lives (and dies) with the current subtree.
            self.with_frozen_queue(|s| {
                constraint.post(s);
                constraint.initial_propagate(s)
            })
        } else {
            self.constraints.push(ConstraintEntry {
                constraint,
                posted: false,
            });
            Ok(())
        }
    }

    pub(crate) fn in_search(&self) -> bool {
        self.searches
            .last()
            .map_or(false, |s| s.state.is_inside_search())
    }

    /// Posts every not-yet-posted model constraint. Run by the driver just
    /// before a top-level search pushes its entry sentinel, so demon
    /// subscriptions made here at depth zero are permanent.
    pub(crate) fn post_pending_constraints(&mut self) {
        for i in 0..self.constraints.len() {
            if self.constraints[i].posted {
                continue;
            }
            self.constraints[i].posted = true;
            let c = Rc::clone(&self.constraints[i].constraint);
            c.post(self);
        }
    }

    /// Seeds the propagation fixpoint with every model constraint's initial
    /// propagation, then drains the queue.
    pub(crate) fn run_initial_propagation(&mut self) -> PropagationResult {
        self.with_frozen_queue(|s| {
            for i in 0..s.constraints.len() {
                let c = Rc::clone(&s.constraints[i].constraint);
                c.initial_propagate(s)?;
            }
            Ok(())
        })
    }

    pub(crate) fn record_demon_run(
        &mut self,
        demon: crate::solver::demon::DemonId,
        elapsed: std::time::Duration,
        failed: bool,
    ) {
        let i = demon.0 as usize;
        if self.demon_stats.len() <= i {
            self.demon_stats.resize_with(i + 1, DemonRunStats::default);
        }
        let entry = &mut self.demon_stats[i];
        entry.runs += 1;
        if failed {
            entry.failures += 1;
        }
        entry.time_spent_micros += elapsed.as_micros() as u64;
    }

    pub(crate) fn active_monitors(&self) -> Vec<MonitorRef> {
        self.searches
            .last()
            .map_or_else(Vec::new, |s| s.monitors.clone())
    }

    pub(crate) fn top_level_monitors(&self) -> Vec<MonitorRef> {
        self.searches
            .first()
            .map_or_else(Vec::new, |s| s.monitors.clone())
    }
}

impl std::fmt::Debug for Solver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Solver")
            .field("name", &self.name)
            .field("vars", &self.vars.len())
            .field("constraints", &self.constraints.len())
            .field("branches", &self.branch_count)
            .field("failures", &self.fail_count)
            .field("solutions", &self.solution_count)
            .finish()
    }
}
