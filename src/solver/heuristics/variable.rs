//! Variable-selection strategies: which unbound variable to branch on
//! next.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::solver::engine::{Solver, VarId};

/// The built-in variable-selection strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntVarStrategy {
    /// First unbound variable in list order.
    ChooseFirstUnbound,
    /// Uniformly random unbound variable.
    ChooseRandom,
    /// Smallest domain, ties broken by lowest min.
    ChooseMinSizeLowestMin,
    /// Smallest domain, ties broken by highest min.
    ChooseMinSizeHighestMin,
    /// Smallest domain, ties broken by lowest max.
    ChooseMinSizeLowestMax,
    /// Smallest domain, ties broken by highest max.
    ChooseMinSizeHighestMax,
    /// Lowest minimum.
    ChooseLowestMin,
    /// Highest maximum.
    ChooseHighestMax,
    /// Smallest domain.
    ChooseMinSize,
    /// Largest domain.
    ChooseMaxSize,
    /// Largest difference between the two smallest values.
    ChooseMaxRegretOnMin,
    /// Extend the chain of already-bound variables; falls back to the
    /// first unbound one when no extension exists.
    ChoosePath,
}

impl IntVarStrategy {
    pub fn selector(self) -> Box<dyn VariableSelector> {
        match self {
            IntVarStrategy::ChooseFirstUnbound => Box::new(FirstUnbound),
            IntVarStrategy::ChooseRandom => Box::new(RandomUnbound),
            IntVarStrategy::ChooseMinSizeLowestMin => {
                Box::new(BestScore::new(|s, v| (s.size(v) as i64, s.min(v))))
            }
            IntVarStrategy::ChooseMinSizeHighestMin => {
                Box::new(BestScore::new(|s, v| (s.size(v) as i64, -s.min(v))))
            }
            IntVarStrategy::ChooseMinSizeLowestMax => {
                Box::new(BestScore::new(|s, v| (s.size(v) as i64, s.max(v))))
            }
            IntVarStrategy::ChooseMinSizeHighestMax => {
                Box::new(BestScore::new(|s, v| (s.size(v) as i64, -s.max(v))))
            }
            IntVarStrategy::ChooseLowestMin => Box::new(BestScore::new(|s, v| (s.min(v), 0))),
            IntVarStrategy::ChooseHighestMax => Box::new(BestScore::new(|s, v| (-s.max(v), 0))),
            IntVarStrategy::ChooseMinSize => {
                Box::new(BestScore::new(|s, v| (s.size(v) as i64, 0)))
            }
            IntVarStrategy::ChooseMaxSize => {
                Box::new(BestScore::new(|s, v| (-(s.size(v) as i64), 0)))
            }
            IntVarStrategy::ChooseMaxRegretOnMin => Box::new(BestScore::new(|s, v| {
                let min = s.min(v);
                let second = s.domain_value_after(v, min).unwrap_or(min);
                (-(second - min), 0)
            })),
            IntVarStrategy::ChoosePath => Box::new(PathExtension),
        }
    }
}

/// Picks the next variable to branch on, or `None` when every variable in
/// the list is bound.
pub trait VariableSelector {
    fn select(&self, solver: &mut Solver, vars: &[VarId]) -> Option<VarId>;
}

/// The first unbound variable in list order; deterministic baseline.
pub struct FirstUnbound;

impl VariableSelector for FirstUnbound {
    fn select(&self, solver: &mut Solver, vars: &[VarId]) -> Option<VarId> {
        vars.iter().copied().find(|&v| !solver.bound(v))
    }
}

/// A uniformly random unbound variable; pairs well with restarts.
pub struct RandomUnbound;

impl VariableSelector for RandomUnbound {
    fn select(&self, solver: &mut Solver, vars: &[VarId]) -> Option<VarId> {
        let unbound: Vec<VarId> = vars.iter().copied().filter(|&v| !solver.bound(v)).collect();
        if unbound.is_empty() {
            return None;
        }
        let pick = solver.rng.gen_range(0..unbound.len());
        Some(unbound[pick])
    }
}

/// Minimizes a `(primary, tiebreak)` score over the unbound variables;
/// earlier variables win remaining ties, keeping every strategy
/// deterministic.
pub struct BestScore<F> {
    score: F,
}

impl<F> BestScore<F>
where
    F: Fn(&Solver, VarId) -> (i64, i64),
{
    pub fn new(score: F) -> Self {
        Self { score }
    }
}

impl<F> VariableSelector for BestScore<F>
where
    F: Fn(&Solver, VarId) -> (i64, i64),
{
    fn select(&self, solver: &mut Solver, vars: &[VarId]) -> Option<VarId> {
        let mut best: Option<(VarId, (i64, i64))> = None;
        for &v in vars {
            if solver.bound(v) {
                continue;
            }
            let score = (self.score)(solver, v);
            match &best {
                Some((_, incumbent)) if *incumbent <= score => {}
                _ => best = Some((v, score)),
            }
        }
        best.map(|(v, _)| v)
    }
}

/// Follows the list like a path: prefers the first unbound variable whose
/// predecessor is already bound.
pub struct PathExtension;

impl VariableSelector for PathExtension {
    fn select(&self, solver: &mut Solver, vars: &[VarId]) -> Option<VarId> {
        for (i, &v) in vars.iter().enumerate() {
            if solver.bound(v) {
                continue;
            }
            if i == 0 || solver.bound(vars[i - 1]) {
                return Some(v);
            }
        }
        vars.iter().copied().find(|&v| !solver.bound(v))
    }
}
