//! Value-selection strategies: which value (or half) to commit a chosen
//! variable to.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::solver::engine::{Solver, VarId};

/// The built-in value-selection strategies. The two `Split*` strategies
/// produce domain-splitting decisions rather than assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntValueStrategy {
    AssignMinValue,
    AssignMaxValue,
    AssignRandomValue,
    AssignCenterValue,
    SplitLowerHalf,
    SplitUpperHalf,
}

impl IntValueStrategy {
    pub fn selector(self) -> Box<dyn ValueSelector> {
        match self {
            IntValueStrategy::AssignMaxValue => Box::new(MaxValue),
            IntValueStrategy::AssignRandomValue => Box::new(RandomValue),
            IntValueStrategy::AssignCenterValue => Box::new(CenterValue),
            // Splits carry their pivot in the decision itself.
            IntValueStrategy::AssignMinValue
            | IntValueStrategy::SplitLowerHalf
            | IntValueStrategy::SplitUpperHalf => Box::new(MinValue),
        }
    }
}

/// Picks the value to try first for `var`. Only called on unbound
/// variables, so the domain has at least two values.
pub trait ValueSelector {
    fn select(&self, solver: &mut Solver, var: VarId) -> i64;
}

pub struct MinValue;

impl ValueSelector for MinValue {
    fn select(&self, solver: &mut Solver, var: VarId) -> i64 {
        solver.min(var)
    }
}

pub struct MaxValue;

impl ValueSelector for MaxValue {
    fn select(&self, solver: &mut Solver, var: VarId) -> i64 {
        solver.max(var)
    }
}

/// A uniformly random value from the current domain.
pub struct RandomValue;

impl ValueSelector for RandomValue {
    fn select(&self, solver: &mut Solver, var: VarId) -> i64 {
        let k = solver.rng.gen_range(0..solver.size(var));
        solver
            .domain_iter(var)
            .nth(k as usize)
            .expect("domain size and iterator disagree")
    }
}

/// The present value closest to the middle of the domain, preferring the
/// lower side on ties.
pub struct CenterValue;

impl ValueSelector for CenterValue {
    fn select(&self, solver: &mut Solver, var: VarId) -> i64 {
        let min = solver.min(var);
        let max = solver.max(var);
        let center = min + (max - min) / 2;
        for delta in 0..=(max - min) {
            if center - delta >= min && solver.contains(var, center - delta) {
                return center - delta;
            }
            if center + delta <= max && solver.contains(var, center + delta) {
                return center + delta;
            }
        }
        unreachable!("non-empty domain has no values")
    }
}
