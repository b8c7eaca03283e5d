//! Solver construction parameters.
//!
//! All configuration is carried by an explicit value passed to
//! [`Solver::with_parameters`](crate::Solver::with_parameters); there is no
//! process-wide mutable state.

use serde::{Deserialize, Serialize};

/// Tuning and debugging knobs for a [`Solver`](crate::Solver).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverParameters {
    /// Install a search trace monitor that logs every search event.
    pub trace: bool,
    /// Collect per-demon propagation statistics, rendered by
    /// [`Solver::profile_table`](crate::Solver::profile_table).
    pub profile: bool,
    /// Seed for the per-solver random generator; `-1` seeds from entropy.
    pub random_seed: i64,
    /// Give unnamed variables a generated name at creation.
    pub name_all_variables: bool,
    /// Log every constraint as it is added to the model.
    pub print_added_constraints: bool,
    /// Build the model but refuse to search. Useful in tests that only
    /// exercise model construction.
    pub disable_solve: bool,
}

impl Default for SolverParameters {
    fn default() -> Self {
        Self {
            trace: false,
            profile: false,
            random_seed: -1,
            name_all_variables: false,
            print_added_constraints: false,
            disable_solve: false,
        }
    }
}
