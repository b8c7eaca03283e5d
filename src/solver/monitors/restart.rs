//! Restart schedules: monitors that restart the search after a number of
//! failures.

use crate::solver::engine::Solver;
use crate::solver::monitor::SearchMonitor;

/// The Luby sequence: 1, 1, 2, 1, 1, 2, 4, 1, 1, 2, 1, 1, 2, 4, 8, ...
pub fn luby(i: u64) -> u64 {
    assert!(i > 0, "the Luby sequence starts at 1");
    // Least power of two >= i + 1.
    let mut power: u64 = 2;
    while power < i + 1 {
        power <<= 1;
    }
    if power == i + 1 {
        power / 2
    } else {
        luby(i - power / 2 + 1)
    }
}

/// Restarts the search after `scale * luby(n)` failures, n increasing at
/// every restart.
pub struct LubyRestart {
    scale: u64,
    iteration: u64,
    current_failures: u64,
    next_step: u64,
}

impl LubyRestart {
    pub fn new(scale: u64) -> Self {
        assert!(scale >= 1, "restart scale must be at least 1");
        Self {
            scale,
            iteration: 1,
            current_failures: 0,
            next_step: scale,
        }
    }
}

impl SearchMonitor for LubyRestart {
    fn begin_fail(&mut self, solver: &mut Solver) {
        self.current_failures += 1;
        if self.current_failures >= self.next_step {
            self.current_failures = 0;
            self.iteration += 1;
            self.next_step = luby(self.iteration) * self.scale;
            solver.restart_current_search();
        }
    }
}

/// Restarts the search every `frequency` failures.
pub struct ConstantRestart {
    frequency: u64,
    current_failures: u64,
}

impl ConstantRestart {
    pub fn new(frequency: u64) -> Self {
        assert!(frequency >= 1, "restart frequency must be at least 1");
        Self {
            frequency,
            current_failures: 0,
        }
    }
}

impl SearchMonitor for ConstantRestart {
    fn begin_fail(&mut self, solver: &mut Solver) {
        self.current_failures += 1;
        if self.current_failures >= self.frequency {
            self.current_failures = 0;
            solver.restart_current_search();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luby_prefix_matches_the_sequence() {
        let expected = [1, 1, 2, 1, 1, 2, 4, 1, 1, 2, 1, 1, 2, 4, 8];
        let produced: Vec<u64> = (1..=expected.len() as u64).map(luby).collect();
        assert_eq!(produced, expected);
    }
}
