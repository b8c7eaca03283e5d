//! Propagation profiling: per-demon run statistics, rendered as a table.

use prettytable::{Cell, Row, Table};

use crate::solver::engine::Solver;

/// Accumulated runtime statistics for a single demon. Only collected when
/// the `profile` parameter is on.
#[derive(Debug, Default, Clone, Copy)]
pub struct DemonRunStats {
    /// The number of times the demon ran.
    pub runs: u64,
    /// The number of runs that ended in a failure.
    pub failures: u64,
    /// Total time spent inside the demon body, in microseconds.
    pub time_spent_micros: u64,
}

impl Solver {
    /// Renders the propagation profile collected so far. Meaningful only
    /// when the solver was built with `profile: true`.
    pub fn profile_table(&self) -> String {
        render_profile_table(self)
    }
}

pub fn render_profile_table(solver: &Solver) -> String {
    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("Demon"),
        Cell::new("Priority"),
        Cell::new("Runs"),
        Cell::new("Failures"),
        Cell::new("Time / Run (µs)"),
        Cell::new("Total Time (ms)"),
    ]));

    let mut rows: Vec<(usize, &DemonRunStats)> = solver
        .demon_stats
        .iter()
        .enumerate()
        .filter(|(_, s)| s.runs > 0)
        .collect();
    rows.sort_by_key(|(_, s)| std::cmp::Reverse(s.time_spent_micros));

    for (demon, stats) in rows {
        let data = &solver.demons[demon];
        let avg = stats.time_spent_micros as f64 / stats.runs as f64;
        table.add_row(Row::new(vec![
            Cell::new(&data.name),
            Cell::new(&format!("{:?}", data.priority)),
            Cell::new(&stats.runs.to_string()),
            Cell::new(&stats.failures.to_string()),
            Cell::new(&format!("{avg:.2}")),
            Cell::new(&format!("{:.2}", stats.time_spent_micros as f64 / 1000.0)),
        ]));
    }

    table.to_string()
}
