//! Built-in search monitors: logging, tracing, solution collection,
//! limits, restart schedules, and symmetry breaking.

pub mod collector;
pub mod limit;
pub mod log;
pub mod restart;
pub mod symmetry;
pub mod trace;
