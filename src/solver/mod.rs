pub mod assignment;
pub mod constraint;
pub mod constraints;
pub mod decision;
pub mod demon;
pub mod engine;
pub mod expr;
pub mod heuristics;
pub mod metaheuristics;
pub mod monitor;
pub mod monitors;
pub mod objective;
pub mod params;
pub mod queue;
pub mod search;
pub mod stats;
pub mod trail;
pub mod var;
pub mod visitor;
