//! Domain model for time values and the graph they are indexed in.
//!
//! # Responsibility
//! - Define the time value, resolution ladder and graph vocabulary.
//! - Stay free of I/O; persistence lives in `repo`.
//!
//! # Invariants
//! - Resolution levels form a closed, totally ordered set.
//! - Time values are immutable.

pub mod graph;
pub mod resolution;
pub mod time;
