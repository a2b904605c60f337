//! Repository layer: the graph store boundary.
//!
//! # Responsibility
//! - Define the node/edge primitives the time tree consumes.
//! - Isolate SQLite query details from tree and event orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NodeNotFound`, `EdgeNotFound`)
//!   in addition to DB transport errors.
//! - Repository calls never manage transactions.

pub mod graph_repo;
