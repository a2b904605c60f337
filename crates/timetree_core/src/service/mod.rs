//! Core use-case services.
//!
//! # Responsibility
//! - `time_tree` and `event_binder` hold the tree and event algorithms,
//!   parameterized by a graph store and a root strategy.
//! - `time_tree_service` wraps them with typed requests and transactions.

pub mod event_binder;
pub mod requests;
pub mod root;
pub mod time_tree;
pub mod time_tree_service;
