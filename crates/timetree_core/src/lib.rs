//! Time-tree index over a SQLite-backed property graph.
//!
//! Locates or lazily creates the node for a calendar instant at one of seven
//! resolutions, keeps sibling chains ordered at every level, answers ordered
//! range queries, and attaches external entities to instants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::TimeTreeSettings;
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::graph::{Direction, EdgeId, Event, GraphEdge, GraphNode, NodeId, TreeLabel};
pub use model::resolution::Resolution;
pub use model::time::{TimeError, TimeResult, TimeValue, TimezoneId};
pub use repo::graph_repo::{GraphRepoError, GraphRepoResult, GraphStore, SqliteGraphStore};
pub use service::event_binder::{EventBinder, EventError, EventResult};
pub use service::requests::{AttachEventRequest, EventQuery, InstantRequest, RangeRequest, TimeSpec};
pub use service::root::RootStrategy;
pub use service::time_tree::{TimeTree, TreeError, TreeResult};
pub use service::time_tree_service::{ServiceResult, TimeTreeService, TimeTreeServiceError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
