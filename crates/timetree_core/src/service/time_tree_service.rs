//! Time tree use-case service.
//!
//! # Responsibility
//! - Turn typed requests into tree engine and event binder calls.
//! - Own transaction demarcation: one transaction per call, committed on
//!   success and rolled back on every error path.
//!
//! # Invariants
//! - Write paths take an immediate (reserved) lock so the read-then-write
//!   sibling splice cannot interleave with another writer.
//! - Read paths never create nodes, including the singleton root.

use crate::config::TimeTreeSettings;
use crate::model::graph::{Event, NodeId};
use crate::model::time::TimeError;
use crate::repo::graph_repo::{GraphRepoError, SqliteGraphStore};
use crate::service::event_binder::{EventBinder, EventError};
use crate::service::requests::{AttachEventRequest, EventQuery, InstantRequest, RangeRequest};
use crate::service::time_tree::{TimeTree, TreeError};
use log::{info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Result type used by service operations.
pub type ServiceResult<T> = Result<T, TimeTreeServiceError>;

/// Errors from time tree service operations.
#[derive(Debug)]
pub enum TimeTreeServiceError {
    /// Request time fields cannot form a time value.
    InvalidRequest(TimeError),
    /// Tree engine failure.
    Tree(TreeError),
    /// Event binder failure.
    Event(EventError),
}

impl Display for TimeTreeServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRequest(err) => write!(f, "invalid request: {err}"),
            Self::Tree(err) => write!(f, "{err}"),
            Self::Event(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TimeTreeServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidRequest(err) => Some(err),
            Self::Tree(err) => Some(err),
            Self::Event(err) => Some(err),
        }
    }
}

impl From<TimeError> for TimeTreeServiceError {
    fn from(value: TimeError) -> Self {
        Self::InvalidRequest(value)
    }
}

impl From<TreeError> for TimeTreeServiceError {
    fn from(value: TreeError) -> Self {
        Self::Tree(value)
    }
}

impl From<EventError> for TimeTreeServiceError {
    fn from(value: EventError) -> Self {
        Self::Event(value)
    }
}

impl From<GraphRepoError> for TimeTreeServiceError {
    fn from(value: GraphRepoError) -> Self {
        Self::Tree(TreeError::Repo(value))
    }
}

impl From<rusqlite::Error> for TimeTreeServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::from(GraphRepoError::from(value))
    }
}

/// Time tree service facade over one SQLite connection.
pub struct TimeTreeService<'conn> {
    conn: &'conn Connection,
    settings: TimeTreeSettings,
}

impl<'conn> TimeTreeService<'conn> {
    /// Creates service from a migrated connection.
    pub fn new(conn: &'conn Connection, settings: TimeTreeSettings) -> Self {
        Self { conn, settings }
    }

    pub fn settings(&self) -> &TimeTreeSettings {
        &self.settings
    }

    /// Finds the instant node for a request without creating it.
    pub fn get_instant(&self, request: &InstantRequest) -> ServiceResult<Option<NodeId>> {
        let time = request.spec.time_at(request.epoch_millis, &self.settings)?;
        self.read("get_instant", |store| {
            let tree = TimeTree::new(store, request.spec.root_strategy());
            Ok(tree.get_instant(&time)?)
        })
    }

    /// Finds or creates the instant node for a request.
    pub fn get_or_create_instant(&self, request: &InstantRequest) -> ServiceResult<NodeId> {
        let time = request.spec.time_at(request.epoch_millis, &self.settings)?;
        self.write("get_or_create_instant", |store| {
            let tree = TimeTree::new(store, request.spec.root_strategy());
            Ok(tree.get_or_create_instant(&time)?)
        })
    }

    /// Existing instants of a range, in time order.
    pub fn get_instants(&self, request: &RangeRequest) -> ServiceResult<Vec<NodeId>> {
        let (start, end) = request.bounds(&self.settings)?;
        self.read("get_instants", |store| {
            let tree = TimeTree::new(store, request.spec.root_strategy());
            Ok(tree.get_instants(&start, &end)?)
        })
    }

    /// Every instant of a range, materializing missing units.
    pub fn get_or_create_instants(&self, request: &RangeRequest) -> ServiceResult<Vec<NodeId>> {
        let (start, end) = request.bounds(&self.settings)?;
        self.write("get_or_create_instants", |store| {
            let tree = TimeTree::new(store, request.spec.root_strategy());
            Ok(tree.get_or_create_instants(&start, &end)?)
        })
    }

    /// Attaches one entity at the request's instant.
    ///
    /// Direction defaults to `Incoming` (entity to instant).
    pub fn attach_event(&self, request: &AttachEventRequest) -> ServiceResult<Event> {
        let entity = request.entity.ok_or(EventError::InvalidEntity(None))?;
        let time = request.spec.time_at(request.epoch_millis, &self.settings)?;
        let direction = request.direction.unwrap_or_default();
        self.write("attach_event", |store| {
            let binder = EventBinder::new(store, request.spec.root_strategy());
            Ok(binder.attach_at(&time, entity, &request.relationship_type, direction)?)
        })
    }

    /// Events at one instant or across a range.
    pub fn events(&self, query: &EventQuery) -> ServiceResult<Vec<Event>> {
        let start = query.spec.time_at(query.start_epoch_millis, &self.settings)?;
        let end = query
            .end_epoch_millis
            .map(|millis| query.spec.time_at(millis, &self.settings))
            .transpose()?;
        let direction = query.direction.unwrap_or_default();
        self.read("events", |store| {
            let binder = EventBinder::new(store, query.spec.root_strategy());
            let events = match end {
                Some(end) => {
                    binder.events_in_range(&start, &end, &query.relationship_types, direction)?
                }
                None => binder.events_at(&start, &query.relationship_types, direction)?,
            };
            Ok(events)
        })
    }

    fn read<T>(
        &self,
        op: &'static str,
        run: impl FnOnce(&SqliteGraphStore<'_>) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        self.in_transaction(op, TransactionBehavior::Deferred, run)
    }

    fn write<T>(
        &self,
        op: &'static str,
        run: impl FnOnce(&SqliteGraphStore<'_>) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        self.in_transaction(op, TransactionBehavior::Immediate, run)
    }

    fn in_transaction<T>(
        &self,
        op: &'static str,
        behavior: TransactionBehavior,
        run: impl FnOnce(&SqliteGraphStore<'_>) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        let started_at = Instant::now();
        let tx = Transaction::new_unchecked(self.conn, behavior)?;
        let outcome = SqliteGraphStore::try_new(&tx)
            .map_err(TimeTreeServiceError::from)
            .and_then(|store| run(&store));

        match outcome {
            Ok(value) => {
                tx.commit()?;
                info!(
                    "event=timetree_op module=service status=ok op={op} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(value)
            }
            Err(err) => {
                // Dropping `tx` rolls back any partial splice.
                drop(tx);
                warn!(
                    "event=timetree_op module=service status=error op={op} duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                Err(err)
            }
        }
    }
}
