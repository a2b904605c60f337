//! Event binder.
//!
//! # Responsibility
//! - Attach arbitrary entity nodes to instant nodes through typed edges.
//! - List the events attached at one instant or across a range.
//!
//! # Invariants
//! - Attach never deduplicates; two calls create two parallel edges.
//! - Structural tree edges are never reported as events.
//! - Edges created here are never deleted here.
//! - `attach_at` checks every input before the instant path is created.

use crate::model::graph::{Direction, Event, NodeId, STRUCTURAL_EDGE_TYPES};
use crate::model::time::TimeValue;
use crate::repo::graph_repo::{GraphRepoError, GraphStore};
use crate::service::root::RootStrategy;
use crate::service::time_tree::{TimeTree, TreeError};
use log::debug;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type used by event binder operations.
pub type EventResult<T> = Result<T, EventError>;

/// Errors from event binder operations.
#[derive(Debug)]
pub enum EventError {
    /// Entity reference is missing, or names no existing node.
    InvalidEntity(Option<NodeId>),
    /// Target node is not an instant of a time tree.
    InvalidInstant(NodeId),
    /// Relationship type is empty or reserved by the tree.
    InvalidRelationshipType(String),
    /// Attach needs a concrete direction.
    InvalidDirection(Direction),
    /// Tree resolution failure.
    Tree(TreeError),
}

impl Display for EventError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidEntity(None) => write!(f, "entity reference is required"),
            Self::InvalidEntity(Some(id)) => write!(f, "entity node not found: {id}"),
            Self::InvalidInstant(id) => write!(f, "node is not a time tree instant: {id}"),
            Self::InvalidRelationshipType(name) => {
                write!(f, "invalid relationship type `{name}`")
            }
            Self::InvalidDirection(direction) => write!(
                f,
                "attach direction must be incoming or outgoing, got {direction}"
            ),
            Self::Tree(err) => write!(f, "{err}"),
        }
    }
}

impl Error for EventError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Tree(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TreeError> for EventError {
    fn from(value: TreeError) -> Self {
        Self::Tree(value)
    }
}

impl From<GraphRepoError> for EventError {
    fn from(value: GraphRepoError) -> Self {
        Self::Tree(TreeError::Repo(value))
    }
}

/// Binds entities to the instants of one tree.
pub struct EventBinder<'s, S: GraphStore + ?Sized> {
    tree: TimeTree<'s, S>,
}

impl<'s, S: GraphStore + ?Sized> EventBinder<'s, S> {
    pub fn new(store: &'s S, root: RootStrategy) -> Self {
        Self {
            tree: TimeTree::new(store, root),
        }
    }

    /// Tree used to resolve time values.
    pub fn tree(&self) -> &TimeTree<'s, S> {
        &self.tree
    }

    /// Creates one edge between `instant` and `entity`.
    ///
    /// `direction` is seen from the instant: `Incoming` points entity to
    /// instant. Returns whether an edge was created.
    pub fn attach(
        &self,
        instant: NodeId,
        entity: NodeId,
        relationship_type: &str,
        direction: Direction,
    ) -> EventResult<bool> {
        validate_relationship_type(relationship_type)?;
        let (from, to) = match direction {
            Direction::Incoming => (entity, instant),
            Direction::Outgoing => (instant, entity),
            Direction::Both => return Err(EventError::InvalidDirection(direction)),
        };

        let store = self.tree.store();
        let is_instant = store
            .get_node(instant)?
            .and_then(|node| node.tree_label())
            .and_then(|label| label.resolution())
            .is_some();
        if !is_instant {
            return Err(EventError::InvalidInstant(instant));
        }
        if store.get_node(entity)?.is_none() {
            return Err(EventError::InvalidEntity(Some(entity)));
        }

        store.create_edge(from, to, relationship_type)?;
        debug!(
            "event=event_attach module=events status=ok type={relationship_type} direction={direction} instant={instant} entity={entity}"
        );
        Ok(true)
    }

    /// Attaches `entity` at `time`, creating the instant when missing.
    pub fn attach_at(
        &self,
        time: &TimeValue,
        entity: NodeId,
        relationship_type: &str,
        direction: Direction,
    ) -> EventResult<Event> {
        validate_relationship_type(relationship_type)?;
        if direction == Direction::Both {
            return Err(EventError::InvalidDirection(direction));
        }
        if self.tree.store().get_node(entity)?.is_none() {
            return Err(EventError::InvalidEntity(Some(entity)));
        }
        let instant = self.tree.get_or_create_instant(time)?;
        self.attach(instant, entity, relationship_type, direction)?;
        Ok(Event {
            entity,
            relationship_type: relationship_type.to_string(),
            direction,
            instant,
        })
    }

    /// Events at the instant for `time`; empty when the instant is absent.
    ///
    /// An empty `types` set admits every relationship type.
    pub fn events_at(
        &self,
        time: &TimeValue,
        types: &BTreeSet<String>,
        direction: Direction,
    ) -> EventResult<Vec<Event>> {
        match self.tree.get_instant(time)? {
            Some(instant) => self.events_of_instant(instant, types, direction),
            None => Ok(Vec::new()),
        }
    }

    /// Events at every existing instant from `start` to `end`, in time order.
    pub fn events_in_range(
        &self,
        start: &TimeValue,
        end: &TimeValue,
        types: &BTreeSet<String>,
        direction: Direction,
    ) -> EventResult<Vec<Event>> {
        let mut events = Vec::new();
        for instant in self.tree.get_instants(start, end)? {
            events.extend(self.events_of_instant(instant, types, direction)?);
        }
        Ok(events)
    }

    /// Events attached to one instant node, in attach order.
    pub fn events_of_instant(
        &self,
        instant: NodeId,
        types: &BTreeSet<String>,
        direction: Direction,
    ) -> EventResult<Vec<Event>> {
        let events = self
            .tree
            .store()
            .edges(instant, None, direction)?
            .into_iter()
            .filter(|edge| !edge.is_structural() && edge.from != edge.to)
            .filter(|edge| types.is_empty() || types.contains(&edge.edge_type))
            .map(|edge| Event {
                entity: edge.other(instant),
                direction: edge.direction_from(instant),
                relationship_type: edge.edge_type,
                instant,
            })
            .collect();
        Ok(events)
    }
}

fn validate_relationship_type(relationship_type: &str) -> EventResult<()> {
    if relationship_type.is_empty() || STRUCTURAL_EDGE_TYPES.contains(&relationship_type) {
        return Err(EventError::InvalidRelationshipType(
            relationship_type.to_string(),
        ));
    }
    Ok(())
}
