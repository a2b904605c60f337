//! Time tree engine.
//!
//! # Responsibility
//! - Locate or lazily create the node representing a time value.
//! - Keep per-parent sibling chains ordered without rescanning them.
//! - Answer ordered range queries at any resolution.
//!
//! # Invariants
//! - Every non-root tree node has exactly one incoming `CHILD` edge, from a
//!   node exactly one level coarser.
//! - A parent with children holds one `FIRST` and one `LAST` edge; walking
//!   `FIRST` then `NEXT`* reaches `LAST` with strictly increasing unit values.
//! - A unit value appears at most once among the children of one parent.
//! - The engine holds no state between calls and never opens transactions;
//!   a failed call leaves consistency to the caller's rollback.

use crate::model::graph::{
    Direction, GraphEdge, GraphNode, NodeId, TreeLabel, CHILD, FIRST, LAST, NEXT,
};
use crate::model::resolution::Resolution;
use crate::model::time::{TimeError, TimeValue, TimezoneId};
use crate::repo::graph_repo::{GraphRepoError, GraphStore};
use crate::service::root::RootStrategy;
use log::debug;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type used by tree engine operations.
pub type TreeResult<T> = Result<T, TreeError>;

/// Errors from tree engine operations.
#[derive(Debug)]
pub enum TreeError {
    /// Range endpoints are incompatible or out of order.
    InvalidRange(String),
    /// Read-only lookup found no instant for the requested time.
    NotFound(TimeValue),
    /// Explicit root node does not exist.
    RootNotFound(NodeId),
    /// Node is not a level node of a time tree.
    NotAnInstant(NodeId),
    /// Persisted sibling structure violates the chain invariants.
    CorruptChain { node: NodeId, reason: &'static str },
    /// Time arithmetic failure.
    Time(TimeError),
    /// Graph store failure.
    Repo(GraphRepoError),
}

impl Display for TreeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRange(message) => write!(f, "invalid range: {message}"),
            Self::NotFound(time) => write!(f, "no instant node for {time}"),
            Self::RootNotFound(id) => write!(f, "time tree root not found: {id}"),
            Self::NotAnInstant(id) => write!(f, "node is not a time tree instant: {id}"),
            Self::CorruptChain { node, reason } => {
                write!(f, "corrupt sibling chain at {node}: {reason}")
            }
            Self::Time(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TreeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Time(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TimeError> for TreeError {
    fn from(value: TimeError) -> Self {
        Self::Time(value)
    }
}

impl From<GraphRepoError> for TreeError {
    fn from(value: GraphRepoError) -> Self {
        Self::Repo(value)
    }
}

/// Tree engine bound to one graph store and one root strategy.
pub struct TimeTree<'s, S: GraphStore + ?Sized> {
    store: &'s S,
    root: RootStrategy,
}

impl<'s, S: GraphStore + ?Sized> TimeTree<'s, S> {
    pub fn new(store: &'s S, root: RootStrategy) -> Self {
        Self { store, root }
    }

    /// Tree anchored at the process-wide root.
    pub fn singleton(store: &'s S) -> Self {
        Self::new(store, RootStrategy::Singleton)
    }

    /// Tree anchored at a caller-supplied node.
    pub fn with_root(store: &'s S, root: NodeId) -> Self {
        Self::new(store, RootStrategy::Explicit(root))
    }

    pub fn root_strategy(&self) -> RootStrategy {
        self.root
    }

    pub(crate) fn store(&self) -> &'s S {
        self.store
    }

    /// Finds the instant node for `time` without mutating the tree.
    pub fn get_instant(&self, time: &TimeValue) -> TreeResult<Option<NodeId>> {
        let Some(mut current) = self.root.find(self.store)? else {
            return Ok(None);
        };
        let levels = time.resolution().path_levels();
        for (&level, unit_value) in levels.iter().zip(time.unit_path()) {
            let label = TreeLabel::Level(level);
            match self.store.find_child(current, label.as_str(), unit_value)? {
                Some(child) => current = child.id,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Like `get_instant`, but an absent instant is a `NotFound` error.
    pub fn require_instant(&self, time: &TimeValue) -> TreeResult<NodeId> {
        self.get_instant(time)?.ok_or(TreeError::NotFound(*time))
    }

    /// Finds or creates the instant node for `time`, creating missing levels.
    ///
    /// Idempotent: equal time values always yield the same node.
    pub fn get_or_create_instant(&self, time: &TimeValue) -> TreeResult<NodeId> {
        let mut current = self.root.get_or_create(self.store)?;
        let levels = time.resolution().path_levels();
        for (&level, unit_value) in levels.iter().zip(time.unit_path()) {
            let label = TreeLabel::Level(level);
            current = match self.store.find_child(current, label.as_str(), unit_value)? {
                Some(child) => child.id,
                None => self.insert_child(current, level, unit_value)?,
            };
        }
        Ok(current)
    }

    /// Instant node for the current wall-clock time.
    pub fn now(&self, timezone: TimezoneId, resolution: Resolution) -> TreeResult<NodeId> {
        self.get_or_create_instant(&TimeValue::now(timezone, resolution))
    }

    /// Existing instant nodes from `start` to `end` inclusive, in time order.
    ///
    /// Returns an empty list when either endpoint has no instant node.
    pub fn get_instants(&self, start: &TimeValue, end: &TimeValue) -> TreeResult<Vec<NodeId>> {
        validate_range(start, end)?;
        match (self.get_instant(start)?, self.get_instant(end)?) {
            (Some(first), Some(last)) => self.walk(first, last),
            _ => Ok(Vec::new()),
        }
    }

    /// Every instant from `start` to `end` inclusive, materializing each unit
    /// in between.
    pub fn get_or_create_instants(
        &self,
        start: &TimeValue,
        end: &TimeValue,
    ) -> TreeResult<Vec<NodeId>> {
        validate_range(start, end)?;
        let first = self.get_or_create_instant(start)?;
        let mut cursor = *start;
        while cursor.cmp_units(end) == Ordering::Less {
            cursor = cursor.successor()?;
            self.get_or_create_instant(&cursor)?;
        }
        let last = self.get_or_create_instant(end)?;
        self.walk(first, last)
    }

    /// Children of `parent` in chain order.
    pub fn children(&self, parent: NodeId) -> TreeResult<Vec<GraphNode>> {
        let Some(first) = self.store.single_edge(parent, FIRST, Direction::Outgoing)? else {
            return Ok(Vec::new());
        };
        let last = self
            .store
            .single_edge(parent, LAST, Direction::Outgoing)?
            .ok_or(TreeError::CorruptChain {
                node: parent,
                reason: "FIRST without LAST",
            })?;

        let mut children = vec![self.load_node(first.to)?];
        let mut visited = HashSet::from([first.to]);
        let mut current = first.to;
        while current != last.to {
            let next = self
                .store
                .single_edge(current, NEXT, Direction::Outgoing)?
                .ok_or(TreeError::CorruptChain {
                    node: current,
                    reason: "chain ends before LAST",
                })?;
            current = next.to;
            if !visited.insert(current) {
                return Err(TreeError::CorruptChain {
                    node: current,
                    reason: "NEXT cycle before LAST",
                });
            }
            children.push(self.load_node(current)?);
        }
        Ok(children)
    }

    /// Parent of a tree node, or `None` for a root.
    pub fn parent(&self, node: NodeId) -> TreeResult<Option<NodeId>> {
        Ok(self
            .store
            .single_edge(node, CHILD, Direction::Incoming)?
            .map(|edge| edge.from))
    }

    /// Rebuilds the time value an instant node stands for.
    ///
    /// The result is the start of the node's unit in `timezone`.
    pub fn instant_time(&self, node: NodeId, timezone: TimezoneId) -> TreeResult<TimeValue> {
        let mut unit_path = Vec::with_capacity(Resolution::LADDER.len());
        let mut current = self.load_node(node)?;
        while let Some(TreeLabel::Level(level)) = current.tree_label() {
            let unit_value = current
                .unit_value
                .ok_or(TreeError::NotAnInstant(current.id))?;
            unit_path.push((level, unit_value));
            let parent = self.parent(current.id)?.ok_or(TreeError::NotAnInstant(node))?;
            current = self.load_node(parent)?;
        }
        unit_path.reverse();

        let levels_match = unit_path
            .iter()
            .zip(Resolution::LADDER)
            .all(|((level, _), expected)| *level == expected);
        if unit_path.is_empty() || !levels_match {
            return Err(TreeError::NotAnInstant(node));
        }
        let values: Vec<i64> = unit_path.into_iter().map(|(_, value)| value).collect();
        Ok(TimeValue::from_unit_path(&values, timezone)?)
    }

    /// Inserts unit value `value` under `parent`, keeping the chain ordered.
    ///
    /// Appends and prepends touch only the chain ends. Inner inserts walk
    /// from whichever end is numerically closer to `value`.
    fn insert_child(
        &self,
        parent: NodeId,
        level: Resolution,
        value: i64,
    ) -> TreeResult<NodeId> {
        let first = self.store.single_edge(parent, FIRST, Direction::Outgoing)?;
        let last = self.store.single_edge(parent, LAST, Direction::Outgoing)?;
        let (first, last) = match (first, last) {
            (Some(first), Some(last)) => (first, last),
            (None, None) => {
                let child = self.create_child(parent, level, value, "only")?;
                self.store.create_edge(parent, child, FIRST)?;
                self.store.create_edge(parent, child, LAST)?;
                return Ok(child);
            }
            _ => {
                return Err(TreeError::CorruptChain {
                    node: parent,
                    reason: "FIRST and LAST must both be present or both absent",
                })
            }
        };

        let last_value = self.unit_value(last.to)?;
        if value > last_value {
            let child = self.create_child(parent, level, value, "append")?;
            self.store.create_edge(last.to, child, NEXT)?;
            self.repoint(parent, &last, child, LAST)?;
            return Ok(child);
        }

        let first_value = self.unit_value(first.to)?;
        if value < first_value {
            let child = self.create_child(parent, level, value, "prepend")?;
            self.store.create_edge(child, first.to, NEXT)?;
            self.repoint(parent, &first, child, FIRST)?;
            return Ok(child);
        }

        if value - first_value <= last_value - value {
            self.insert_walking_forward(parent, level, value, first.to, first_value)
        } else {
            self.insert_walking_backward(parent, level, value, last.to, last_value)
        }
    }

    fn insert_walking_forward(
        &self,
        parent: NodeId,
        level: Resolution,
        value: i64,
        mut current: NodeId,
        mut current_value: i64,
    ) -> TreeResult<NodeId> {
        loop {
            if current_value == value {
                return Ok(current);
            }
            let next = self
                .store
                .single_edge(current, NEXT, Direction::Outgoing)?
                .ok_or(TreeError::CorruptChain {
                    node: current,
                    reason: "chain ends before LAST",
                })?;
            let next_value = self.unit_value(next.to)?;
            if next_value <= current_value {
                return Err(TreeError::CorruptChain {
                    node: next.to,
                    reason: "unit values not increasing",
                });
            }
            if next_value > value {
                return self.splice(parent, level, value, &next);
            }
            current = next.to;
            current_value = next_value;
        }
    }

    fn insert_walking_backward(
        &self,
        parent: NodeId,
        level: Resolution,
        value: i64,
        mut current: NodeId,
        mut current_value: i64,
    ) -> TreeResult<NodeId> {
        loop {
            if current_value == value {
                return Ok(current);
            }
            let previous = self
                .store
                .single_edge(current, NEXT, Direction::Incoming)?
                .ok_or(TreeError::CorruptChain {
                    node: current,
                    reason: "chain starts after FIRST",
                })?;
            let previous_value = self.unit_value(previous.from)?;
            if previous_value >= current_value {
                return Err(TreeError::CorruptChain {
                    node: previous.from,
                    reason: "unit values not increasing",
                });
            }
            if previous_value < value {
                return self.splice(parent, level, value, &previous);
            }
            current = previous.from;
            current_value = previous_value;
        }
    }

    /// Replaces the `NEXT` edge `bypassed` with `from -> child -> to`.
    fn splice(
        &self,
        parent: NodeId,
        level: Resolution,
        value: i64,
        bypassed: &GraphEdge,
    ) -> TreeResult<NodeId> {
        let child = self.create_child(parent, level, value, "splice")?;
        self.store.delete_edge(bypassed.id)?;
        self.store.create_edge(bypassed.from, child, NEXT)?;
        self.store.create_edge(child, bypassed.to, NEXT)?;
        Ok(child)
    }

    fn repoint(
        &self,
        parent: NodeId,
        old: &GraphEdge,
        target: NodeId,
        edge_type: &str,
    ) -> TreeResult<()> {
        self.store.delete_edge(old.id)?;
        self.store.create_edge(parent, target, edge_type)?;
        Ok(())
    }

    fn create_child(
        &self,
        parent: NodeId,
        level: Resolution,
        value: i64,
        mode: &'static str,
    ) -> TreeResult<NodeId> {
        let label = TreeLabel::Level(level);
        let child = self.store.create_node(label.as_str(), Some(value))?;
        self.store.create_edge(parent, child, CHILD)?;
        debug!(
            "event=instant_create module=tree status=ok label={label} unit_value={value} mode={mode} node={child}"
        );
        Ok(child)
    }

    /// Nodes from `first` to `last` inclusive at one level.
    fn walk(&self, first: NodeId, last: NodeId) -> TreeResult<Vec<NodeId>> {
        let root = self.root.find(self.store)?;
        let mut nodes = vec![first];
        let mut visited = HashSet::from([first]);
        let mut current = first;
        while current != last {
            current = self
                .following(current, root)?
                .ok_or(TreeError::CorruptChain {
                    node: current,
                    reason: "range end unreachable",
                })?;
            if !visited.insert(current) {
                return Err(TreeError::CorruptChain {
                    node: current,
                    reason: "NEXT cycle before range end",
                });
            }
            nodes.push(current);
        }
        Ok(nodes)
    }

    /// Next node at the same level, continuing into the next parent's
    /// children once a sibling chain is exhausted.
    fn following(&self, node: NodeId, root: Option<NodeId>) -> TreeResult<Option<NodeId>> {
        if Some(node) == root {
            return Ok(None);
        }
        if let Some(next) = self.store.single_edge(node, NEXT, Direction::Outgoing)? {
            return Ok(Some(next.to));
        }
        let Some(parent) = self.parent(node)? else {
            return Ok(None);
        };

        let mut uncle = self.following(parent, root)?;
        let mut skipped = HashSet::new();
        while let Some(candidate) = uncle {
            if let Some(first) = self.store.single_edge(candidate, FIRST, Direction::Outgoing)? {
                return Ok(Some(first.to));
            }
            if !skipped.insert(candidate) {
                return Err(TreeError::CorruptChain {
                    node: candidate,
                    reason: "NEXT cycle among childless parents",
                });
            }
            uncle = self.following(candidate, root)?;
        }
        Ok(None)
    }

    fn load_node(&self, node: NodeId) -> TreeResult<GraphNode> {
        self.store
            .get_node(node)?
            .ok_or(TreeError::Repo(GraphRepoError::NodeNotFound(node)))
    }

    fn unit_value(&self, node: NodeId) -> TreeResult<i64> {
        self.load_node(node)?
            .unit_value
            .ok_or(TreeError::CorruptChain {
                node,
                reason: "sibling without unit value",
            })
    }
}

fn validate_range(start: &TimeValue, end: &TimeValue) -> TreeResult<()> {
    if !start.compatible(end) {
        return Err(TreeError::InvalidRange(format!(
            "endpoints differ in timezone or resolution: {start} vs {end}"
        )));
    }
    if start.cmp_units(end) == Ordering::Greater {
        return Err(TreeError::InvalidRange(format!(
            "start {start} is after end {end}"
        )));
    }
    Ok(())
}
