//! Graph store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the primitive node/edge operations the time tree is built from.
//! - Keep SQL details inside the repository boundary.
//!
//! # Invariants
//! - The store never opens, commits or rolls back transactions; callers run
//!   every operation inside a transaction they own.
//! - Edge listings are returned in creation order (`edge_id ASC`).
//! - Nodes are never deleted through this interface.

use crate::db::{ensure_schema_ready, DbError};
use crate::model::graph::{Direction, EdgeId, GraphEdge, GraphNode, NodeId, CHILD};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const NODE_SELECT_SQL: &str = "SELECT node_uuid, label, unit_value FROM graph_nodes";
const EDGE_SELECT_SQL: &str = "SELECT edge_id, edge_type, from_uuid, to_uuid FROM graph_edges";

/// Result type used by graph store operations.
pub type GraphRepoResult<T> = Result<T, GraphRepoError>;

/// Errors from graph store operations.
#[derive(Debug)]
pub enum GraphRepoError {
    /// SQLite failure, or a connection whose schema is not ready.
    Db(DbError),
    /// Referenced node does not exist.
    NodeNotFound(NodeId),
    /// Referenced edge does not exist.
    EdgeNotFound(EdgeId),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for GraphRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NodeNotFound(id) => write!(f, "graph node not found: {id}"),
            Self::EdgeNotFound(id) => write!(f, "graph edge not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid graph data: {message}"),
        }
    }
}

impl Error for GraphRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for GraphRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for GraphRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Backing store boundary for the time tree and event binder.
pub trait GraphStore {
    /// Creates one node with a label and optional unit value.
    fn create_node(&self, label: &str, unit_value: Option<i64>) -> GraphRepoResult<NodeId>;
    /// Loads one node by id.
    fn get_node(&self, id: NodeId) -> GraphRepoResult<Option<GraphNode>>;
    /// Lists nodes carrying `label`, oldest first.
    fn find_nodes_by_label(&self, label: &str) -> GraphRepoResult<Vec<GraphNode>>;
    /// Finds the `CHILD` of `parent` with the given label and unit value.
    fn find_child(
        &self,
        parent: NodeId,
        label: &str,
        unit_value: i64,
    ) -> GraphRepoResult<Option<GraphNode>>;
    /// Creates one directed edge.
    fn create_edge(&self, from: NodeId, to: NodeId, edge_type: &str) -> GraphRepoResult<EdgeId>;
    /// Deletes one edge by id.
    fn delete_edge(&self, id: EdgeId) -> GraphRepoResult<()>;
    /// Lists edges touching `node` in `direction`, optionally of one type.
    fn edges(
        &self,
        node: NodeId,
        edge_type: Option<&str>,
        direction: Direction,
    ) -> GraphRepoResult<Vec<GraphEdge>>;

    /// First edge of `edge_type` in `direction` from `node`.
    fn single_edge(
        &self,
        node: NodeId,
        edge_type: &str,
        direction: Direction,
    ) -> GraphRepoResult<Option<GraphEdge>> {
        Ok(self
            .edges(node, Some(edge_type), direction)?
            .into_iter()
            .next())
    }
}

/// SQLite-backed graph store.
///
/// Borrow a `Transaction` (it derefs to `Connection`) to make a sequence of
/// calls atomic.
pub struct SqliteGraphStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteGraphStore<'conn> {
    /// Creates store from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> GraphRepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl GraphStore for SqliteGraphStore<'_> {
    fn create_node(&self, label: &str, unit_value: Option<i64>) -> GraphRepoResult<NodeId> {
        let node_uuid = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO graph_nodes (node_uuid, label, unit_value) VALUES (?1, ?2, ?3);",
            params![node_uuid.to_string(), label, unit_value],
        )?;
        Ok(node_uuid)
    }

    fn get_node(&self, id: NodeId) -> GraphRepoResult<Option<GraphNode>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{NODE_SELECT_SQL} WHERE node_uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_node_row(row)?));
        }
        Ok(None)
    }

    fn find_nodes_by_label(&self, label: &str) -> GraphRepoResult<Vec<GraphNode>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{NODE_SELECT_SQL}
             WHERE label = ?1
             ORDER BY created_at ASC, rowid ASC;"
        ))?;
        let mut rows = stmt.query([label])?;
        let mut nodes = Vec::new();
        while let Some(row) = rows.next()? {
            nodes.push(parse_node_row(row)?);
        }
        Ok(nodes)
    }

    fn find_child(
        &self,
        parent: NodeId,
        label: &str,
        unit_value: i64,
    ) -> GraphRepoResult<Option<GraphNode>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT n.node_uuid AS node_uuid, n.label AS label, n.unit_value AS unit_value
             FROM graph_edges e
             INNER JOIN graph_nodes n ON n.node_uuid = e.to_uuid
             WHERE e.from_uuid = ?1
               AND e.edge_type = ?2
               AND n.label = ?3
               AND n.unit_value = ?4
             ORDER BY e.edge_id ASC
             LIMIT 1;",
        )?;
        let mut rows = stmt.query(params![parent.to_string(), CHILD, label, unit_value])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_node_row(row)?));
        }
        Ok(None)
    }

    fn create_edge(&self, from: NodeId, to: NodeId, edge_type: &str) -> GraphRepoResult<EdgeId> {
        for node in [from, to] {
            if !node_exists(self.conn, node)? {
                return Err(GraphRepoError::NodeNotFound(node));
            }
        }
        self.conn.execute(
            "INSERT INTO graph_edges (edge_type, from_uuid, to_uuid) VALUES (?1, ?2, ?3);",
            params![edge_type, from.to_string(), to.to_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn delete_edge(&self, id: EdgeId) -> GraphRepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM graph_edges WHERE edge_id = ?1;", [id])?;
        if changed == 0 {
            return Err(GraphRepoError::EdgeNotFound(id));
        }
        Ok(())
    }

    fn edges(
        &self,
        node: NodeId,
        edge_type: Option<&str>,
        direction: Direction,
    ) -> GraphRepoResult<Vec<GraphEdge>> {
        let endpoint_filter = match direction {
            Direction::Outgoing => "from_uuid = ?1",
            Direction::Incoming => "to_uuid = ?1",
            Direction::Both => "(from_uuid = ?1 OR to_uuid = ?1)",
        };
        let type_filter = if edge_type.is_some() {
            "AND edge_type = ?2"
        } else {
            "AND ?2 IS NULL"
        };
        let mut stmt = self.conn.prepare_cached(&format!(
            "{EDGE_SELECT_SQL}
             WHERE {endpoint_filter}
               {type_filter}
             ORDER BY edge_id ASC;"
        ))?;

        let mut rows = stmt.query(params![node.to_string(), edge_type])?;
        let mut edges = Vec::new();
        while let Some(row) = rows.next()? {
            edges.push(parse_edge_row(row)?);
        }
        Ok(edges)
    }
}

fn node_exists(conn: &Connection, node: NodeId) -> GraphRepoResult<bool> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM graph_nodes WHERE node_uuid = ?1;",
            [node.to_string()],
            |_| Ok(()),
        )
        .optional()?;
    Ok(exists.is_some())
}

fn parse_node_row(row: &Row<'_>) -> GraphRepoResult<GraphNode> {
    let node_uuid_text: String = row.get("node_uuid")?;
    Ok(GraphNode {
        id: parse_uuid(&node_uuid_text, "graph_nodes.node_uuid")?,
        label: row.get("label")?,
        unit_value: row.get("unit_value")?,
    })
}

fn parse_edge_row(row: &Row<'_>) -> GraphRepoResult<GraphEdge> {
    let from_text: String = row.get("from_uuid")?;
    let to_text: String = row.get("to_uuid")?;
    Ok(GraphEdge {
        id: row.get("edge_id")?,
        edge_type: row.get("edge_type")?,
        from: parse_uuid(&from_text, "graph_edges.from_uuid")?,
        to: parse_uuid(&to_text, "graph_edges.to_uuid")?,
    })
}

fn parse_uuid(value: &str, column: &'static str) -> GraphRepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| GraphRepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}
