//! Graph vocabulary shared by the store, tree engine and event binder.
//!
//! # Invariants
//! - Tree nodes carry exactly one `TreeLabel`; every non-root tree node
//!   carries one integer unit value.
//! - Structural edge types (`CHILD`, `NEXT`, `FIRST`, `LAST`) are reserved for
//!   the tree and never reported as events.

use crate::model::resolution::Resolution;
use crate::model::time::TimeError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Stable graph node identifier.
pub type NodeId = Uuid;

/// Store-assigned edge identifier.
pub type EdgeId = i64;

/// Parent to child link between adjacent tree levels.
pub const CHILD: &str = "CHILD";
/// Sibling link from an earlier unit value to the next greater one.
pub const NEXT: &str = "NEXT";
/// Parent to its smallest child.
pub const FIRST: &str = "FIRST";
/// Parent to its greatest child.
pub const LAST: &str = "LAST";

pub const STRUCTURAL_EDGE_TYPES: [&str; 4] = [CHILD, NEXT, FIRST, LAST];

/// Label of a node that belongs to a time tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeLabel {
    Root,
    Level(Resolution),
}

impl TreeLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Root => "RootMarker",
            Self::Level(Resolution::Year) => "Year",
            Self::Level(Resolution::Month) => "Month",
            Self::Level(Resolution::Day) => "Day",
            Self::Level(Resolution::Hour) => "Hour",
            Self::Level(Resolution::Minute) => "Minute",
            Self::Level(Resolution::Second) => "Second",
            Self::Level(Resolution::Millisecond) => "Millisecond",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "RootMarker" => Some(Self::Root),
            "Year" => Some(Self::Level(Resolution::Year)),
            "Month" => Some(Self::Level(Resolution::Month)),
            "Day" => Some(Self::Level(Resolution::Day)),
            "Hour" => Some(Self::Level(Resolution::Hour)),
            "Minute" => Some(Self::Level(Resolution::Minute)),
            "Second" => Some(Self::Level(Resolution::Second)),
            "Millisecond" => Some(Self::Level(Resolution::Millisecond)),
            _ => None,
        }
    }

    pub fn resolution(self) -> Option<Resolution> {
        match self {
            Self::Root => None,
            Self::Level(level) => Some(level),
        }
    }
}

impl Display for TreeLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Edge direction seen from the instant node.
///
/// `Incoming` means the edge points from the entity to the instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Incoming,
    Outgoing,
    Both,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Incoming => "incoming",
            Self::Outgoing => "outgoing",
            Self::Both => "both",
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = TimeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "incoming" => Ok(Self::Incoming),
            "outgoing" => Ok(Self::Outgoing),
            "both" => Ok(Self::Both),
            other => Err(TimeError::UnknownDirection(other.to_string())),
        }
    }
}

/// Node read model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub id: NodeId,
    pub label: String,
    /// Calendar unit for tree level nodes, `None` for roots and entities.
    pub unit_value: Option<i64>,
}

impl GraphNode {
    pub fn tree_label(&self) -> Option<TreeLabel> {
        TreeLabel::parse(self.label.as_str())
    }
}

/// Edge read model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEdge {
    pub id: EdgeId,
    pub edge_type: String,
    pub from: NodeId,
    pub to: NodeId,
}

impl GraphEdge {
    /// Node on the other end of this edge, seen from `node`.
    pub fn other(&self, node: NodeId) -> NodeId {
        if self.from == node {
            self.to
        } else {
            self.from
        }
    }

    /// Direction of this edge relative to `node`.
    pub fn direction_from(&self, node: NodeId) -> Direction {
        if self.to == node {
            Direction::Incoming
        } else {
            Direction::Outgoing
        }
    }

    pub fn is_structural(&self) -> bool {
        STRUCTURAL_EDGE_TYPES.contains(&self.edge_type.as_str())
    }
}

/// An entity attached to an instant node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub entity: NodeId,
    pub relationship_type: String,
    pub direction: Direction,
    pub instant: NodeId,
}
