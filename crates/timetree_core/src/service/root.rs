//! Root strategy for time trees.
//!
//! # Responsibility
//! - Decide which node anchors a tree instance.
//! - Let independent trees share one graph store.
//!
//! # Invariants
//! - The singleton root is the one node labelled `RootMarker`.
//! - An explicit root must already exist; it is never created here.

use crate::model::graph::{NodeId, TreeLabel};
use crate::repo::graph_repo::GraphStore;
use crate::service::time_tree::{TreeError, TreeResult};
use log::debug;

/// Which node a tree instance treats as its root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RootStrategy {
    /// Process-wide root, created lazily on first write.
    #[default]
    Singleton,
    /// Caller-supplied node, e.g. one tree per user.
    Explicit(NodeId),
}

impl RootStrategy {
    /// `Explicit` when a root is given, `Singleton` otherwise.
    pub fn from_optional(root: Option<NodeId>) -> Self {
        root.map_or(Self::Singleton, Self::Explicit)
    }

    /// Resolves the root without creating anything.
    ///
    /// Returns `None` when the singleton root has not been created yet.
    pub fn find<S: GraphStore + ?Sized>(&self, store: &S) -> TreeResult<Option<NodeId>> {
        match *self {
            Self::Singleton => Ok(store
                .find_nodes_by_label(TreeLabel::Root.as_str())?
                .first()
                .map(|node| node.id)),
            Self::Explicit(root) => {
                store
                    .get_node(root)?
                    .ok_or(TreeError::RootNotFound(root))?;
                Ok(Some(root))
            }
        }
    }

    /// Resolves the root, creating the singleton root on first use.
    pub fn get_or_create<S: GraphStore + ?Sized>(&self, store: &S) -> TreeResult<NodeId> {
        if let Some(root) = self.find(store)? {
            return Ok(root);
        }
        let root = store.create_node(TreeLabel::Root.as_str(), None)?;
        debug!("event=root_create module=tree status=ok node={root}");
        Ok(root)
    }
}
