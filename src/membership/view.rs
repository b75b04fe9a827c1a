//! Ordered membership view.
//!
//! Campaign partitioning needs exactly two facts from the membership layer: who is
//! in the cluster, in an order every node agrees on, and where the local node sits
//! in that order. [`ClusterView`] exposes just that so the partitioner and the node
//! runner do not depend on the gossip implementation.

use super::types::{Node, NodeId};

pub trait ClusterView: Send + Sync {
    /// Identity of the node this process runs as.
    fn local_id(&self) -> NodeId;

    /// Alive members sorted by [`NodeId`].
    fn ordered_members(&self) -> Vec<Node>;

    /// Position of the local node in [`ClusterView::ordered_members`].
    fn local_ordinal(&self) -> Option<usize> {
        let local = self.local_id();
        self.ordered_members().iter().position(|node| node.id == local)
    }

    fn cluster_size(&self) -> usize {
        self.ordered_members().len()
    }
}

/// Fixed membership list.
///
/// Used for single-process deployments and for simulating several nodes that share
/// one member list in tests.
#[derive(Debug, Clone)]
pub struct StaticView {
    local: NodeId,
    members: Vec<Node>,
}

impl StaticView {
    pub fn new(local: NodeId, mut members: Vec<Node>) -> Self {
        members.sort_by(|a, b| a.id.cmp(&b.id));
        members.dedup_by(|a, b| a.id == b.id);
        Self { local, members }
    }
}

impl ClusterView for StaticView {
    fn local_id(&self) -> NodeId {
        self.local.clone()
    }

    fn ordered_members(&self) -> Vec<Node> {
        self.members
            .iter()
            .filter(|node| node.is_alive())
            .cloned()
            .collect()
    }
}
