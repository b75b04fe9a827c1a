use crate::membership::types::Node;
use crate::membership::view::ClusterView;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub const DEFAULT_PARTITIONS: u32 = 256;

/// Maps lease keys to partitions and partitions to owning nodes.
///
/// Owners are derived from the ordered membership view, so every node with the same
/// view routes a key to the same primary.
pub struct LeasePlacement {
    num_partitions: u32,
    view: Arc<dyn ClusterView>,
}

impl LeasePlacement {
    pub fn new(view: Arc<dyn ClusterView>) -> Self {
        Self::with_partitions(view, DEFAULT_PARTITIONS)
    }

    pub fn with_partitions(view: Arc<dyn ClusterView>, num_partitions: u32) -> Self {
        Self {
            num_partitions: num_partitions.max(1),
            view,
        }
    }

    pub fn num_partitions(&self) -> u32 {
        self.num_partitions
    }

    pub fn partition_of(&self, key: &str) -> u32 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.num_partitions as u64) as u32
    }

    /// Primary first, then at most one backup. A single-node cluster has no backup.
    pub fn owners(&self, partition: u32) -> Vec<Node> {
        owners_among(partition, &self.view.ordered_members())
    }

    pub fn is_local(&self, node: &Node) -> bool {
        node.id == self.view.local_id()
    }
}

pub fn owners_among(partition: u32, ordered: &[Node]) -> Vec<Node> {
    if ordered.is_empty() {
        return vec![];
    }

    let primary_idx = partition as usize % ordered.len();
    let backup_idx = (partition as usize + 1) % ordered.len();

    let mut owners = vec![ordered[primary_idx].clone()];
    if backup_idx != primary_idx {
        owners.push(ordered[backup_idx].clone());
    }
    owners
}
