//! Cluster work partitioning.
//!
//! Every node computes its own slice of the global range from the descriptor and its
//! position in the ordered membership list. No messages are exchanged: nodes that see
//! the same membership compute disjoint ranges whose union is the global range.

use super::types::{CampaignDescriptor, WorkRange};
use crate::error::{DatasetError, DatasetResult};
use crate::membership::types::NodeId;

/// Range of `ordinal` when `count` indices starting at `start` are split across
/// `cluster_size` nodes. The last node takes the remainder.
///
/// Callers guarantee `cluster_size >= 1`, `ordinal < cluster_size` and that
/// `start + count` fits in `u32`.
pub fn split_range(start: u32, count: u32, cluster_size: usize, ordinal: usize) -> WorkRange {
    let size = cluster_size.max(1) as u64;
    let ordinal = ordinal as u64;
    let per_node = count as u64 / size;
    let remainder = count as u64 % size;

    let node_start = start as u64 + per_node * ordinal;
    let extra = if ordinal == size - 1 { remainder } else { 0 };
    let node_end = node_start + per_node + extra;

    WorkRange::new(node_start as u32, node_end as u32)
}

/// Work range of the node at `local_ordinal` within `members`.
pub fn partition(
    descriptor: &CampaignDescriptor,
    members: &[NodeId],
    local_ordinal: usize,
) -> DatasetResult<WorkRange> {
    if members.is_empty() {
        return Err(DatasetError::Configuration(
            "Cannot partition a campaign over an empty cluster".to_string(),
        ));
    }
    if local_ordinal >= members.len() {
        return Err(DatasetError::Configuration(format!(
            "Node ordinal {} is outside a cluster of {} members",
            local_ordinal,
            members.len()
        )));
    }
    if descriptor.start.checked_add(descriptor.count).is_none() {
        return Err(DatasetError::Configuration(format!(
            "Range starting at {} with {} entities overflows the index space",
            descriptor.start, descriptor.count
        )));
    }

    Ok(split_range(
        descriptor.start,
        descriptor.count,
        members.len(),
        local_ordinal,
    ))
}
