use crate::campaign::types::WorkRange;
use crate::membership::types::NodeId;
use serde::{Deserialize, Serialize};

/// What one node did with its share of a campaign.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeReport {
    pub node: NodeId,
    /// Position in the node's own ordered view. `None` if the node was not part of it.
    pub ordinal: Option<usize>,
    pub cluster_size: usize,
    pub range: WorkRange,
    /// Entities created, or deleted by a removal campaign.
    pub created: u64,
    pub batches: usize,
    pub failed_batches: usize,
    pub duration_ms: u64,
    pub message: String,
    pub error: Option<String>,
}

impl NodeReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Reply collected by the initiator from one member. `outcome` is an error when the
/// member could not be reached or answered garbage.
#[derive(Debug)]
pub struct NodeReply {
    pub node: NodeId,
    pub outcome: anyhow::Result<NodeReport>,
}

/// Cluster-wide result of a successful campaign.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CampaignSummary {
    pub nodes: usize,
    /// Sum of the per-node counters. Informational only.
    pub created: u64,
    pub reports: Vec<NodeReport>,
}
