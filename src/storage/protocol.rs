//! Lease Store Network Protocol
//!
//! Endpoints and DTOs for forwarding lease operations to a partition's primary and
//! for pushing the resulting key state to its backup. Serialized as JSON over HTTP.

use super::types::{LeaseEntry, LeaseOp, LeaseOpOutcome};
use serde::{Deserialize, Serialize};

// --- API Endpoints ---

/// A non-owner forwards an operation to the partition primary.
pub const ENDPOINT_LEASE_OP: &str = "/internal/lease/op";
/// The primary pushes the post-operation state of a key to its backup.
pub const ENDPOINT_LEASE_REPLICATE: &str = "/internal/lease/replicate";

// --- Data Transfer Objects ---

/// Forwarded operation.
///
/// `op_id` stays the same across retries so the primary can answer a repeated
/// request from its outcome cache instead of applying the operation twice.
#[derive(Debug, Serialize, Deserialize)]
pub struct LeaseOpRequest {
    pub partition: u32,
    pub op_id: String,
    pub op: LeaseOp,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaseOpResponse {
    pub success: bool,
    pub outcome: Option<LeaseOpOutcome>,
    pub error: Option<String>,
}

/// State-based replication: the backup overwrites its copy of `key` with `entry`
/// (`None` deletes it).
#[derive(Debug, Serialize, Deserialize)]
pub struct LeaseReplicateRequest {
    pub partition: u32,
    pub op_id: String,
    pub key: String,
    pub entry: Option<LeaseEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaseReplicateResponse {
    pub success: bool,
}
