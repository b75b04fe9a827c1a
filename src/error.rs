//! Error taxonomy for campaign orchestration.
//!
//! Collaborators (entity factories, backends, inter-node HTTP) report failures as
//! `anyhow::Error`; they are folded into [`DatasetError`] at the campaign boundary so
//! the trigger path can tell a bad request from a busy cluster from a failed run.

use crate::campaign::types::CampaignRecord;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetError {
    /// Missing or invalid campaign parameters. Raised before any lock is taken.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Another campaign holds the lock.
    #[error("Task not triggered. There is already existing task in progress: {existing}")]
    Conflict { existing: CampaignRecord },

    /// At least one transactional batch failed on this node.
    /// Batches that committed before or alongside the failure stay committed.
    #[error(
        "{failed_batches} of {total_batches} batches failed ({created} entities created): {first_cause}"
    )]
    BatchFailure {
        failed_batches: usize,
        total_batches: usize,
        created: u64,
        first_cause: anyhow::Error,
    },

    /// A cluster member could not run its share of the campaign.
    #[error("Node {node} failed: {cause}")]
    NodeFailure { node: String, cause: String },

    /// The shared lease store could not be reached or rejected the operation.
    #[error("Lease store error: {0}")]
    Store(anyhow::Error),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type DatasetResult<T> = Result<T, DatasetError>;

impl DatasetError {
    /// True for errors the trigger reports synchronously without touching cluster state.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            DatasetError::Configuration(_) | DatasetError::Conflict { .. }
        )
    }
}
