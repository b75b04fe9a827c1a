use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One synthetic entity ready to be committed.
///
/// `attributes` is free-form JSON so each entity kind can carry its own shape
/// (client secrets, user credentials, role assignments, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub name: String,
    pub attributes: serde_json::Value,
}

impl Entity {
    pub fn new(name: impl Into<String>, attributes: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            attributes,
        }
    }
}

/// Result of one batch, sent from a worker to the join barrier.
#[derive(Debug)]
pub struct BatchOutcome {
    pub batch: usize,
    pub start: u32,
    pub end: u32,
    pub result: anyhow::Result<u64>,
}

/// What a node's executor did with its work range.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionSummary {
    /// Entities created, or deleted by a removal campaign.
    pub created: u64,
    pub batches: usize,
    pub failed: usize,
    pub duration: Duration,
}
