//! Entity Store Network Protocol
//!
//! Members that do not host the entity store forward existence checks, batch commits
//! and batch deletions to the member that does. Serialized as JSON over HTTP.

use super::types::Entity;
use crate::campaign::types::EntityKind;
use serde::{Deserialize, Serialize};

// --- API Endpoints ---

pub const ENDPOINT_ENTITY_OP: &str = "/internal/entity/op";

// --- Data Transfer Objects ---

/// One backend call. Deadlines travel as the time left when the call was forwarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EntityOp {
    Exists {
        kind: EntityKind,
        realm: Option<String>,
        name: String,
    },
    Commit {
        kind: EntityKind,
        realm: Option<String>,
        entities: Vec<Entity>,
        timeout_ms: u64,
    },
    Delete {
        kind: EntityKind,
        realm: Option<String>,
        names: Vec<String>,
        timeout_ms: u64,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityOpResponse {
    pub success: bool,
    /// Answer to `Exists`.
    pub exists: Option<bool>,
    /// Number of entities a `Delete` actually removed.
    pub removed: Option<u64>,
    pub error: Option<String>,
}
