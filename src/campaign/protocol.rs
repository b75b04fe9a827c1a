//! Campaign Control Protocol
//!
//! Endpoints and DTOs of the trigger and status surface.

use super::types::{CampaignDescriptor, CampaignRecord, CampaignStatus, EntityKind};
use serde::{Deserialize, Serialize};

// --- API Endpoints ---

/// Triggers a campaign (body: `CampaignConfig`).
pub const ENDPOINT_CAMPAIGN: &str = "/dataset/campaign";
/// Running / completed / idle.
pub const ENDPOINT_STATUS: &str = "/dataset/status";
/// Last finished campaign (GET) or forget it (DELETE).
pub const ENDPOINT_STATUS_COMPLETED: &str = "/dataset/status-completed";
/// Removes a range of realms, or all of a prefix (body: `RemovalConfig`).
pub const ENDPOINT_REMOVE_REALMS: &str = "/dataset/remove-realms";
/// Name of the last created entity of a kind.
pub const ENDPOINT_LAST_ENTITY: &str = "/dataset/last-entity";

// --- Data Transfer Objects ---

#[derive(Debug, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub accepted: bool,
    pub message: String,
    pub descriptor: Option<CampaignDescriptor>,
    /// Record of the campaign holding the lock when the trigger was rejected.
    pub existing: Option<CampaignRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: Option<CampaignStatus>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompletedStatusResponse {
    pub record: Option<CampaignRecord>,
    pub removed: Option<bool>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LastEntityQuery {
    pub kind: EntityKind,
    pub realm_name: Option<String>,
    pub prefix: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LastEntityResponse {
    pub last: Option<String>,
    pub message: String,
}
