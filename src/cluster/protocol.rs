//! Campaign Dispatch Protocol
//!
//! The initiator POSTs the immutable descriptor to every member; each member answers
//! with its [`NodeReport`] once its local batches have finished.

use super::types::NodeReport;
use crate::campaign::types::CampaignDescriptor;
use serde::{Deserialize, Serialize};

/// Runs the member's share of a campaign and blocks until it is done.
pub const ENDPOINT_RUN_CAMPAIGN: &str = "/internal/campaign/run";

#[derive(Debug, Serialize, Deserialize)]
pub struct RunCampaignRequest {
    pub descriptor: CampaignDescriptor,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunCampaignResponse {
    pub report: NodeReport,
}
