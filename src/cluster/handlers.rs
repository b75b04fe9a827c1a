use super::node::NodeRunner;
use super::protocol::{RunCampaignRequest, RunCampaignResponse};

use axum::{Extension, Json, http::StatusCode};
use std::sync::Arc;

pub async fn handle_run_campaign(
    Extension(runner): Extension<Arc<NodeRunner>>,
    Json(req): Json<RunCampaignRequest>,
) -> (StatusCode, Json<RunCampaignResponse>) {
    let report = runner.run(&req.descriptor).await;
    (StatusCode::OK, Json(RunCampaignResponse { report }))
}
