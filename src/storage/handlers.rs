use axum::{Json, extract::Extension, http::StatusCode};
use std::sync::Arc;

use super::cluster::ClusterLeaseStore;
use super::protocol::{LeaseOpRequest, LeaseOpResponse, LeaseReplicateRequest, LeaseReplicateResponse};

pub async fn handle_lease_op(
    Extension(store): Extension<Arc<ClusterLeaseStore>>,
    Json(req): Json<LeaseOpRequest>,
) -> (StatusCode, Json<LeaseOpResponse>) {
    tracing::trace!(
        "Received forwarded lease op {} for partition {}",
        req.op_id,
        req.partition
    );

    let outcome = store.apply_as_primary(req.partition, req.op_id, req.op).await;
    (
        StatusCode::OK,
        Json(LeaseOpResponse {
            success: true,
            outcome: Some(outcome),
            error: None,
        }),
    )
}

pub async fn handle_lease_replicate(
    Extension(store): Extension<Arc<ClusterLeaseStore>>,
    Json(req): Json<LeaseReplicateRequest>,
) -> (StatusCode, Json<LeaseReplicateResponse>) {
    store.store_replica(&req.key, req.entry);
    tracing::debug!(
        "Stored lease replica '{}' for partition {} (op {})",
        req.key,
        req.partition,
        req.op_id
    );
    (StatusCode::OK, Json(LeaseReplicateResponse { success: true }))
}
