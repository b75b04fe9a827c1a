use axum::{Json, extract::Extension, http::StatusCode};
use std::sync::Arc;

use super::cluster::ClusterEntityBackend;
use super::protocol::{EntityOp, EntityOpResponse};

pub async fn handle_entity_op(
    Extension(backend): Extension<Arc<ClusterEntityBackend>>,
    Json(op): Json<EntityOp>,
) -> (StatusCode, Json<EntityOpResponse>) {
    let result = tokio::task::spawn_blocking(move || backend.apply_local(op)).await;

    match result {
        Ok(Ok(response)) => (StatusCode::OK, Json(response)),
        Ok(Err(e)) => {
            tracing::warn!("Forwarded entity op failed: {:#}", e);
            (
                StatusCode::OK,
                Json(EntityOpResponse {
                    success: false,
                    error: Some(format!("{:#}", e)),
                    ..Default::default()
                }),
            )
        }
        Err(e) => {
            tracing::error!("Entity op task aborted: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(EntityOpResponse {
                    success: false,
                    error: Some(e.to_string()),
                    ..Default::default()
                }),
            )
        }
    }
}
