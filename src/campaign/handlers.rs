use super::protocol::*;
use super::service::{CampaignHandle, CampaignService};
use crate::config::{CampaignConfig, RemovalConfig};
use crate::error::{DatasetError, DatasetResult};

use axum::{
    Json,
    extract::{Extension, Query},
    http::StatusCode,
};
use std::sync::Arc;

fn status_code(error: &DatasetError) -> StatusCode {
    if error.is_rejection() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

pub async fn handle_trigger_campaign(
    Extension(service): Extension<Arc<CampaignService>>,
    Json(config): Json<CampaignConfig>,
) -> (StatusCode, Json<TriggerResponse>) {
    trigger_response(service.start_campaign(config).await)
}

pub async fn handle_remove_realms(
    Extension(service): Extension<Arc<CampaignService>>,
    Json(config): Json<RemovalConfig>,
) -> (StatusCode, Json<TriggerResponse>) {
    trigger_response(service.start_removal(config).await)
}

fn trigger_response(result: DatasetResult<CampaignHandle>) -> (StatusCode, Json<TriggerResponse>) {
    match result {
        Ok(handle) => (
            StatusCode::ACCEPTED,
            Json(TriggerResponse {
                accepted: true,
                message: format!(
                    "Task started: {}. Poll {} for progress",
                    handle.record.message, ENDPOINT_STATUS
                ),
                descriptor: Some(handle.descriptor),
                existing: None,
            }),
        ),
        Err(e) => {
            tracing::warn!("Campaign trigger failed: {}", e);
            let code = status_code(&e);
            let existing = match &e {
                DatasetError::Conflict { existing } => Some(existing.clone()),
                _ => None,
            };
            (
                code,
                Json(TriggerResponse {
                    accepted: false,
                    message: e.to_string(),
                    descriptor: None,
                    existing,
                }),
            )
        }
    }
}

pub async fn handle_get_status(
    Extension(service): Extension<Arc<CampaignService>>,
) -> (StatusCode, Json<StatusResponse>) {
    match service.query_status().await {
        Ok(status) => (
            StatusCode::OK,
            Json(StatusResponse {
                status: Some(status),
                error: None,
            }),
        ),
        Err(e) => {
            tracing::error!("Failed to read campaign status: {}", e);
            (
                status_code(&e),
                Json(StatusResponse {
                    status: None,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

pub async fn handle_get_completed(
    Extension(service): Extension<Arc<CampaignService>>,
) -> (StatusCode, Json<CompletedStatusResponse>) {
    match service.completed_status().await {
        Ok(record) => (
            StatusCode::OK,
            Json(CompletedStatusResponse {
                record,
                removed: None,
                error: None,
            }),
        ),
        Err(e) => {
            tracing::error!("Failed to read completed campaign: {}", e);
            (
                status_code(&e),
                Json(CompletedStatusResponse {
                    record: None,
                    removed: None,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

pub async fn handle_clear_completed(
    Extension(service): Extension<Arc<CampaignService>>,
) -> (StatusCode, Json<CompletedStatusResponse>) {
    match service.clear_completed().await {
        Ok(removed) => (
            StatusCode::OK,
            Json(CompletedStatusResponse {
                record: None,
                removed: Some(removed),
                error: None,
            }),
        ),
        Err(e) => {
            tracing::error!("Failed to clear completed campaign: {}", e);
            (
                status_code(&e),
                Json(CompletedStatusResponse {
                    record: None,
                    removed: None,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

pub async fn handle_last_entity(
    Extension(service): Extension<Arc<CampaignService>>,
    Query(query): Query<LastEntityQuery>,
) -> (StatusCode, Json<LastEntityResponse>) {
    match service
        .last_entity(query.kind, query.realm_name, query.prefix)
        .await
    {
        Ok(Some(name)) => (
            StatusCode::OK,
            Json(LastEntityResponse {
                message: format!("Last {} is {}", query.kind, name),
                last: Some(name),
            }),
        ),
        Ok(None) => (
            StatusCode::OK,
            Json(LastEntityResponse {
                last: None,
                message: format!("No {} created yet", query.kind),
            }),
        ),
        Err(e) => (
            status_code(&e),
            Json(LastEntityResponse {
                last: None,
                message: e.to_string(),
            }),
        ),
    }
}
