use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sea_orm::DatabaseConnection;
use serde_json::json;

use crate::auth::Claims;
use crate::services::inventory_service::{self, BatchUpdate, ServiceError};

pub async fn update_batch(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
    _claims: Claims,
    Json(payload): Json<BatchUpdate>,
) -> impl IntoResponse {
    match inventory_service::update_batch(&db, id, payload).await {
        Ok(model) => (
            StatusCode::OK,
            Json(json!({
                "message": "Batch updated successfully",
                "batch": model
            })),
        )
            .into_response(),
        Err(ServiceError::NotFound) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Batch not found" })),
        )
            .into_response(),
        Err(ServiceError::InvalidState(msg)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": msg })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("{:?}", e) })),
        )
            .into_response(),
    }
}

pub async fn delete_batch(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
    _claims: Claims,
) -> impl IntoResponse {
    match inventory_service::delete_batch(&db, id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "Batch deleted successfully" })),
        )
            .into_response(),
        Err(ServiceError::NotFound) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Batch not found" })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("{:?}", e) })),
        )
            .into_response(),
    }
}
