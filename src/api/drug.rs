use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sea_orm::DatabaseConnection;
use serde_json::json;

use crate::auth::Claims;
use crate::models::Drug;
use crate::services::inventory_service::{self, DrugUpdate, ServiceError};

pub async fn get_drug(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match inventory_service::get_drug(&db, id).await {
        Ok((drug, batches)) => (
            StatusCode::OK,
            Json(json!({
                "drug": Drug::from(drug),
                "batches": batches
            })),
        )
            .into_response(),
        Err(ServiceError::NotFound) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Drug not found" })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("{:?}", e) })),
        )
            .into_response(),
    }
}

pub async fn update_drug(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
    _claims: Claims,
    Json(payload): Json<DrugUpdate>,
) -> impl IntoResponse {
    match inventory_service::update_drug(&db, id, payload).await {
        Ok(model) => (
            StatusCode::OK,
            Json(json!({
                "message": "Drug updated successfully",
                "drug": Drug::from(model)
            })),
        )
            .into_response(),
        Err(ServiceError::NotFound) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Drug not found" })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("{:?}", e) })),
        )
            .into_response(),
    }
}

pub async fn delete_drug(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
    _claims: Claims,
) -> impl IntoResponse {
    match inventory_service::delete_drug(&db, id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "Drug deleted successfully" })),
        )
            .into_response(),
        Err(ServiceError::NotFound) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Drug not found" })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("{:?}", e) })),
        )
            .into_response(),
    }
}

pub async fn get_drug_batches(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match inventory_service::get_drug(&db, id).await {
        Ok((_, batches)) => (StatusCode::OK, Json(json!({ "batches": batches }))).into_response(),
        Err(ServiceError::NotFound) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Drug not found" })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("{:?}", e) })),
        )
            .into_response(),
    }
}
