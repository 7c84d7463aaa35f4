use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::json;

use crate::auth::Claims;
use crate::services::order_service::{self, OrderItemRequest, ServiceError};

/// Request body for creating an order
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemRequest>,
    pub notes: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/orders",
    responses(
        (status = 200, description = "All orders with their items, newest first")
    )
)]
pub async fn list_orders(State(db): State<DatabaseConnection>) -> impl IntoResponse {
    match order_service::list_orders(&db).await {
        Ok(orders) => {
            let count = orders.len();
            (
                StatusCode::OK,
                Json(json!({
                    "orders": orders,
                    "count": count
                })),
            )
                .into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("{:?}", e) })),
        )
            .into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/orders",
    responses(
        (status = 201, description = "Order created, stock decremented"),
        (status = 422, description = "Validation or stock failure, nothing persisted")
    )
)]
pub async fn create_order(
    State(db): State<DatabaseConnection>,
    _claims: Claims,
    Json(payload): Json<CreateOrderRequest>,
) -> impl IntoResponse {
    match order_service::create_order(&db, payload.items, payload.notes).await {
        Ok(order) => (
            StatusCode::CREATED,
            Json(json!({
                "message": "Order created successfully!",
                "order": order
            })),
        )
            .into_response(),
        Err(ServiceError::InvalidState(msg)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "message": format!("Order failed: {}", msg) })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": format!("Order failed: {:?}", e) })),
        )
            .into_response(),
    }
}

pub async fn get_order(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match order_service::get_order(&db, id).await {
        Ok(order) => (StatusCode::OK, Json(json!({ "order": order }))).into_response(),
        Err(ServiceError::NotFound) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Order not found" })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("{:?}", e) })),
        )
            .into_response(),
    }
}

pub async fn cancel_order(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
    _claims: Claims,
) -> impl IntoResponse {
    match order_service::cancel_order(&db, id).await {
        Ok(order) => (
            StatusCode::OK,
            Json(json!({
                "message": "Order cancelled, stock restored",
                "order": order
            })),
        )
            .into_response(),
        Err(ServiceError::NotFound) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Order not found" })),
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
