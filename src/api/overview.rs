use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use sea_orm::DatabaseConnection;
use serde_json::json;

use crate::services::inventory_service;

#[utoipa::path(
    get,
    path = "/api/overview",
    responses(
        (status = 200, description = "Dashboard statistics")
    )
)]
pub async fn overview(State(db): State<DatabaseConnection>) -> impl IntoResponse {
    match inventory_service::overview_stats(&db).await {
        Ok(stats) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "stats": stats
            })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "success": false,
                "error": format!("{:?}", e)
            })),
        )
            .into_response(),
    }
}
