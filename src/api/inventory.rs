use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::json;

use crate::services::inventory_service::{self, InventoryFilter};

/// Query parameters for the inventory listing
#[derive(Debug, Deserialize)]
pub struct InventoryQuery {
    pub search: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub low_stock: Option<String>,
}

fn is_truthy(value: &Option<String>) -> bool {
    matches!(value.as_deref(), Some("1") | Some("true"))
}

#[utoipa::path(
    get,
    path = "/api/inventory",
    responses(
        (status = 200, description = "Paginated inventory with stock totals")
    )
)]
pub async fn list_inventory(
    State(db): State<DatabaseConnection>,
    Query(params): Query<InventoryQuery>,
) -> impl IntoResponse {
    let filter = InventoryFilter {
        search: params.search,
        low_stock_only: is_truthy(&params.low_stock),
        page: params.page.unwrap_or(1),
        per_page: params.per_page.unwrap_or(15),
    };

    match inventory_service::list_inventory(&db, filter).await {
        Ok((data, pagination)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": data,
                "pagination": pagination
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
