pub mod auth;
pub mod batch;
pub mod drug;
pub mod health;
pub mod inventory;
pub mod order;
pub mod overview;
pub mod upload;

use axum::{
    Router,
    routing::{get, post, put},
};
use sea_orm::DatabaseConnection;

pub fn api_router(db: DatabaseConnection) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Auth
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route("/auth/me", get(auth::get_me))
        .route("/auth/logout", post(auth::logout))
        // Inventory
        .route("/inventory", get(inventory::list_inventory))
        // Drugs
        .route(
            "/drugs/:id",
            get(drug::get_drug)
                .put(drug::update_drug)
                .delete(drug::delete_drug),
        )
        .route("/drugs/:id/batches", get(drug::get_drug_batches))
        // Batches
        .route(
            "/batches/:id",
            put(batch::update_batch).delete(batch::delete_batch),
        )
        // Orders
        .route("/orders", get(order::list_orders).post(order::create_order))
        .route("/orders/:id", get(order::get_order))
        .route("/orders/:id/cancel", put(order::cancel_order))
        // Uploads
        .route("/upload/csv", post(upload::upload_csv))
        .route("/upload/drug", post(upload::upload_single_drug))
        // Dashboard
        .route("/overview", get(overview::overview))
        .with_state(db)
}
