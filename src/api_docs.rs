use crate::api;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health::health_check,
        api::auth::login,
        api::inventory::list_inventory,
        api::order::list_orders,
        api::order::create_order,
        api::overview::overview,
    ),
    tags(
        (name = "pharmatrack", description = "PharmaTrack API")
    )
)]
pub struct ApiDoc;
