use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use pharmatrack::{auth, db, server};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serial_test::serial;
use tower::util::ServiceExt; // for `oneshot`

// Helper to create a test database
async fn setup_test_db() -> DatabaseConnection {
    db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB")
}

// Helper to create a test drug, returns its id
async fn create_test_drug(
    db: &DatabaseConnection,
    ndc: &str,
    brand_name: &str,
    selling_price: f64,
    min_stock_level: i32,
) -> i32 {
    let now = chrono::Utc::now().to_rfc3339();
    let drug = pharmatrack::models::drug::ActiveModel {
        ndc: Set(ndc.to_string()),
        brand_name: Set(brand_name.to_string()),
        generic_name: Set(None),
        selling_price: Set(Some(selling_price)),
        rx_status: Set("Rx".to_string()),
        min_stock_level: Set(min_stock_level),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    let res = pharmatrack::models::drug::Entity::insert(drug)
        .exec(db)
        .await
        .expect("Failed to create drug");
    res.last_insert_id
}

// Helper to create a test batch, returns its id
async fn create_test_batch(
    db: &DatabaseConnection,
    drug_id: i32,
    batch_no: &str,
    expiry_date: &str,
    quantity: i32,
) -> i32 {
    let now = chrono::Utc::now().to_rfc3339();
    let batch = pharmatrack::models::batch::ActiveModel {
        drug_id: Set(drug_id),
        batch_no: Set(batch_no.to_string()),
        expiry_date: Set(expiry_date.to_string()),
        quantity: Set(quantity),
        cost_price: Set(1.0),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    let res = pharmatrack::models::batch::Entity::insert(batch)
        .exec(db)
        .await
        .expect("Failed to create batch");
    res.last_insert_id
}

fn future_date(days: i64) -> String {
    (chrono::Local::now() + chrono::Duration::days(days))
        .format("%Y-%m-%d")
        .to_string()
}

fn auth_header() -> String {
    format!("Bearer {}", auth::create_jwt("admin", "admin").unwrap())
}

async fn batch_quantity(db: &DatabaseConnection, id: i32) -> i32 {
    pharmatrack::models::batch::Entity::find_by_id(id)
        .one(db)
        .await
        .unwrap()
        .expect("batch should exist")
        .quantity
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn post_json(uri: &str, payload: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("POST")
        .header("Content-Type", "application/json")
        .header("Authorization", auth_header())
        .body(Body::from(payload.to_string()))
        .unwrap()
}

#[tokio::test]
#[serial]
async fn test_create_order_decrements_stock_and_totals() {
    let db = setup_test_db().await;
    let drug_id = create_test_drug(&db, "0001-0001", "Tylenol", 8.50, 10).await;
    let batch_id = create_test_batch(&db, drug_id, "LOT-1", &future_date(365), 100).await;

    let app = server::build_router(db.clone());

    let payload = serde_json::json!({
        "items": [
            { "drug_id": drug_id, "batch_id": batch_id, "quantity": 4 }
        ],
        "notes": "walk-in"
    });
    let response = app.oneshot(post_json("/api/orders", &payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = json_body(response).await;
    let order = &json["order"];
    assert_eq!(order["status"], "pending");
    assert_eq!(order["total_amount"], 34.0);
    assert_eq!(order["notes"], "walk-in");
    assert!(
        order["order_number"]
            .as_str()
            .unwrap()
            .starts_with("ORD-")
    );
    assert_eq!(order["items"].as_array().unwrap().len(), 1);
    assert_eq!(order["items"][0]["unit_price"], 8.5);
    assert_eq!(order["items"][0]["subtotal"], 34.0);
    assert_eq!(order["items"][0]["drug_name"], "Tylenol");
    assert_eq!(order["items"][0]["batch_no"], "LOT-1");

    assert_eq!(batch_quantity(&db, batch_id).await, 96);
}

#[tokio::test]
#[serial]
async fn test_order_insufficient_stock_rolls_back_everything() {
    let db = setup_test_db().await;
    let drug_id = create_test_drug(&db, "0001-0002", "Lipitor", 24.0, 10).await;
    let big_batch = create_test_batch(&db, drug_id, "LOT-A", &future_date(365), 50).await;
    let small_batch = create_test_batch(&db, drug_id, "LOT-B", &future_date(365), 3).await;

    let app = server::build_router(db.clone());

    let payload = serde_json::json!({
        "items": [
            { "drug_id": drug_id, "batch_id": big_batch, "quantity": 10 },
            { "drug_id": drug_id, "batch_id": small_batch, "quantity": 5 }
        ]
    });
    let response = app.oneshot(post_json("/api/orders", &payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let json = json_body(response).await;
    assert!(
        json["message"]
            .as_str()
            .unwrap()
            .contains("Insufficient stock for batch: LOT-B")
    );

    // The first item's decrement must have been rolled back too
    assert_eq!(batch_quantity(&db, big_batch).await, 50);
    assert_eq!(batch_quantity(&db, small_batch).await, 3);

    // And no order row was left behind
    let orders = pharmatrack::models::order::Entity::find()
        .all(&db)
        .await
        .unwrap();
    assert!(orders.is_empty());
}

#[tokio::test]
#[serial]
async fn test_order_two_items_on_same_batch_see_combined_stock() {
    let db = setup_test_db().await;
    let drug_id = create_test_drug(&db, "0001-0003", "Humalog", 98.0, 10).await;
    let batch_id = create_test_batch(&db, drug_id, "LOT-C", &future_date(365), 10).await;

    let app = server::build_router(db.clone());

    // Each line passes alone, together they exceed stock
    let payload = serde_json::json!({
        "items": [
            { "drug_id": drug_id, "batch_id": batch_id, "quantity": 7 },
            { "drug_id": drug_id, "batch_id": batch_id, "quantity": 7 }
        ]
    });
    let response = app.oneshot(post_json("/api/orders", &payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(batch_quantity(&db, batch_id).await, 10);
}

#[tokio::test]
#[serial]
async fn test_order_rejects_expired_batch_and_wrong_drug() {
    let db = setup_test_db().await;
    let drug_id = create_test_drug(&db, "0001-0004", "Aspirin", 3.0, 10).await;
    let other_drug = create_test_drug(&db, "0001-0005", "Ibuprofen", 4.0, 10).await;
    let expired = create_test_batch(&db, drug_id, "LOT-OLD", "2020-01-01", 100).await;
    let valid = create_test_batch(&db, drug_id, "LOT-NEW", &future_date(365), 100).await;

    let app = server::build_router(db.clone());

    let payload = serde_json::json!({
        "items": [{ "drug_id": drug_id, "batch_id": expired, "quantity": 1 }]
    });
    let response = app
        .clone()
        .oneshot(post_json("/api/orders", &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = json_body(response).await;
    assert!(json["message"].as_str().unwrap().contains("expired"));

    // Batch belongs to drug_id, not other_drug
    let payload = serde_json::json!({
        "items": [{ "drug_id": other_drug, "batch_id": valid, "quantity": 1 }]
    });
    let response = app.oneshot(post_json("/api/orders", &payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(batch_quantity(&db, valid).await, 100);
}

#[tokio::test]
#[serial]
async fn test_order_requires_items() {
    let db = setup_test_db().await;
    let app = server::build_router(db);

    let payload = serde_json::json!({ "items": [] });
    let response = app.oneshot(post_json("/api/orders", &payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
#[serial]
async fn test_cancel_order_restores_stock() {
    let db = setup_test_db().await;
    let drug_id = create_test_drug(&db, "0001-0006", "Zyrtec", 11.0, 10).await;
    let batch_id = create_test_batch(&db, drug_id, "LOT-D", &future_date(365), 30).await;

    let app = server::build_router(db.clone());

    let payload = serde_json::json!({
        "items": [{ "drug_id": drug_id, "batch_id": batch_id, "quantity": 12 }]
    });
    let response = app
        .clone()
        .oneshot(post_json("/api/orders", &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = json_body(response).await;
    let order_id = json["order"]["id"].as_i64().unwrap();
    assert_eq!(batch_quantity(&db, batch_id).await, 18);

    // Cancel restores the quantity
    let req = Request::builder()
        .uri(format!("/api/orders/{}/cancel", order_id))
        .method("PUT")
        .header("Authorization", auth_header())
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["order"]["status"], "cancelled");
    assert_eq!(batch_quantity(&db, batch_id).await, 30);

    // A second cancel is rejected
    let req = Request::builder()
        .uri(format!("/api/orders/{}/cancel", order_id))
        .method("PUT")
        .header("Authorization", auth_header())
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(batch_quantity(&db, batch_id).await, 30);
}

#[tokio::test]
#[serial]
async fn test_list_orders_newest_first_with_items() {
    let db = setup_test_db().await;
    let drug_id = create_test_drug(&db, "0001-0007", "Advil", 6.0, 10).await;
    let batch_id = create_test_batch(&db, drug_id, "LOT-E", &future_date(365), 100).await;

    let app = server::build_router(db.clone());

    for quantity in [1, 2] {
        let payload = serde_json::json!({
            "items": [{ "drug_id": drug_id, "batch_id": batch_id, "quantity": quantity }]
        });
        let response = app
            .clone()
            .oneshot(post_json("/api/orders", &payload))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let req = Request::builder()
        .uri("/api/orders")
        .method("GET")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["count"], 2);
    let orders = json["orders"].as_array().unwrap();
    assert_eq!(orders.len(), 2);
    for order in orders {
        assert_eq!(order["items"].as_array().unwrap().len(), 1);
        assert_eq!(order["items"][0]["drug_name"], "Advil");
    }
}

#[tokio::test]
#[serial]
async fn test_inventory_listing_excludes_expired_stock() {
    let db = setup_test_db().await;
    let drug_id = create_test_drug(&db, "0002-0001", "Metformin", 5.0, 10).await;
    create_test_batch(&db, drug_id, "LOT-F", &future_date(200), 40).await;
    create_test_batch(&db, drug_id, "LOT-G", "2020-06-01", 500).await;

    let app = server::build_router(db);

    let req = Request::builder()
        .uri("/api/inventory")
        .method("GET")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["success"], true);
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["total_stock"], 40);
    // The expired lot is not listed among the batches either
    assert_eq!(data[0]["batches"].as_array().unwrap().len(), 1);
    assert_eq!(data[0]["batches"][0]["batch_no"], "LOT-F");
}

#[tokio::test]
#[serial]
async fn test_inventory_search_and_pagination() {
    let db = setup_test_db().await;
    for (ndc, name) in [
        ("0003-0001", "Amoxil"),
        ("0003-0002", "Amoxicillin Forte"),
        ("0003-0003", "Zocor"),
    ] {
        let id = create_test_drug(&db, ndc, name, 2.0, 0).await;
        create_test_batch(&db, id, "LOT-1", &future_date(100), 10).await;
    }

    let app = server::build_router(db);

    // Substring search on brand name
    let req = Request::builder()
        .uri("/api/inventory?search=Amox")
        .method("GET")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let json = json_body(response).await;
    assert_eq!(json["pagination"]["total"], 2);

    // Search by NDC
    let req = Request::builder()
        .uri("/api/inventory?search=0003-0003")
        .method("GET")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let json = json_body(response).await;
    assert_eq!(json["pagination"]["total"], 1);
    assert_eq!(json["data"][0]["brand_name"], "Zocor");

    // per_page=0 falls back to the default page size
    let req = Request::builder()
        .uri("/api/inventory?per_page=0")
        .method("GET")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let json = json_body(response).await;
    assert_eq!(json["pagination"]["per_page"], 15);
    assert_eq!(json["data"].as_array().unwrap().len(), 3);

    // Pagination metadata
    let req = Request::builder()
        .uri("/api/inventory?per_page=2&page=2")
        .method("GET")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let json = json_body(response).await;
    assert_eq!(json["pagination"]["current_page"], 2);
    assert_eq!(json["pagination"]["per_page"], 2);
    assert_eq!(json["pagination"]["total"], 3);
    assert_eq!(json["pagination"]["last_page"], 2);
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn test_inventory_low_stock_filter() {
    let db = setup_test_db().await;

    let low = create_test_drug(&db, "0004-0001", "Lantus", 50.0, 25).await;
    create_test_batch(&db, low, "LOT-H", &future_date(100), 5).await;

    let ok = create_test_drug(&db, "0004-0002", "Crestor", 20.0, 25).await;
    create_test_batch(&db, ok, "LOT-I", &future_date(100), 200).await;

    let app = server::build_router(db);

    let req = Request::builder()
        .uri("/api/inventory?low_stock=1")
        .method("GET")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let json = json_body(response).await;

    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["brand_name"], "Lantus");
    assert_eq!(data[0]["total_stock"], 5);
}

#[tokio::test]
#[serial]
async fn test_overview_stats() {
    let db = setup_test_db().await;

    let tylenol = create_test_drug(&db, "0005-0001", "Tylenol", 8.0, 50).await;
    create_test_batch(&db, tylenol, "LOT-J", &future_date(30), 10).await;

    let lipitor = create_test_drug(&db, "0005-0002", "Lipitor", 24.0, 5).await;
    create_test_batch(&db, lipitor, "LOT-K", &future_date(365), 80).await;

    let app = server::build_router(db);

    let req = Request::builder()
        .uri("/api/overview")
        .method("GET")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    let stats = &json["stats"];
    assert_eq!(stats["total_drugs"], 2);
    // Tylenol: 10 on hand vs min 50
    assert_eq!(stats["low_stock_alerts"], 1);
    assert_eq!(stats["most_stocked"], "Lipitor (80)");
    assert_eq!(stats["least_stocked"], "Tylenol (10)");
    assert_ne!(stats["last_update"], "Never");

    // Only LOT-J falls inside the 90-day expiry window
    let nearing = stats["nearing_expiry"].as_array().unwrap();
    assert_eq!(nearing.len(), 1);
    assert_eq!(nearing[0]["drug_name"], "Tylenol");
    assert_eq!(nearing[0]["days_left"], 30);
}

#[tokio::test]
#[serial]
async fn test_partial_drug_update_preserves_other_fields() {
    let db = setup_test_db().await;

    let now = chrono::Utc::now().to_rfc3339();
    let drug = pharmatrack::models::drug::ActiveModel {
        ndc: Set("0007-0001".to_string()),
        brand_name: Set("Tylenol".to_string()),
        generic_name: Set(Some("Acetaminophen".to_string())),
        manufacturer: Set(Some("J&J".to_string())),
        selling_price: Set(Some(8.5)),
        rx_status: Set("OTC".to_string()),
        min_stock_level: Set(20),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    let drug_id = pharmatrack::models::drug::Entity::insert(drug)
        .exec(&db)
        .await
        .unwrap()
        .last_insert_id;

    let app = server::build_router(db.clone());

    // Only brand_name in the body; everything else must survive
    let payload = serde_json::json!({ "brand_name": "Tylenol Extra Strength" });
    let req = Request::builder()
        .uri(format!("/api/drugs/{}", drug_id))
        .method("PUT")
        .header("Content-Type", "application/json")
        .header("Authorization", auth_header())
        .body(Body::from(payload.to_string()))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stored = pharmatrack::models::drug::Entity::find_by_id(drug_id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.brand_name, "Tylenol Extra Strength");
    assert_eq!(stored.generic_name.as_deref(), Some("Acetaminophen"));
    assert_eq!(stored.manufacturer.as_deref(), Some("J&J"));
    assert_eq!(stored.selling_price, Some(8.5));
    assert_eq!(stored.rx_status, "OTC");
    assert_eq!(stored.min_stock_level, 20);
}

#[tokio::test]
#[serial]
async fn test_drug_crud_roundtrip() {
    let db = setup_test_db().await;
    let drug_id = create_test_drug(&db, "0006-0001", "Ventolin", 30.0, 10).await;
    create_test_batch(&db, drug_id, "LOT-L", &future_date(100), 50).await;

    let app = server::build_router(db.clone());

    // Read
    let req = Request::builder()
        .uri(format!("/api/drugs/{}", drug_id))
        .method("GET")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["drug"]["brand_name"], "Ventolin");
    assert_eq!(json["batches"].as_array().unwrap().len(), 1);

    // Update
    let payload = serde_json::json!({
        "ndc": "0006-0001",
        "brand_name": "Ventolin HFA",
        "selling_price": 32.5,
        "min_stock_level": 15
    });
    let req = Request::builder()
        .uri(format!("/api/drugs/{}", drug_id))
        .method("PUT")
        .header("Content-Type", "application/json")
        .header("Authorization", auth_header())
        .body(Body::from(payload.to_string()))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["drug"]["brand_name"], "Ventolin HFA");
    assert_eq!(json["drug"]["min_stock_level"], 15);

    // Delete cascades to batches
    let req = Request::builder()
        .uri(format!("/api/drugs/{}", drug_id))
        .method("DELETE")
        .header("Authorization", auth_header())
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let remaining = pharmatrack::models::batch::Entity::find()
        .filter(pharmatrack::models::batch::Column::DrugId.eq(drug_id))
        .all(&db)
        .await
        .unwrap();
    assert!(remaining.is_empty());
}
