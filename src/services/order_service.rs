//! Order Service - Business logic for pharmacy point-of-sale orders
//!
//! Order creation validates requested items against batch stock, decrements
//! quantities and totals the price inside a single database transaction.

use chrono::Local;
use rand::Rng;
use rand::distributions::Alphanumeric;
use sea_orm::*;
use std::collections::HashMap;

use crate::models::batch::{self, Entity as Batch};
use crate::models::drug::{self, Entity as Drug};
use crate::models::order::{self, Entity as Order};
use crate::models::order_item::{self, Entity as OrderItem};

/// Error type for service operations
#[derive(Debug)]
pub enum ServiceError {
    Database(String),
    NotFound,
    InvalidState(String),
}

impl From<sea_orm::DbErr> for ServiceError {
    fn from(e: sea_orm::DbErr) -> Self {
        ServiceError::Database(e.to_string())
    }
}

/// One requested line of a new order
#[derive(Debug, Clone, serde::Deserialize)]
pub struct OrderItemRequest {
    pub drug_id: i32,
    pub batch_id: i32,
    pub quantity: i32,
}

/// Order item enriched with drug and batch identifiers for display
#[derive(Debug, Clone, serde::Serialize)]
pub struct OrderItemDetails {
    pub id: i32,
    pub drug_id: i32,
    pub batch_id: i32,
    pub quantity: i32,
    pub unit_price: f64,
    pub subtotal: f64,
    pub drug_name: String,
    pub batch_no: String,
}

/// Order with its items, as returned by the API
#[derive(Debug, Clone, serde::Serialize)]
pub struct OrderWithItems {
    pub id: i32,
    pub order_number: String,
    pub status: String,
    pub notes: Option<String>,
    pub total_amount: f64,
    pub created_at: String,
    pub updated_at: String,
    pub items: Vec<OrderItemDetails>,
}

fn generate_order_number() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!("ORD-{}", suffix.to_uppercase())
}

fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Create an order: stock checks, item rows, batch decrements and the order
/// total all commit atomically or not at all.
pub async fn create_order(
    db: &DatabaseConnection,
    items: Vec<OrderItemRequest>,
    notes: Option<String>,
) -> Result<OrderWithItems, ServiceError> {
    if items.is_empty() {
        return Err(ServiceError::InvalidState(
            "Order must contain at least one item".to_string(),
        ));
    }

    for item in &items {
        if item.quantity < 1 {
            return Err(ServiceError::InvalidState(
                "Item quantity must be at least 1".to_string(),
            ));
        }
    }

    let txn = db.begin().await?;
    let timestamp = now();
    let cutoff = today();

    let new_order = order::ActiveModel {
        order_number: Set(generate_order_number()),
        status: Set("pending".to_owned()),
        notes: Set(notes),
        total_amount: Set(0.0),
        created_at: Set(timestamp.clone()),
        updated_at: Set(timestamp.clone()),
        ..Default::default()
    };
    let saved_order = new_order.insert(&txn).await?;

    let mut total_amount = 0.0;

    for item in &items {
        // Reads go through the transaction, so a second item hitting the
        // same batch sees the already-decremented quantity.
        let batch_model = Batch::find_by_id(item.batch_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::InvalidState(format!("Batch {} not found", item.batch_id))
            })?;

        if batch_model.drug_id != item.drug_id {
            txn.rollback().await?;
            return Err(ServiceError::InvalidState(format!(
                "Batch {} does not belong to drug {}",
                batch_model.batch_no, item.drug_id
            )));
        }

        if batch_model.is_expired(&cutoff) {
            txn.rollback().await?;
            return Err(ServiceError::InvalidState(format!(
                "Batch {} is expired",
                batch_model.batch_no
            )));
        }

        if batch_model.quantity < item.quantity {
            txn.rollback().await?;
            return Err(ServiceError::InvalidState(format!(
                "Insufficient stock for batch: {}",
                batch_model.batch_no
            )));
        }

        let drug_model = Drug::find_by_id(item.drug_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::InvalidState(format!("Drug {} not found", item.drug_id))
            })?;

        let unit_price = match drug_model.selling_price {
            Some(price) => price,
            None => {
                txn.rollback().await?;
                return Err(ServiceError::InvalidState(format!(
                    "Drug {} has no selling price",
                    drug_model.display_name()
                )));
            }
        };

        let subtotal = unit_price * item.quantity as f64;
        total_amount += subtotal;

        let new_item = order_item::ActiveModel {
            order_id: Set(saved_order.id),
            drug_id: Set(item.drug_id),
            batch_id: Set(item.batch_id),
            quantity: Set(item.quantity),
            unit_price: Set(unit_price),
            subtotal: Set(subtotal),
            created_at: Set(timestamp.clone()),
            updated_at: Set(timestamp.clone()),
            ..Default::default()
        };
        new_item.insert(&txn).await?;

        let remaining = batch_model.quantity - item.quantity;
        let mut batch_active: batch::ActiveModel = batch_model.into();
        batch_active.quantity = Set(remaining);
        batch_active.updated_at = Set(timestamp.clone());
        batch_active.update(&txn).await?;
    }

    let mut order_active: order::ActiveModel = saved_order.into();
    order_active.total_amount = Set(total_amount);
    let updated_order = order_active.update(&txn).await?;

    txn.commit().await?;

    let order_id = updated_order.id;
    get_order(db, order_id).await
}

/// Cancel an order and restore every item's quantity to its batch.
pub async fn cancel_order(db: &DatabaseConnection, id: i32) -> Result<OrderWithItems, ServiceError> {
    let order_model = Order::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    if order_model.status == "cancelled" {
        return Err(ServiceError::InvalidState(
            "Order is already cancelled".to_string(),
        ));
    }

    let txn = db.begin().await?;
    let timestamp = now();

    let items = OrderItem::find()
        .filter(order_item::Column::OrderId.eq(id))
        .all(&txn)
        .await?;

    for item in &items {
        if let Some(batch_model) = Batch::find_by_id(item.batch_id).one(&txn).await? {
            let restored = batch_model.quantity + item.quantity;
            let mut batch_active: batch::ActiveModel = batch_model.into();
            batch_active.quantity = Set(restored);
            batch_active.updated_at = Set(timestamp.clone());
            batch_active.update(&txn).await?;
        }
    }

    let mut order_active: order::ActiveModel = order_model.into();
    order_active.status = Set("cancelled".to_owned());
    order_active.updated_at = Set(timestamp);
    order_active.update(&txn).await?;

    txn.commit().await?;

    get_order(db, id).await
}

/// List all orders with their items, newest first
pub async fn list_orders(db: &DatabaseConnection) -> Result<Vec<OrderWithItems>, ServiceError> {
    let orders = Order::find()
        .order_by_desc(order::Column::CreatedAt)
        .all(db)
        .await?;

    let order_ids: Vec<i32> = orders.iter().map(|o| o.id).collect();

    let items = if order_ids.is_empty() {
        Vec::new()
    } else {
        OrderItem::find()
            .filter(order_item::Column::OrderId.is_in(order_ids))
            .all(db)
            .await?
    };

    let details = enrich_items(db, items).await?;

    let mut items_by_order: HashMap<i32, Vec<OrderItemDetails>> = HashMap::new();
    for (order_id, detail) in details {
        items_by_order.entry(order_id).or_default().push(detail);
    }

    Ok(orders
        .into_iter()
        .map(|o| {
            let items = items_by_order.remove(&o.id).unwrap_or_default();
            to_order_with_items(o, items)
        })
        .collect())
}

/// Fetch a single order with its items
pub async fn get_order(db: &DatabaseConnection, id: i32) -> Result<OrderWithItems, ServiceError> {
    let order_model = Order::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let items = OrderItem::find()
        .filter(order_item::Column::OrderId.eq(id))
        .all(db)
        .await?;

    let details = enrich_items(db, items).await?;
    let items = details.into_iter().map(|(_, d)| d).collect();

    Ok(to_order_with_items(order_model, items))
}

// Denormalize drug names and batch numbers into item rows
async fn enrich_items(
    db: &DatabaseConnection,
    items: Vec<order_item::Model>,
) -> Result<Vec<(i32, OrderItemDetails)>, ServiceError> {
    let drug_ids: Vec<i32> = items.iter().map(|i| i.drug_id).collect();
    let batch_ids: Vec<i32> = items.iter().map(|i| i.batch_id).collect();

    let mut drug_names: HashMap<i32, String> = HashMap::new();
    if !drug_ids.is_empty() {
        for d in Drug::find()
            .filter(drug::Column::Id.is_in(drug_ids))
            .all(db)
            .await?
        {
            drug_names.insert(d.id, d.display_name());
        }
    }

    let mut batch_nos: HashMap<i32, String> = HashMap::new();
    if !batch_ids.is_empty() {
        for b in Batch::find()
            .filter(batch::Column::Id.is_in(batch_ids))
            .all(db)
            .await?
        {
            batch_nos.insert(b.id, b.batch_no);
        }
    }

    Ok(items
        .into_iter()
        .map(|item| {
            let drug_name = drug_names
                .get(&item.drug_id)
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string());
            let batch_no = batch_nos
                .get(&item.batch_id)
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string());

            (
                item.order_id,
                OrderItemDetails {
                    id: item.id,
                    drug_id: item.drug_id,
                    batch_id: item.batch_id,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    subtotal: item.subtotal,
                    drug_name,
                    batch_no,
                },
            )
        })
        .collect())
}

fn to_order_with_items(order: order::Model, items: Vec<OrderItemDetails>) -> OrderWithItems {
    OrderWithItems {
        id: order.id,
        order_number: order.order_number,
        status: order.status,
        notes: order.notes,
        total_amount: order.total_amount,
        created_at: order.created_at,
        updated_at: order.updated_at,
        items,
    }
}
