//! Inventory Service - Stock aggregation, drug/batch upkeep and CSV row upserts
//!
//! Stock totals only ever count non-expired batches; expired lots sit in the
//! table for audit but contribute nothing to availability or low-stock math.

use chrono::{Local, NaiveDate};
use sea_orm::*;
use std::collections::HashMap;

use crate::import::DrugUploadRequest;
use crate::models::batch::{self, Entity as Batch};
use crate::models::drug::{self, Entity as DrugEntity};

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

/// Filter parameters for the inventory listing
#[derive(Debug, Default, Clone)]
pub struct InventoryFilter {
    pub search: Option<String>,
    pub low_stock_only: bool,
    pub page: u64,
    pub per_page: u64,
}

/// Drug enriched with its non-expired batches and aggregated stock
#[derive(Debug, serde::Serialize)]
pub struct DrugWithStock {
    pub id: i32,
    pub ndc: String,
    pub brand_name: String,
    pub generic_name: Option<String>,
    pub manufacturer: Option<String>,
    pub dosage_form: Option<String>,
    pub strength: Option<String>,
    pub package_size: Option<i32>,
    pub uom: Option<String>,
    pub selling_price: Option<f64>,
    pub rx_status: String,
    pub schedule: Option<String>,
    pub storage: Option<String>,
    pub location: Option<String>,
    pub min_stock_level: i32,
    pub total_stock: i64,
    pub batches: Vec<batch::Model>,
}

/// Pagination metadata mirrored into the API response
#[derive(Debug, serde::Serialize)]
pub struct Pagination {
    pub current_page: u64,
    pub per_page: u64,
    pub total: u64,
    pub last_page: u64,
}

/// Dashboard statistics
#[derive(Debug, serde::Serialize)]
pub struct OverviewStats {
    pub total_drugs: u64,
    pub low_stock_alerts: u64,
    pub most_stocked: String,
    pub least_stocked: String,
    pub last_update: String,
    pub nearing_expiry: Vec<ExpiringBatch>,
}

/// A batch nearing its expiry date
#[derive(Debug, serde::Serialize)]
pub struct ExpiringBatch {
    pub drug_name: String,
    pub expiry: String,
    pub days_left: i64,
}

fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn search_condition(search: &Option<String>) -> Condition {
    let mut condition = Condition::all();
    if let Some(term) = search {
        if !term.is_empty() {
            condition = condition.add(
                Condition::any()
                    .add(drug::Column::BrandName.contains(term))
                    .add(drug::Column::GenericName.contains(term))
                    .add(drug::Column::Ndc.contains(term)),
            );
        }
    }
    condition
}

// Non-expired batches for a set of drugs, grouped by drug id
async fn stock_batches<C: ConnectionTrait>(
    db: &C,
    drug_ids: Vec<i32>,
    cutoff: &str,
) -> Result<HashMap<i32, Vec<batch::Model>>, ServiceError> {
    let mut by_drug: HashMap<i32, Vec<batch::Model>> = HashMap::new();

    if drug_ids.is_empty() {
        return Ok(by_drug);
    }

    let batches = Batch::find()
        .filter(batch::Column::DrugId.is_in(drug_ids))
        .filter(batch::Column::ExpiryDate.gt(cutoff))
        .order_by_asc(batch::Column::ExpiryDate)
        .all(db)
        .await?;

    for b in batches {
        by_drug.entry(b.drug_id).or_default().push(b);
    }

    Ok(by_drug)
}

fn to_drug_with_stock(model: drug::Model, batches: Vec<batch::Model>) -> DrugWithStock {
    let total_stock = batches.iter().map(|b| b.quantity as i64).sum();

    DrugWithStock {
        id: model.id,
        ndc: model.ndc,
        brand_name: model.brand_name,
        generic_name: model.generic_name,
        manufacturer: model.manufacturer,
        dosage_form: model.dosage_form,
        strength: model.strength,
        package_size: model.package_size,
        uom: model.uom,
        selling_price: model.selling_price,
        rx_status: model.rx_status,
        schedule: model.schedule,
        storage: model.storage,
        location: model.location,
        min_stock_level: model.min_stock_level,
        total_stock,
        batches,
    }
}

/// Paginated, searchable inventory listing with per-drug stock totals
pub async fn list_inventory(
    db: &DatabaseConnection,
    filter: InventoryFilter,
) -> Result<(Vec<DrugWithStock>, Pagination), ServiceError> {
    let per_page = if filter.per_page == 0 {
        15
    } else {
        filter.per_page
    };
    let page = if filter.page == 0 { 1 } else { filter.page };
    let cutoff = today();

    let condition = search_condition(&filter.search);

    if filter.low_stock_only {
        // Low stock depends on the aggregated total, so filter in memory
        // after computing stock for every matching drug.
        let drugs = DrugEntity::find()
            .filter(condition)
            .order_by_asc(drug::Column::BrandName)
            .all(db)
            .await?;

        let drug_ids: Vec<i32> = drugs.iter().map(|d| d.id).collect();
        let mut by_drug = stock_batches(db, drug_ids, &cutoff).await?;

        let low: Vec<DrugWithStock> = drugs
            .into_iter()
            .map(|d| {
                let batches = by_drug.remove(&d.id).unwrap_or_default();
                to_drug_with_stock(d, batches)
            })
            .filter(|d| d.total_stock <= d.min_stock_level as i64)
            .collect();

        let total = low.len() as u64;
        let last_page = total.div_ceil(per_page).max(1);
        let start = ((page - 1) * per_page) as usize;
        let data: Vec<DrugWithStock> = low
            .into_iter()
            .skip(start)
            .take(per_page as usize)
            .collect();

        return Ok((
            data,
            Pagination {
                current_page: page,
                per_page,
                total,
                last_page,
            },
        ));
    }

    let paginator = DrugEntity::find()
        .filter(condition)
        .order_by_asc(drug::Column::BrandName)
        .paginate(db, per_page);

    let totals = paginator.num_items_and_pages().await?;
    let drugs = paginator.fetch_page(page - 1).await?;

    let drug_ids: Vec<i32> = drugs.iter().map(|d| d.id).collect();
    let mut by_drug = stock_batches(db, drug_ids, &cutoff).await?;

    let data = drugs
        .into_iter()
        .map(|d| {
            let batches = by_drug.remove(&d.id).unwrap_or_default();
            to_drug_with_stock(d, batches)
        })
        .collect();

    Ok((
        data,
        Pagination {
            current_page: page,
            per_page,
            total: totals.number_of_items,
            last_page: totals.number_of_pages.max(1),
        },
    ))
}

/// Fetch one drug with all of its batches (expired included), soonest expiry first
pub async fn get_drug(
    db: &DatabaseConnection,
    id: i32,
) -> Result<(drug::Model, Vec<batch::Model>), ServiceError> {
    let drug_model = DrugEntity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let batches = Batch::find()
        .filter(batch::Column::DrugId.eq(id))
        .order_by_asc(batch::Column::ExpiryDate)
        .all(db)
        .await?;

    Ok((drug_model, batches))
}

/// Fields a drug update may touch. The NDC is the natural key and stays fixed;
/// omitted fields keep their stored value.
#[derive(Debug, serde::Deserialize)]
pub struct DrugUpdate {
    pub brand_name: Option<String>,
    pub generic_name: Option<String>,
    pub manufacturer: Option<String>,
    pub dosage_form: Option<String>,
    pub strength: Option<String>,
    pub package_size: Option<i32>,
    pub uom: Option<String>,
    pub selling_price: Option<f64>,
    pub rx_status: Option<String>,
    pub schedule: Option<String>,
    pub storage: Option<String>,
    pub location: Option<String>,
    pub min_stock_level: Option<i32>,
}

/// Partial update of drug fields
pub async fn update_drug(
    db: &DatabaseConnection,
    id: i32,
    update: DrugUpdate,
) -> Result<drug::Model, ServiceError> {
    let existing = DrugEntity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let mut active: drug::ActiveModel = existing.into();
    if let Some(v) = update.brand_name {
        active.brand_name = Set(v);
    }
    if let Some(v) = update.generic_name {
        active.generic_name = Set(Some(v));
    }
    if let Some(v) = update.manufacturer {
        active.manufacturer = Set(Some(v));
    }
    if let Some(v) = update.dosage_form {
        active.dosage_form = Set(Some(v));
    }
    if let Some(v) = update.strength {
        active.strength = Set(Some(v));
    }
    if let Some(v) = update.package_size {
        active.package_size = Set(Some(v));
    }
    if let Some(v) = update.uom {
        active.uom = Set(Some(v));
    }
    if let Some(v) = update.selling_price {
        active.selling_price = Set(Some(v));
    }
    if let Some(v) = update.rx_status {
        active.rx_status = Set(v);
    }
    if let Some(v) = update.schedule {
        active.schedule = Set(Some(v));
    }
    if let Some(v) = update.storage {
        active.storage = Set(Some(v));
    }
    if let Some(v) = update.location {
        active.location = Set(Some(v));
    }
    if let Some(v) = update.min_stock_level {
        active.min_stock_level = Set(v);
    }
    active.updated_at = Set(now());

    Ok(active.update(db).await?)
}

/// Delete a drug; batches cascade
pub async fn delete_drug(db: &DatabaseConnection, id: i32) -> Result<(), ServiceError> {
    let existing = DrugEntity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    existing.delete(db).await?;
    Ok(())
}

/// Fields a batch update may touch
#[derive(Debug, serde::Deserialize)]
pub struct BatchUpdate {
    pub quantity: Option<i32>,
    pub expiry_date: Option<String>,
    pub cost_price: Option<f64>,
}

pub async fn update_batch(
    db: &DatabaseConnection,
    id: i32,
    update: BatchUpdate,
) -> Result<batch::Model, ServiceError> {
    let existing = Batch::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    if let Some(q) = update.quantity {
        if q < 0 {
            return Err(ServiceError::InvalidState(
                "quantity must be at least 0".to_string(),
            ));
        }
    }

    if let Some(date) = &update.expiry_date {
        if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
            return Err(ServiceError::InvalidState(
                "expiry_date must match the format Y-m-d".to_string(),
            ));
        }
    }

    if let Some(p) = update.cost_price {
        if p < 0.0 {
            return Err(ServiceError::InvalidState(
                "cost_price must be at least 0".to_string(),
            ));
        }
    }

    let mut active: batch::ActiveModel = existing.into();
    if let Some(q) = update.quantity {
        active.quantity = Set(q);
    }
    if let Some(date) = update.expiry_date {
        active.expiry_date = Set(date);
    }
    if let Some(p) = update.cost_price {
        active.cost_price = Set(p);
    }
    active.updated_at = Set(now());

    Ok(active.update(db).await?)
}

pub async fn delete_batch(db: &DatabaseConnection, id: i32) -> Result<(), ServiceError> {
    let existing = Batch::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    existing.delete(db).await?;
    Ok(())
}

/// Upsert one validated upload row: drug keyed by NDC, batch keyed by
/// (drug_id, batch_no). Both writes share a transaction so a failing row
/// never leaves a drug without its batch.
pub async fn upsert_drug_row(
    db: &DatabaseConnection,
    row: &DrugUploadRequest,
) -> Result<(), ServiceError> {
    let ndc = row
        .ndc
        .clone()
        .ok_or_else(|| ServiceError::InvalidState("ndc is required".to_string()))?;
    let brand_name = row
        .brand_name
        .clone()
        .ok_or_else(|| ServiceError::InvalidState("brand_name is required".to_string()))?;
    let batch_no = row
        .batch_no
        .clone()
        .ok_or_else(|| ServiceError::InvalidState("batch_no is required".to_string()))?;
    let expiry_date = row
        .expiry_date
        .clone()
        .ok_or_else(|| ServiceError::InvalidState("expiry_date is required".to_string()))?;
    let quantity = row
        .quantity
        .ok_or_else(|| ServiceError::InvalidState("quantity is required".to_string()))?;
    let cost_price = row
        .cost_price
        .ok_or_else(|| ServiceError::InvalidState("cost_price is required".to_string()))?;

    let txn = db.begin().await?;
    let timestamp = now();

    // 1. Create or update the drug by NDC
    let existing = DrugEntity::find()
        .filter(drug::Column::Ndc.eq(&ndc))
        .one(&txn)
        .await?;

    let drug_id = match existing {
        Some(model) => {
            let id = model.id;
            let mut active: drug::ActiveModel = model.into();
            active.brand_name = Set(brand_name);
            active.generic_name = Set(row.generic_name.clone());
            active.manufacturer = Set(row.manufacturer.clone());
            active.dosage_form = Set(row.dosage_form.clone());
            active.strength = Set(row.strength.clone());
            active.package_size = Set(row.package_size.map(|v| v as i32));
            active.uom = Set(row.uom.clone());
            active.selling_price = Set(row.selling_price);
            if let Some(rx_status) = row.rx_status.clone() {
                active.rx_status = Set(rx_status);
            }
            active.schedule = Set(row.schedule.clone());
            active.storage = Set(row.storage.clone());
            active.location = Set(row.location.clone());
            if let Some(level) = row.min_stock_level {
                active.min_stock_level = Set(level as i32);
            }
            active.updated_at = Set(timestamp.clone());
            active.update(&txn).await?;
            id
        }
        None => {
            let active = drug::ActiveModel {
                ndc: Set(ndc),
                brand_name: Set(brand_name),
                generic_name: Set(row.generic_name.clone()),
                manufacturer: Set(row.manufacturer.clone()),
                dosage_form: Set(row.dosage_form.clone()),
                strength: Set(row.strength.clone()),
                package_size: Set(row.package_size.map(|v| v as i32)),
                uom: Set(row.uom.clone()),
                selling_price: Set(row.selling_price),
                rx_status: Set(row.rx_status.clone().unwrap_or_else(|| "Rx".to_string())),
                schedule: Set(row.schedule.clone()),
                storage: Set(row.storage.clone()),
                location: Set(row.location.clone()),
                min_stock_level: Set(row.min_stock_level.unwrap_or(0) as i32),
                created_at: Set(timestamp.clone()),
                updated_at: Set(timestamp.clone()),
                ..Default::default()
            };
            active.insert(&txn).await?.id
        }
    };

    // 2. Create or update the batch. An existing batch is overwritten,
    // quantity included; this mirrors a full stock-take row.
    let existing_batch = Batch::find()
        .filter(batch::Column::DrugId.eq(drug_id))
        .filter(batch::Column::BatchNo.eq(&batch_no))
        .one(&txn)
        .await?;

    match existing_batch {
        Some(model) => {
            let mut active: batch::ActiveModel = model.into();
            active.expiry_date = Set(expiry_date);
            active.quantity = Set(quantity as i32);
            active.cost_price = Set(cost_price);
            active.updated_at = Set(timestamp.clone());
            active.update(&txn).await?;
        }
        None => {
            let active = batch::ActiveModel {
                drug_id: Set(drug_id),
                batch_no: Set(batch_no),
                expiry_date: Set(expiry_date),
                quantity: Set(quantity as i32),
                cost_price: Set(cost_price),
                created_at: Set(timestamp.clone()),
                updated_at: Set(timestamp),
                ..Default::default()
            };
            active.insert(&txn).await?;
        }
    }

    txn.commit().await?;
    Ok(())
}

/// Compute the dashboard statistics
pub async fn overview_stats(db: &DatabaseConnection) -> Result<OverviewStats, ServiceError> {
    let cutoff = today();

    let total_drugs = DrugEntity::find().count(db).await?;

    let drugs = DrugEntity::find().all(db).await?;
    let drug_ids: Vec<i32> = drugs.iter().map(|d| d.id).collect();
    let mut by_drug = stock_batches(db, drug_ids, &cutoff).await?;

    let stocked: Vec<(drug::Model, i64)> = drugs
        .into_iter()
        .map(|d| {
            let total: i64 = by_drug
                .remove(&d.id)
                .unwrap_or_default()
                .iter()
                .map(|b| b.quantity as i64)
                .sum();
            (d, total)
        })
        .collect();

    let low_stock_alerts = stocked
        .iter()
        .filter(|(d, total)| *total <= d.min_stock_level as i64)
        .count() as u64;

    let most_stocked = stocked
        .iter()
        .max_by_key(|(_, total)| *total)
        .map(|(d, total)| format!("{} ({})", d.display_name(), total))
        .unwrap_or_else(|| "N/A".to_string());

    let least_stocked = stocked
        .iter()
        .filter(|(_, total)| *total > 0)
        .min_by_key(|(_, total)| *total)
        .map(|(d, total)| format!("{} ({})", d.display_name(), total))
        .unwrap_or_else(|| "N/A".to_string());

    let nearing_expiry = nearing_expiry(db, &cutoff, 90).await?;

    let last_update = Batch::find()
        .order_by_desc(batch::Column::UpdatedAt)
        .one(db)
        .await?
        .map(|b| b.updated_at)
        .unwrap_or_else(|| "Never".to_string());

    Ok(OverviewStats {
        total_drugs,
        low_stock_alerts,
        most_stocked,
        least_stocked,
        last_update,
        nearing_expiry,
    })
}

// Batches expiring within `window_days` of today, soonest first
async fn nearing_expiry(
    db: &DatabaseConnection,
    cutoff: &str,
    window_days: i64,
) -> Result<Vec<ExpiringBatch>, ServiceError> {
    let today_date = NaiveDate::parse_from_str(cutoff, "%Y-%m-%d")
        .map_err(|e| ServiceError::InvalidState(e.to_string()))?;
    let horizon = (today_date + chrono::Duration::days(window_days))
        .format("%Y-%m-%d")
        .to_string();

    let batches = Batch::find()
        .filter(batch::Column::ExpiryDate.gt(cutoff))
        .filter(batch::Column::ExpiryDate.lte(&horizon))
        .order_by_asc(batch::Column::ExpiryDate)
        .all(db)
        .await?;

    let drug_ids: Vec<i32> = batches.iter().map(|b| b.drug_id).collect();
    let mut drug_names: HashMap<i32, String> = HashMap::new();
    if !drug_ids.is_empty() {
        for d in DrugEntity::find()
            .filter(drug::Column::Id.is_in(drug_ids))
            .all(db)
            .await?
        {
            drug_names.insert(d.id, d.display_name());
        }
    }

    Ok(batches
        .into_iter()
        .map(|b| {
            let days_left = NaiveDate::parse_from_str(&b.expiry_date, "%Y-%m-%d")
                .map(|d| (d - today_date).num_days())
                .unwrap_or(0);

            ExpiringBatch {
                drug_name: drug_names
                    .get(&b.drug_id)
                    .cloned()
                    .unwrap_or_else(|| "Unknown".to_string()),
                expiry: b.expiry_date,
                days_left,
            }
        })
        .collect())
}
