use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "drugs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// National Drug Code or internal SKU, natural key
    pub ndc: String,
    pub brand_name: String,
    pub generic_name: Option<String>,
    pub manufacturer: Option<String>,
    pub dosage_form: Option<String>,
    pub strength: Option<String>,
    pub package_size: Option<i32>,
    pub uom: Option<String>,
    pub selling_price: Option<f64>,
    #[sea_orm(default_value = "Rx")]
    pub rx_status: String,
    pub schedule: Option<String>,
    pub storage: Option<String>,
    pub location: Option<String>,
    #[sea_orm(default_value = 0)]
    pub min_stock_level: i32,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::batch::Entity")]
    Batches,
}

impl Related<super::batch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Batches.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Display name for dashboards: brand name, falling back to generic.
    pub fn display_name(&self) -> String {
        if !self.brand_name.is_empty() {
            self.brand_name.clone()
        } else {
            self.generic_name.clone().unwrap_or_default()
        }
    }
}

/// DTO for API responses
#[derive(Debug, Serialize, Deserialize)]
pub struct Drug {
    pub id: Option<i32>,
    pub ndc: String,
    pub brand_name: String,
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

impl From<Model> for Drug {
    fn from(model: Model) -> Self {
        Self {
            id: Some(model.id),
            ndc: model.ndc,
            brand_name: model.brand_name,
            generic_name: model.generic_name,
            manufacturer: model.manufacturer,
            dosage_form: model.dosage_form,
            strength: model.strength,
            package_size: model.package_size,
            uom: model.uom,
            selling_price: model.selling_price,
            rx_status: Some(model.rx_status),
            schedule: model.schedule,
            storage: model.storage,
            location: model.location,
            min_stock_level: Some(model.min_stock_level),
        }
    }
}
