use crate::auth::hash_password;
use crate::models::{batch, drug, user};
use sea_orm::*;

pub async fn seed_demo_data(db: &DatabaseConnection) -> Result<(), DbErr> {
    let now = chrono::Utc::now().to_rfc3339();

    // 1. Create Users
    let admin_password = hash_password("admin").map_err(DbErr::Custom)?;
    let user_password = hash_password("user").map_err(DbErr::Custom)?;

    let admin = user::ActiveModel {
        username: Set("admin".to_owned()),
        password_hash: Set(admin_password),
        role: Set("admin".to_owned()),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    };

    let normal_user = user::ActiveModel {
        username: Set("user".to_owned()),
        password_hash: Set(user_password),
        role: Set("user".to_owned()),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    };

    user::Entity::insert(admin)
        .on_conflict(
            sea_orm::sea_query::OnConflict::column(user::Column::Username)
                .do_nothing()
                .to_owned(),
        )
        .exec(db)
        .await?;

    user::Entity::insert(normal_user)
        .on_conflict(
            sea_orm::sea_query::OnConflict::column(user::Column::Username)
                .do_nothing()
                .to_owned(),
        )
        .exec(db)
        .await?;

    // 2. Create Drugs
    let demo_drugs = vec![
        ("0363-0160", "Tylenol", Some("Acetaminophen"), "OTC", 8.99),
        ("0002-1433", "Humalog", Some("Insulin lispro"), "Rx", 98.50),
        ("0071-0155", "Lipitor", Some("Atorvastatin"), "Rx", 24.00),
    ];

    for (ndc, brand, generic, rx_status, price) in demo_drugs {
        let new_drug = drug::ActiveModel {
            ndc: Set(ndc.to_owned()),
            brand_name: Set(brand.to_owned()),
            generic_name: Set(generic.map(|g| g.to_owned())),
            manufacturer: Set(Some("Demo Pharma".to_owned())),
            dosage_form: Set(Some("Tablet".to_owned())),
            strength: Set(Some("500 mg".to_owned())),
            package_size: Set(Some(30)),
            uom: Set(Some("tablets".to_owned())),
            selling_price: Set(Some(price)),
            rx_status: Set(rx_status.to_owned()),
            min_stock_level: Set(20),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
            ..Default::default()
        };

        let res = drug::Entity::insert(new_drug)
            .on_conflict(
                sea_orm::sea_query::OnConflict::column(drug::Column::Ndc)
                    .do_nothing()
                    .to_owned(),
            )
            .exec(db)
            .await;

        // 3. One demo batch per drug, expiring next year
        if let Ok(res) = res {
            let expiry = (chrono::Local::now() + chrono::Duration::days(365))
                .format("%Y-%m-%d")
                .to_string();

            let new_batch = batch::ActiveModel {
                drug_id: Set(res.last_insert_id),
                batch_no: Set(format!("LOT-{}", ndc)),
                expiry_date: Set(expiry),
                quantity: Set(100),
                cost_price: Set(price * 0.6),
                created_at: Set(now.clone()),
                updated_at: Set(now.clone()),
                ..Default::default()
            };

            let _ = batch::Entity::insert(new_batch)
                .on_conflict(
                    sea_orm::sea_query::OnConflict::columns([
                        batch::Column::DrugId,
                        batch::Column::BatchNo,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec(db)
                .await;
        }
    }

    Ok(())
}
