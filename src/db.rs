use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};

pub async fn init_db(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(database_url).await?;

    // Run migrations manually (simple SQL)
    run_migrations(&db).await?;

    Ok(db)
}

async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Create users table
    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#
        .to_owned(),
    ))
    .await?;

    // Create drugs table (NDC is the natural key)
    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"
        CREATE TABLE IF NOT EXISTS drugs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ndc TEXT NOT NULL UNIQUE,
            brand_name TEXT NOT NULL,
            generic_name TEXT,
            manufacturer TEXT,
            dosage_form TEXT,
            strength TEXT,
            package_size INTEGER,
            uom TEXT,
            selling_price REAL,
            rx_status TEXT NOT NULL DEFAULT 'Rx',
            schedule TEXT,
            storage TEXT,
            min_stock_level INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#
        .to_owned(),
    ))
    .await?;

    // Migration: Add shelf location to drugs
    // SQLite doesn't support IF NOT EXISTS in ALTER TABLE, so we ignore errors
    let _ = db
        .execute(Statement::from_string(
            db.get_database_backend(),
            "ALTER TABLE drugs ADD COLUMN location TEXT".to_owned(),
        ))
        .await;

    // Create batches table (one lot of a drug, with its own expiry and stock)
    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"
        CREATE TABLE IF NOT EXISTS batches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            drug_id INTEGER NOT NULL,
            batch_no TEXT NOT NULL,
            expiry_date TEXT NOT NULL,
            quantity INTEGER NOT NULL DEFAULT 0,
            cost_price REAL NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (drug_id, batch_no),
            FOREIGN KEY (drug_id) REFERENCES drugs(id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_batches_drug_id ON batches(drug_id);
        CREATE INDEX IF NOT EXISTS idx_batches_expiry_date ON batches(expiry_date);
        "#
        .to_owned(),
    ))
    .await?;

    // Create orders table
    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"
        CREATE TABLE IF NOT EXISTS orders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_number TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL DEFAULT 'pending',
            total_amount REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#
        .to_owned(),
    ))
    .await?;

    // Migration: Add free-form notes to orders
    let _ = db
        .execute(Statement::from_string(
            db.get_database_backend(),
            "ALTER TABLE orders ADD COLUMN notes TEXT".to_owned(),
        ))
        .await;

    // Create order_items table. Items reference the batch by integer FK;
    // the batch number shown in API responses is denormalized at read time.
    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"
        CREATE TABLE IF NOT EXISTS order_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_id INTEGER NOT NULL,
            drug_id INTEGER NOT NULL,
            batch_id INTEGER NOT NULL,
            quantity INTEGER NOT NULL,
            unit_price REAL NOT NULL,
            subtotal REAL NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (order_id) REFERENCES orders(id) ON DELETE CASCADE,
            FOREIGN KEY (drug_id) REFERENCES drugs(id),
            FOREIGN KEY (batch_id) REFERENCES batches(id)
        );
        CREATE INDEX IF NOT EXISTS idx_order_items_order_id ON order_items(order_id);
        "#
        .to_owned(),
    ))
    .await?;

    Ok(())
}
