use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;

/// One inventory row: drug fields plus one batch of that drug.
/// Used both for CSV rows and for the single-drug JSON upload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DrugUploadRequest {
    pub ndc: Option<String>,
    pub brand_name: Option<String>,
    pub generic_name: Option<String>,
    pub manufacturer: Option<String>,
    pub dosage_form: Option<String>,
    pub strength: Option<String>,
    pub package_size: Option<i64>,
    pub uom: Option<String>,
    pub selling_price: Option<f64>,
    pub rx_status: Option<String>,
    pub schedule: Option<String>,
    pub storage: Option<String>,
    pub location: Option<String>,
    pub min_stock_level: Option<i64>,
    pub batch_no: Option<String>,
    pub expiry_date: Option<String>,
    pub quantity: Option<i64>,
    pub cost_price: Option<f64>,
}

/// Field name paired with a human-readable message.
pub type FieldErrors = Vec<(String, String)>;

/// A parsed CSV row with its 1-based line number (header is line 1).
#[derive(Debug)]
pub struct CsvRow {
    pub line: usize,
    pub request: DrugUploadRequest,
    pub errors: FieldErrors,
}

/// Validate a row against the inventory upload rules.
pub fn validate(req: &DrugUploadRequest) -> FieldErrors {
    let mut errors = FieldErrors::new();

    match &req.ndc {
        None => errors.push(("ndc".into(), "ndc is required".into())),
        Some(v) if v.chars().count() > 50 => {
            errors.push(("ndc".into(), "ndc must be at most 50 characters".into()))
        }
        _ => {}
    }

    match &req.brand_name {
        None => errors.push(("brand_name".into(), "brand_name is required".into())),
        Some(v) if v.chars().count() > 255 => errors.push((
            "brand_name".into(),
            "brand_name must be at most 255 characters".into(),
        )),
        _ => {}
    }

    check_len(&mut errors, "generic_name", &req.generic_name, 255);
    check_len(&mut errors, "manufacturer", &req.manufacturer, 255);
    check_len(&mut errors, "dosage_form", &req.dosage_form, 100);
    check_len(&mut errors, "strength", &req.strength, 100);
    check_len(&mut errors, "uom", &req.uom, 50);
    check_len(&mut errors, "schedule", &req.schedule, 10);
    check_len(&mut errors, "storage", &req.storage, 100);
    check_len(&mut errors, "location", &req.location, 100);

    if let Some(v) = req.package_size {
        if v < 0 {
            errors.push((
                "package_size".into(),
                "package_size must be at least 0".into(),
            ));
        }
    }

    if let Some(v) = req.min_stock_level {
        if v < 0 {
            errors.push((
                "min_stock_level".into(),
                "min_stock_level must be at least 0".into(),
            ));
        }
    }

    if let Some(v) = req.selling_price {
        if v < 0.0 {
            errors.push((
                "selling_price".into(),
                "selling_price must be at least 0".into(),
            ));
        }
    }

    if let Some(v) = &req.rx_status {
        if v != "Rx" && v != "OTC" {
            errors.push(("rx_status".into(), "rx_status must be Rx or OTC".into()));
        }
    }

    match &req.batch_no {
        None => errors.push(("batch_no".into(), "batch_no is required".into())),
        Some(v) if v.chars().count() > 100 => errors.push((
            "batch_no".into(),
            "batch_no must be at most 100 characters".into(),
        )),
        _ => {}
    }

    match &req.expiry_date {
        None => errors.push(("expiry_date".into(), "expiry_date is required".into())),
        Some(v) => {
            if NaiveDate::parse_from_str(v, "%Y-%m-%d").is_err() {
                errors.push((
                    "expiry_date".into(),
                    "expiry_date must match the format Y-m-d".into(),
                ));
            }
        }
    }

    match req.quantity {
        None => errors.push(("quantity".into(), "quantity is required".into())),
        Some(v) if v < 0 => {
            errors.push(("quantity".into(), "quantity must be at least 0".into()))
        }
        _ => {}
    }

    match req.cost_price {
        None => errors.push(("cost_price".into(), "cost_price is required".into())),
        Some(v) if v < 0.0 => {
            errors.push(("cost_price".into(), "cost_price must be at least 0".into()))
        }
        _ => {}
    }

    errors
}

// Limits are in characters, not bytes
fn check_len(errors: &mut FieldErrors, field: &str, value: &Option<String>, max: usize) {
    if let Some(v) = value {
        if v.chars().count() > max {
            errors.push((
                field.to_string(),
                format!("{} must be at most {} characters", field, max),
            ));
        }
    }
}

/// Parse an uploaded CSV file into rows ready for validation and upsert.
///
/// Headers are normalized (trimmed, lowercased) so " NDC " matches "ndc".
/// Unknown columns are ignored; empty cells become None.
pub fn parse_drug_csv(content: &[u8]) -> Result<Vec<CsvRow>, String> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content);

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| format!("CSV parse error: {}", e))?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let mut rows = Vec::new();

    for (index, result) in rdr.records().enumerate() {
        let line = index + 2; // header is line 1
        let record = result.map_err(|e| format!("CSV parse error: {}", e))?;

        let mut fields: HashMap<&str, String> = HashMap::new();
        for (header, value) in headers.iter().zip(record.iter()) {
            let value = value.trim();
            if !value.is_empty() {
                fields.insert(header.as_str(), value.to_string());
            }
        }

        let mut parse_errors = FieldErrors::new();
        let request = DrugUploadRequest {
            ndc: fields.remove("ndc"),
            brand_name: fields.remove("brand_name"),
            generic_name: fields.remove("generic_name"),
            manufacturer: fields.remove("manufacturer"),
            dosage_form: fields.remove("dosage_form"),
            strength: fields.remove("strength"),
            package_size: parse_int(&mut fields, "package_size", &mut parse_errors),
            uom: fields.remove("uom"),
            selling_price: parse_number(&mut fields, "selling_price", &mut parse_errors),
            rx_status: fields.remove("rx_status"),
            schedule: fields.remove("schedule"),
            storage: fields.remove("storage"),
            location: fields.remove("location"),
            min_stock_level: parse_int(&mut fields, "min_stock_level", &mut parse_errors),
            batch_no: fields.remove("batch_no"),
            expiry_date: fields.remove("expiry_date"),
            quantity: parse_int(&mut fields, "quantity", &mut parse_errors),
            cost_price: parse_number(&mut fields, "cost_price", &mut parse_errors),
        };

        // Skip presence/range checks for fields that already failed to parse
        let mut errors = parse_errors;
        for (field, message) in validate(&request) {
            if !errors.iter().any(|(f, _)| *f == field) {
                errors.push((field, message));
            }
        }

        rows.push(CsvRow {
            line,
            request,
            errors,
        });
    }

    Ok(rows)
}

fn parse_int(
    fields: &mut HashMap<&str, String>,
    field: &str,
    errors: &mut FieldErrors,
) -> Option<i64> {
    let raw = fields.remove(field)?;
    match raw.parse::<i64>() {
        Ok(v) => Some(v),
        Err(_) => {
            errors.push((field.to_string(), format!("{} must be an integer", field)));
            None
        }
    }
}

fn parse_number(
    fields: &mut HashMap<&str, String>,
    field: &str,
    errors: &mut FieldErrors,
) -> Option<f64> {
    let raw = fields.remove(field)?;
    match raw.parse::<f64>() {
        Ok(v) => Some(v),
        Err(_) => {
            errors.push((field.to_string(), format!("{} must be a number", field)));
            None
        }
    }
}
