use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
};
use sea_orm::DatabaseConnection;
use serde_json::{Map, Value, json};

use crate::auth::Claims;
use crate::import::{self, DrugUploadRequest, FieldErrors};
use crate::services::inventory_service;

fn errors_object(errors: FieldErrors) -> Value {
    let mut map = Map::new();
    for (field, message) in errors {
        if let Some(list) = map
            .entry(field)
            .or_insert_with(|| Value::Array(Vec::new()))
            .as_array_mut()
        {
            list.push(Value::String(message));
        }
    }
    Value::Object(map)
}

/// POST /api/upload/csv - Import drugs and batches from a CSV file.
///
/// Row failures are collected and reported; they never abort the upload.
pub async fn upload_csv(
    State(db): State<DatabaseConnection>,
    _claims: Claims,
    mut multipart: Multipart,
) -> impl IntoResponse {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "message": format!("Failed to read CSV file: {}", e) })),
                )
                    .into_response();
            }
        };

        if field.name() == Some("file") {
            let data = match field.bytes().await {
                Ok(data) => data,
                Err(e) => {
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(json!({ "message": format!("Failed to read CSV file: {}", e) })),
                    )
                        .into_response();
                }
            };

            let rows = match import::parse_drug_csv(&data) {
                Ok(rows) => rows,
                Err(e) => {
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(json!({ "message": format!("Failed to read CSV file: {}", e) })),
                    )
                        .into_response();
                }
            };

            let mut success_count = 0;
            let mut failures = Vec::new();

            for row in rows {
                if !row.errors.is_empty() {
                    failures.push(json!({
                        "row": row.line,
                        "errors": row.errors.iter().map(|(_, m)| m.clone()).collect::<Vec<_>>()
                    }));
                    continue;
                }

                match inventory_service::upsert_drug_row(&db, &row.request).await {
                    Ok(()) => success_count += 1,
                    Err(e) => {
                        // Don't expose raw SQL errors to the client
                        tracing::error!("CSV row {} processing failed: {:?}", row.line, e);
                        failures.push(json!({
                            "row": row.line,
                            "errors": ["Database error occurred."]
                        }));
                    }
                }
            }

            return (
                StatusCode::OK,
                Json(json!({
                    "message": "CSV processing completed.",
                    "success_count": success_count,
                    "failure_count": failures.len(),
                    "failures": failures
                })),
            )
                .into_response();
        }
    }

    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "message": "No file uploaded" })),
    )
        .into_response()
}

/// POST /api/upload/drug - Upload a single drug + batch row as JSON.
pub async fn upload_single_drug(
    State(db): State<DatabaseConnection>,
    _claims: Claims,
    Json(payload): Json<DrugUploadRequest>,
) -> impl IntoResponse {
    let errors = import::validate(&payload);
    if !errors.is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "errors": errors_object(errors) })),
        )
            .into_response();
    }

    match inventory_service::upsert_drug_row(&db, &payload).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "Drug uploaded successfully" })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Single upload failed: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "Server Error" })),
            )
                .into_response()
        }
    }
}
