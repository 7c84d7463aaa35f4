use crate::auth::{Claims, create_jwt, hash_password, verify_password};
use crate::models::user;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use sea_orm::*;
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    responses(
        (status = 200, description = "Token issued"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(db): State<DatabaseConnection>,
    Json(payload): Json<LoginRequest>,
) -> impl IntoResponse {
    tracing::info!("Login attempt for user: {}", payload.username);

    let user = match user::Entity::find()
        .filter(user::Column::Username.eq(&payload.username))
        .one(&db)
        .await
    {
        Ok(Some(u)) => u,
        _ => {
            // Unknown user takes the same path as a bad password
            tracing::warn!("User not found: {}", payload.username);
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Invalid credentials" })),
            )
                .into_response();
        }
    };

    match verify_password(&payload.password, &user.password_hash) {
        Ok(true) => {
            tracing::info!("Password verified for user: {}", user.username);
            match create_jwt(&user.username, &user.role) {
                Ok(token) => (StatusCode::OK, Json(json!({ "token": token }))).into_response(),
                Err(e) => {
                    tracing::error!("Failed to issue token: {}", e);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({ "error": "Failed to issue token" })),
                    )
                        .into_response()
                }
            }
        }
        _ => {
            tracing::warn!("Password verification failed for user: {}", user.username);
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Invalid credentials" })),
            )
                .into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    username: String,
    password: String,
}

pub async fn register(
    State(db): State<DatabaseConnection>,
    Json(payload): Json<RegisterRequest>,
) -> impl IntoResponse {
    let password_hash = match hash_password(&payload.password) {
        Ok(hash) => hash,
        Err(e) => {
            tracing::error!("Failed to hash password: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to hash password" })),
            )
                .into_response();
        }
    };

    let now = chrono::Utc::now().to_rfc3339();
    let user = user::ActiveModel {
        username: Set(payload.username),
        password_hash: Set(password_hash),
        role: Set("admin".to_string()),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    match user.insert(&db).await {
        Ok(_) => (
            StatusCode::CREATED,
            Json(json!({ "message": "User created" })),
        )
            .into_response(),
        // Username is UNIQUE; a second registration collides here
        Err(e) if e.to_string().contains("UNIQUE constraint failed") => (
            StatusCode::CONFLICT,
            Json(json!({ "error": "Username already exists" })),
        )
            .into_response(),
        Err(e) => {
            // Don't expose raw SQL errors to the client
            tracing::error!("Failed to create user: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Server Error" })),
            )
                .into_response()
        }
    }
}

pub async fn get_me(claims: Claims) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({ "username": claims.sub, "role": claims.role })),
    )
}

pub async fn logout(_claims: Claims) -> impl IntoResponse {
    // Tokens are stateless; the client just discards its copy
    (StatusCode::OK, Json(json!({ "message": "Logged out" })))
}
